//! Access tokens and the managers that hand them out.

use crate::FitbitError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Default OAuth2 token endpoint.
pub const TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";

/// OAuth2 token pair bound to one Fitbit user.
#[derive(Clone, Debug)]
pub struct AccessToken {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub user_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

impl AccessToken {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let access_token: String = access_token.into();
        let refresh_token: String = refresh_token.into();
        Self {
            access_token: SecretString::new(access_token.into_boxed_str()),
            refresh_token: SecretString::new(refresh_token.into_boxed_str()),
            user_id: user_id.into(),
            expires_at: None,
            scope: None,
        }
    }
}

/// User ids become part of saved file names, so only plain ids are accepted.
fn check_user_id(user_id: &str) -> Result<(), FitbitError> {
    let plain = !user_id.is_empty()
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if plain {
        Ok(())
    } else {
        Err(FitbitError::validation(format!(
            "user id {user_id:?} is not a plain identifier"
        )))
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.expose_secret() == other.refresh_token.expose_secret()
            && self.user_id == other.user_id
            && self.expires_at == other.expires_at
            && self.scope == other.scope
    }
}

/// On-disk representation of a token. Secrets are only exposed here.
#[derive(Serialize, Deserialize)]
struct TokenFile {
    access_token: String,
    refresh_token: String,
    user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

impl TryFrom<TokenFile> for AccessToken {
    type Error = FitbitError;

    fn try_from(f: TokenFile) -> Result<Self, Self::Error> {
        check_user_id(&f.user_id)?;
        let mut token = AccessToken::new(f.access_token, f.refresh_token, f.user_id);
        token.expires_at = f.expires_at;
        token.scope = f.scope;
        Ok(token)
    }
}

impl From<&AccessToken> for TokenFile {
    fn from(t: &AccessToken) -> Self {
        Self {
            access_token: t.access_token.expose_secret().to_string(),
            refresh_token: t.refresh_token.expose_secret().to_string(),
            user_id: t.user_id.clone(),
            expires_at: t.expires_at,
            scope: t.scope.clone(),
        }
    }
}

/// Body returned by the OAuth2 token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    user_id: String,
    expires_in: Option<i64>,
    scope: Option<String>,
}

/// Source of access tokens for the caller.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// The token currently held by the manager.
    async fn access_token(&self) -> Result<AccessToken, FitbitError>;

    /// Exchange the refresh token for a new token pair and store it.
    async fn refresh_access_token(&self) -> Result<AccessToken, FitbitError>;
}

/// Token manager that keeps the token in a JSON file and refreshes it against
/// the OAuth2 token endpoint using the app's client credentials.
#[derive(Debug)]
pub struct LocalTokenManager {
    path: PathBuf,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    client: reqwest::Client,
    current: RwLock<AccessToken>,
}

impl LocalTokenManager {
    /// Load the token stored at `path`.
    pub async fn load(
        path: impl Into<PathBuf>,
        token_url: &str,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Result<Self, FitbitError> {
        let path = path.into();
        let token = read_token_file(&path).await?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            path,
            token_url: token_url.to_string(),
            client_id: client_id.into(),
            client_secret,
            client,
            current: RwLock::new(token),
        })
    }

    /// Make `token` the current token and persist it to the token file.
    ///
    /// The in-memory token is replaced first: refresh tokens are single use,
    /// so a failed write must not lose the new pair.
    pub async fn save_token(&self, token: &AccessToken) -> Result<(), FitbitError> {
        *self.current.write().await = token.clone();

        let body = serde_json::to_vec_pretty(&TokenFile::from(token))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = self.path.with_extension("json.part");
        let mut file = tokio::fs::File::create(&partial).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&partial, &self.path).await?;
        Ok(())
    }
}

async fn read_token_file(path: &Path) -> Result<AccessToken, FitbitError> {
    let raw = tokio::fs::read(path).await.map_err(|e| {
        FitbitError::Config(format!("cannot read token file {}: {e}", path.display()))
    })?;
    let file: TokenFile = serde_json::from_slice(&raw)?;
    AccessToken::try_from(file)
}

#[async_trait]
impl TokenManager for LocalTokenManager {
    async fn access_token(&self) -> Result<AccessToken, FitbitError> {
        Ok(self.current.read().await.clone())
    }

    async fn refresh_access_token(&self) -> Result<AccessToken, FitbitError> {
        let refresh_token = self.current.read().await.refresh_token.clone();
        let resp = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(256).collect();
            return Err(FitbitError::Auth(format!(
                "token refresh rejected with status {}: {snippet}",
                status.as_u16()
            )));
        }

        let payload: TokenResponse = resp.json().await?;
        check_user_id(&payload.user_id)
            .map_err(|e| FitbitError::Auth(format!("token endpoint returned a bad user id: {e}")))?;
        let mut token =
            AccessToken::new(payload.access_token, payload.refresh_token, payload.user_id);
        // An expiry that does not fit in a timestamp is treated as unknown.
        token.expires_at = payload
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|d| Utc::now().checked_add_signed(d));
        token.scope = payload.scope;

        self.save_token(&token).await?;
        tracing::info!(user_id = %token.user_id, "access token refreshed");
        Ok(token)
    }
}
