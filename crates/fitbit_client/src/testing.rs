//! In-memory test doubles for the requester and token manager.
//!
//! Built for the unit tests in this crate and, through the `testing` feature,
//! for the integration tests under `tests/`.

use crate::FitbitError;
use crate::endpoints::HttpMethod;
use crate::requester::{HttpRequester, HttpResponse};
use crate::token::{AccessToken, TokenManager};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// A request seen by [`FakeRequester`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub url: String,
    pub access_token: String,
}

/// Requester that answers with `http_status` for the first `ok_after` calls
/// and with 200 afterwards. A scripted fake plays its statuses in order first.
pub struct FakeRequester {
    http_status: u16,
    ok_after: u32,
    script: Vec<u16>,
    body: Vec<u8>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeRequester {
    /// Every call succeeds.
    pub fn ok() -> Self {
        Self::failing(200)
    }

    /// Every call answers `status` until [`ok_after`](Self::ok_after) says otherwise.
    pub fn failing(status: u16) -> Self {
        Self {
            http_status: status,
            ok_after: u32::MAX,
            script: Vec::new(),
            body: br#"{"fake":true}"#.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer call `n` with `statuses[n]`, then 200 once the script runs out.
    pub fn scripted(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            script: statuses.into_iter().collect(),
            ..Self::ok()
        }
    }

    pub fn ok_after(mut self, calls: u32) -> Self {
        self.ok_after = calls;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpRequester for FakeRequester {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        token: &AccessToken,
    ) -> Result<HttpResponse, FitbitError> {
        let seen = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| FitbitError::Config("fake requester poisoned".into()))?;
            calls.push(RecordedCall {
                method,
                url: url.to_string(),
                access_token: token.access_token.expose_secret().to_string(),
            });
            calls.len()
        };
        let status = match self.script.get(seen - 1) {
            Some(&scripted) => scripted,
            None if seen > self.ok_after as usize => 200,
            None => self.http_status,
        };
        Ok(HttpResponse::new(status, self.body.clone()))
    }
}

/// Token manager that hands out a fixed token and swaps in `return_data` on refresh.
pub struct StaticTokenManager {
    current: Mutex<AccessToken>,
    pub return_data: AccessToken,
    refreshes: AtomicU32,
    reject: bool,
}

impl StaticTokenManager {
    pub fn new(initial: AccessToken, return_data: AccessToken) -> Self {
        Self {
            current: Mutex::new(initial),
            return_data,
            refreshes: AtomicU32::new(0),
            reject: false,
        }
    }

    /// Make every refresh fail as if the credentials were revoked.
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl Default for StaticTokenManager {
    fn default() -> Self {
        Self::new(
            AccessToken::new("test-access", "test-refresh", "TESTUSER"),
            AccessToken::new("refreshed-access", "refreshed-refresh", "TESTUSER"),
        )
    }
}

#[async_trait]
impl TokenManager for StaticTokenManager {
    async fn access_token(&self) -> Result<AccessToken, FitbitError> {
        self.current
            .lock()
            .map(|t| t.clone())
            .map_err(|_| FitbitError::Config("token manager poisoned".into()))
    }

    async fn refresh_access_token(&self) -> Result<AccessToken, FitbitError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(FitbitError::Auth("refresh token rejected".into()));
        }
        let mut current = self
            .current
            .lock()
            .map_err(|_| FitbitError::Config("token manager poisoned".into()))?;
        *current = self.return_data.clone();
        Ok(self.return_data.clone())
    }
}
