use crate::FitbitError;
use crate::caller::DEFAULT_RETRIES;
use crate::endpoints::{Endpoint, EndpointParameters};
use crate::token::TOKEN_URL;
use crate::urls::WEB_API_URL;
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_path: PathBuf,
    pub output_dir: PathBuf,
    pub base_url: String,
    pub token_url: String,
    pub retries: i32,
    pub retry_base_delay: Duration,
    pub endpoints: Vec<Endpoint>,
}

impl Config {
    pub fn from_env() -> Result<Self, FitbitError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function, so tests never touch the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, FitbitError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let client_id = get("FITBIT_CLIENT_ID")
            .ok_or_else(|| FitbitError::Config("FITBIT_CLIENT_ID missing".into()))?;
        let client_secret = get("FITBIT_CLIENT_SECRET")
            .ok_or_else(|| FitbitError::Config("FITBIT_CLIENT_SECRET missing".into()))?;
        let token_path = get("FITBIT_TOKEN_PATH").unwrap_or_else(|| "token.json".into());
        let output_dir = get("FITBIT_OUTPUT_DIR").unwrap_or_else(|| "data".into());
        let base_url = get("FITBIT_API_BASE_URL").unwrap_or_else(|| WEB_API_URL.into());
        let token_url = get("FITBIT_TOKEN_URL").unwrap_or_else(|| TOKEN_URL.into());

        let retries = match get("FITBIT_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|r| i32::try_from(r).ok())
                .ok_or_else(|| {
                    FitbitError::Config(format!(
                        "FITBIT_RETRIES must be a non-negative integer, got {raw:?}"
                    ))
                })?,
            None => DEFAULT_RETRIES,
        };

        let retry_base_delay = match get("FITBIT_RETRY_BASE_DELAY_MS") {
            Some(raw) => Duration::from_millis(raw.trim().parse::<u64>().map_err(|_| {
                FitbitError::Config(format!(
                    "FITBIT_RETRY_BASE_DELAY_MS must be milliseconds, got {raw:?}"
                ))
            })?),
            None => Duration::ZERO,
        };

        let endpoints = match get("FITBIT_ENDPOINTS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<Endpoint>()
                        .map_err(|e| FitbitError::Config(format!("FITBIT_ENDPOINTS: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Endpoint::ALL.to_vec(),
        };

        Ok(Self {
            client_id,
            client_secret: SecretString::new(client_secret.into()),
            token_path: token_path.into(),
            output_dir: output_dir.into(),
            base_url,
            token_url,
            retries,
            retry_base_delay,
            endpoints,
        })
    }

    /// Descriptors for the configured endpoints, GET with JSON responses.
    pub fn endpoint_parameters(&self) -> Vec<EndpointParameters> {
        self.endpoints
            .iter()
            .map(|e| EndpointParameters::get_json(e.name()))
            .collect()
    }
}
