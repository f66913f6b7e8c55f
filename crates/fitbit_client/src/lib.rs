//! Client for the Fitbit Web API that fetches registered endpoints for a date
//! and stores every raw response on disk.

use thiserror::Error;

pub mod caller;
pub mod config;
pub mod endpoints;
pub mod requester;
pub mod retry;
pub mod saver;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod token;
pub mod urls;

pub use caller::{DEFAULT_RETRIES, FitbitCaller};
pub use endpoints::{Endpoint, EndpointParameters, HttpMethod, ResponseFormat};
pub use requester::{HttpRequester, HttpResponse, ReqwestRequester};
pub use saver::{LocalResponseSaver, ResponseSaver, SaveLocation};
pub use token::{AccessToken, LocalTokenManager, TokenManager};
pub use urls::{EndpointUrl, Period, WEB_API_URL};

#[derive(Debug, Error)]
pub enum FitbitError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Validation(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("No endpoints have been registered")]
    NoEndpointsRegistered,
    #[error("Request failed after {retries} retries")]
    RetriesExhausted { retries: u32 },
}

impl FitbitError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        FitbitError::Validation(msg.into())
    }

    /// True for errors raised before any I/O because the input was rejected.
    pub fn is_validation(&self) -> bool {
        matches!(self, FitbitError::Validation(_))
    }
}
