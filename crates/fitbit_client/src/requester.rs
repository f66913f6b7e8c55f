//! HTTP transport used by the caller.
//!
//! The caller only needs a status code and the raw body, so the transport is
//! kept behind [`HttpRequester`] and can be swapped for a fake in tests.

use crate::FitbitError;
use crate::endpoints::HttpMethod;
use crate::token::AccessToken;
use async_trait::async_trait;
use secrecy::ExposeSecret;

/// Status code and raw body of a completed request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

#[async_trait]
pub trait HttpRequester: Send + Sync {
    /// Issue `method` against `url` authorized with `token`.
    ///
    /// Non-success statuses are returned as responses, not errors. An error
    /// means the request never produced a response.
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        token: &AccessToken,
    ) -> Result<HttpResponse, FitbitError>;
}

/// Requester backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestRequester {
    client: reqwest::Client,
}

impl ReqwestRequester {
    pub fn new() -> Result<Self, FitbitError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpRequester for ReqwestRequester {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        token: &AccessToken,
    ) -> Result<HttpResponse, FitbitError> {
        let resp = self
            .client
            .request(method.into(), url)
            .bearer_auth(token.access_token.expose_secret())
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
        assert!(HttpResponse::new(401, "").is_unauthorized());
        assert!(!HttpResponse::new(502, "").is_unauthorized());
    }
}
