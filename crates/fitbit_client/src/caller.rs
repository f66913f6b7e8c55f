//! The caller: registers endpoints and fetches them for a date, refreshing
//! the access token and retrying failed requests within a fixed budget.

use crate::FitbitError;
use crate::endpoints::{Endpoint, EndpointParameters};
use crate::requester::HttpRequester;
use crate::retry::RetryPolicy;
use crate::saver::{ResponseSaver, SaveLocation};
use crate::token::{AccessToken, TokenManager};
use crate::urls::EndpointUrl;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;

/// Retries granted to each endpoint when the caller does not pick a number.
pub const DEFAULT_RETRIES: i32 = 3;

/// Outcome of a single request attempt.
enum Attempt {
    Succeeded(Vec<u8>),
    Unauthorized,
    Failed,
}

/// A registered descriptor paired with its resolved catalog entry.
#[derive(Clone, Debug)]
struct Registered {
    endpoint: Endpoint,
    params: EndpointParameters,
}

pub struct FitbitCaller {
    base_url: String,
    requester: Arc<dyn HttpRequester>,
    token_manager: Arc<dyn TokenManager>,
    saver: Arc<dyn ResponseSaver>,
    retry_policy: RetryPolicy,
    user_token: AccessToken,
    registered: Vec<Registered>,
}

impl FitbitCaller {
    /// Create a caller holding the token the manager currently has.
    pub async fn new(
        base_url: &str,
        requester: Arc<dyn HttpRequester>,
        token_manager: Arc<dyn TokenManager>,
        saver: Arc<dyn ResponseSaver>,
    ) -> Result<Self, FitbitError> {
        let user_token = token_manager.access_token().await?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            requester,
            token_manager,
            saver,
            retry_policy: RetryPolicy::immediate(),
            user_token,
            registered: Vec::new(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn user_token(&self) -> &AccessToken {
        &self.user_token
    }

    /// Register one endpoint. Names outside the catalog are rejected and the
    /// registered list is left untouched.
    pub fn register_endpoint(&mut self, params: EndpointParameters) -> Result<(), FitbitError> {
        let endpoint = params.resolve()?;
        tracing::debug!(endpoint = %endpoint, "endpoint registered");
        self.registered.push(Registered { endpoint, params });
        Ok(())
    }

    /// Register endpoints in order. Stops at the first invalid one; those
    /// before it stay registered.
    pub fn register_multiple_endpoints<I>(&mut self, endpoints: I) -> Result<(), FitbitError>
    where
        I: IntoIterator<Item = EndpointParameters>,
    {
        for params in endpoints {
            self.register_endpoint(params)?;
        }
        Ok(())
    }

    pub fn registered_endpoints(&self) -> Vec<&EndpointParameters> {
        self.registered.iter().map(|r| &r.params).collect()
    }

    /// Replace the held token with a freshly refreshed one.
    pub async fn refresh_access_token(&mut self) -> Result<&AccessToken, FitbitError> {
        self.user_token = self.token_manager.refresh_access_token().await?;
        metrics::counter!("fitbit_token_refreshes_total").increment(1);
        Ok(&self.user_token)
    }

    /// Build the URL for `params` on `date` with the currently held token.
    pub fn create_url(
        &self,
        params: &EndpointParameters,
        date: NaiveDate,
    ) -> Result<EndpointUrl, FitbitError> {
        let endpoint = params.resolve()?;
        endpoint.build_url(&self.base_url, &self.user_token.user_id, date, &params.url_kwargs)
    }

    /// Fetch every registered endpoint for `date` and save each response.
    ///
    /// Each endpoint gets `retries + 1` attempts. A 401 refreshes the token and
    /// uses up an attempt like any other failure. The first endpoint that runs
    /// out of attempts aborts the batch. Returns the saved paths in
    /// registration order.
    pub async fn make_registered_requests_for_date(
        &mut self,
        date: NaiveDate,
        retries: i32,
    ) -> Result<Vec<PathBuf>, FitbitError> {
        if self.registered.is_empty() {
            return Err(FitbitError::NoEndpointsRegistered);
        }
        let retries = u32::try_from(retries)
            .map_err(|_| FitbitError::validation("Retries cannot be less than 0"))?;

        let mut saved = Vec::with_capacity(self.registered.len());
        for registered in self.registered.clone() {
            let path = self.fetch_and_save(&registered, date, retries).await?;
            saved.push(path);
        }
        Ok(saved)
    }

    /// Run [`make_registered_requests_for_date`](Self::make_registered_requests_for_date)
    /// for each date from `start` to `end` inclusive, stopping at the first failure.
    pub async fn make_registered_requests_for_date_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        retries: i32,
    ) -> Result<Vec<PathBuf>, FitbitError> {
        if start > end {
            return Err(FitbitError::validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        let mut saved = Vec::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            saved.extend(self.make_registered_requests_for_date(date, retries).await?);
        }
        Ok(saved)
    }

    async fn fetch_and_save(
        &mut self,
        registered: &Registered,
        date: NaiveDate,
        retries: u32,
    ) -> Result<PathBuf, FitbitError> {
        let params = &registered.params;
        let max_attempts = retries + 1;
        let mut attempt = 0u32;

        loop {
            // Rebuilt every attempt: a refresh may have changed the user id.
            let target = registered.endpoint.build_url(
                &self.base_url,
                &self.user_token.user_id,
                date,
                &params.url_kwargs,
            )?;
            attempt += 1;
            tracing::debug!(
                endpoint = %registered.endpoint,
                url = %target.url,
                attempt,
                max_attempts,
                "requesting"
            );

            let outcome = self.attempt(params, &target.url).await;
            match outcome {
                Attempt::Succeeded(body) => {
                    let location = SaveLocation {
                        endpoint_name: params.name.clone(),
                        date,
                        save_name: target.save_name.to_string(),
                        user_id: self.user_token.user_id.clone(),
                        format: params.response_format,
                    };
                    let path = self.saver.save(&location, &body).await?;
                    metrics::counter!("fitbit_responses_saved_total").increment(1);
                    tracing::info!(
                        endpoint = %registered.endpoint,
                        path = %path.display(),
                        "saved response"
                    );
                    return Ok(path);
                }
                Attempt::Unauthorized => {
                    tracing::warn!(
                        endpoint = %registered.endpoint,
                        attempt,
                        "unauthorized; refreshing access token"
                    );
                    self.refresh_access_token().await?;
                }
                Attempt::Failed => {}
            }

            if attempt >= max_attempts {
                tracing::error!(endpoint = %registered.endpoint, retries, "retries exhausted");
                return Err(FitbitError::RetriesExhausted { retries });
            }
            self.retry_policy.pause(attempt).await;
        }
    }

    async fn attempt(&self, params: &EndpointParameters, url: &str) -> Attempt {
        metrics::counter!("fitbit_requests_total").increment(1);
        match self
            .requester
            .request(params.http_method, url, &self.user_token)
            .await
        {
            Ok(resp) if resp.is_success() => Attempt::Succeeded(resp.body),
            Ok(resp) if resp.is_unauthorized() => {
                metrics::counter!("fitbit_request_failures_total").increment(1);
                Attempt::Unauthorized
            }
            Ok(resp) => {
                metrics::counter!("fitbit_request_failures_total").increment(1);
                tracing::warn!(status = resp.status, url, "request failed");
                Attempt::Failed
            }
            Err(e) => {
                metrics::counter!("fitbit_request_failures_total").increment(1);
                tracing::warn!(error = %e, url, "request did not complete");
                Attempt::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saver::LocalResponseSaver;
    use crate::testing::{FakeRequester, StaticTokenManager};
    use crate::urls::WEB_API_URL;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 17).unwrap()
    }

    async fn caller_with(
        requester: Arc<FakeRequester>,
        tokens: Arc<StaticTokenManager>,
        dir: &std::path::Path,
    ) -> FitbitCaller {
        FitbitCaller::new(
            WEB_API_URL,
            requester,
            tokens,
            Arc::new(LocalResponseSaver::new(dir)),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn register_unknown_endpoint_leaves_list_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut caller = caller_with(
            Arc::new(FakeRequester::ok()),
            Arc::new(StaticTokenManager::default()),
            dir.path(),
        )
        .await;

        let fake =
            EndpointParameters::get_json("fake_endpoint").with_url_kwarg("parameter1", "value1");
        let err = caller.register_endpoint(fake).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("not in available list"));
        assert!(caller.registered_endpoints().is_empty());
    }

    #[tokio::test]
    async fn register_multiple_keeps_prefix_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut caller = caller_with(
            Arc::new(FakeRequester::ok()),
            Arc::new(StaticTokenManager::default()),
            dir.path(),
        )
        .await;

        let res = caller.register_multiple_endpoints(vec![
            EndpointParameters::get_json("get_heart_rate_by_date"),
            EndpointParameters::get_json("nope"),
            EndpointParameters::get_json("get_body_weight_by_date"),
        ]);
        assert!(res.is_err());
        assert_eq!(
            caller.registered_endpoints(),
            vec![&EndpointParameters::get_json("get_heart_rate_by_date")]
        );
    }

    #[tokio::test]
    async fn retries_zero_makes_a_single_request() {
        let dir = tempfile::tempdir().unwrap();
        let requester = Arc::new(FakeRequester::failing(502));
        let mut caller = caller_with(
            requester.clone(),
            Arc::new(StaticTokenManager::default()),
            dir.path(),
        )
        .await;
        caller
            .register_endpoint(EndpointParameters::get_json("get_heart_rate_by_date"))
            .unwrap();

        let err = caller
            .make_registered_requests_for_date(date(), 0)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request failed after 0 retries");
        assert_eq!(requester.calls().len(), 1);
    }

    #[tokio::test]
    async fn negative_retries_checked_after_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let requester = Arc::new(FakeRequester::ok());
        let mut caller = caller_with(
            requester.clone(),
            Arc::new(StaticTokenManager::default()),
            dir.path(),
        )
        .await;

        let err = caller
            .make_registered_requests_for_date(date(), -1)
            .await
            .unwrap_err();
        assert!(matches!(err, FitbitError::NoEndpointsRegistered));
        assert!(requester.calls().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_refresh_rebuilds_url_with_new_user() {
        let dir = tempfile::tempdir().unwrap();
        let requester = Arc::new(FakeRequester::failing(401).ok_after(1));
        let tokens = Arc::new(StaticTokenManager::new(
            AccessToken::new("old", "r", "OLDUSER"),
            AccessToken::new("new", "r2", "NEWUSER"),
        ));
        let mut caller = caller_with(requester.clone(), tokens.clone(), dir.path()).await;
        caller
            .register_endpoint(EndpointParameters::get_json("get_body_weight_by_date"))
            .unwrap();

        let saved = caller
            .make_registered_requests_for_date(date(), DEFAULT_RETRIES)
            .await
            .unwrap();

        let calls = requester.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].url.contains("/user/OLDUSER/"));
        assert!(calls[1].url.contains("/user/NEWUSER/"));
        assert_eq!(calls[1].access_token, "new");
        assert_eq!(tokens.refresh_count(), 1);
        assert!(saved[0].ends_with("get_body_weight_by_date/20230117/body_weight_NEWUSER.json"));
    }

    #[tokio::test]
    async fn unauthorized_consumes_the_attempt_budget() {
        let dir = tempfile::tempdir().unwrap();
        let requester = Arc::new(FakeRequester::failing(401));
        let tokens = Arc::new(StaticTokenManager::default());
        let mut caller = caller_with(requester.clone(), tokens.clone(), dir.path()).await;
        caller
            .register_endpoint(EndpointParameters::get_json("get_heart_rate_by_date"))
            .unwrap();

        let err = caller
            .make_registered_requests_for_date(date(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, FitbitError::RetriesExhausted { retries: 2 }));
        assert_eq!(requester.calls().len(), 3);
        assert_eq!(tokens.refresh_count(), 3);
    }

    #[tokio::test]
    async fn refresh_failure_aborts_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let requester = Arc::new(FakeRequester::failing(401));
        let tokens = Arc::new(StaticTokenManager::default().rejecting());
        let mut caller = caller_with(requester.clone(), tokens, dir.path()).await;
        caller
            .register_endpoint(EndpointParameters::get_json("get_heart_rate_by_date"))
            .unwrap();

        let err = caller
            .make_registered_requests_for_date(date(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, FitbitError::Auth(_)));
        assert_eq!(requester.calls().len(), 1);
    }

    #[tokio::test]
    async fn invalid_period_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let requester = Arc::new(FakeRequester::ok());
        let mut caller = caller_with(
            requester.clone(),
            Arc::new(StaticTokenManager::default()),
            dir.path(),
        )
        .await;
        let heart_rate =
            EndpointParameters::get_json("get_heart_rate_by_date").with_url_kwarg("period", "2d");
        caller.register_endpoint(heart_rate).unwrap();

        let err = caller
            .make_registered_requests_for_date(date(), 1)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(requester.calls().is_empty());
    }

    #[tokio::test]
    async fn date_range_runs_each_day_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let requester = Arc::new(FakeRequester::ok());
        let mut caller = caller_with(
            requester.clone(),
            Arc::new(StaticTokenManager::default()),
            dir.path(),
        )
        .await;
        caller
            .register_endpoint(EndpointParameters::get_json("get_activity_summary_by_date"))
            .unwrap();

        let end = NaiveDate::from_ymd_opt(2023, 1, 19).unwrap();
        let saved = caller
            .make_registered_requests_for_date_range(date(), end, 0)
            .await
            .unwrap();
        assert_eq!(saved.len(), 3);
        let urls: Vec<String> = requester.calls().into_iter().map(|c| c.url).collect();
        assert!(urls[0].ends_with("/activities/date/2023-01-17.json"));
        assert!(urls[2].ends_with("/activities/date/2023-01-19.json"));

        let err = caller
            .make_registered_requests_for_date_range(end, date(), 0)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
