use std::sync::Arc;

use anyhow::Context;
use chrono::{Days, NaiveDate, Utc};
use fitbit_client::config::Config;
use fitbit_client::retry::RetryPolicy;
use fitbit_client::{FitbitCaller, LocalResponseSaver, LocalTokenManager, ReqwestRequester};

fn parse_date(var: &str, raw: Option<String>, default: NaiveDate) -> anyhow::Result<NaiveDate> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("{var} must be YYYY-MM-DD, got {s:?}")),
        None => Ok(default),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Configure logging from env var `FITBIT_EXTRACT_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("FITBIT_EXTRACT_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    // Keep the HTTP stack quiet unless asked for explicitly
    let combined_filter = format!("{},hyper=warn,reqwest=warn", log_env);
    let env_filter = tracing_subscriber::EnvFilter::try_new(combined_filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!("fitbit_extract: log filter: {}", log_env);

    let cfg = Config::from_env().context("loading configuration")?;

    let yesterday = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .context("date out of range")?;
    let start = parse_date(
        "FITBIT_EXTRACT_START_DATE",
        std::env::var("FITBIT_EXTRACT_START_DATE").ok(),
        yesterday,
    )?;
    let end = parse_date(
        "FITBIT_EXTRACT_END_DATE",
        std::env::var("FITBIT_EXTRACT_END_DATE").ok(),
        start.max(yesterday),
    )?;

    let tokens = LocalTokenManager::load(
        &cfg.token_path,
        &cfg.token_url,
        cfg.client_id.clone(),
        cfg.client_secret.clone(),
    )
    .await
    .with_context(|| format!("loading token from {}", cfg.token_path.display()))?;

    let mut caller = FitbitCaller::new(
        &cfg.base_url,
        Arc::new(ReqwestRequester::new()?),
        Arc::new(tokens),
        Arc::new(LocalResponseSaver::new(&cfg.output_dir)),
    )
    .await?
    .with_retry_policy(RetryPolicy::exponential(cfg.retry_base_delay));
    caller.register_multiple_endpoints(cfg.endpoint_parameters())?;

    tracing::info!(
        %start,
        %end,
        endpoints = cfg.endpoints.len(),
        output = %cfg.output_dir.display(),
        "fitbit_extract: fetching"
    );

    let saved = caller
        .make_registered_requests_for_date_range(start, end, cfg.retries)
        .await?;

    tracing::info!("fitbit_extract: saved {} responses", saved.len());
    Ok(())
}
