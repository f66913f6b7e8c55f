use std::sync::Arc;

use chrono::NaiveDate;
use fitbit_client::{
    DEFAULT_RETRIES, EndpointParameters, FitbitCaller, LocalResponseSaver, LocalTokenManager,
    ReqwestRequester, config::Config,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example: expects FITBIT_CLIENT_ID, FITBIT_CLIENT_SECRET and a token file
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(());
        }
    };
    let tokens = LocalTokenManager::load(
        &cfg.token_path,
        &cfg.token_url,
        cfg.client_id.clone(),
        cfg.client_secret.clone(),
    )
    .await?;
    let mut caller = FitbitCaller::new(
        &cfg.base_url,
        Arc::new(ReqwestRequester::new()?),
        Arc::new(tokens),
        Arc::new(LocalResponseSaver::new(&cfg.output_dir)),
    )
    .await?;
    caller.register_endpoint(
        EndpointParameters::get_json("get_heart_rate_by_date").with_url_kwarg("period", "7d"),
    )?;

    let date = NaiveDate::from_ymd_opt(2023, 1, 17).ok_or("bad date")?;
    for path in caller
        .make_registered_requests_for_date(date, DEFAULT_RETRIES)
        .await?
    {
        println!("saved {}", path.display());
    }
    Ok(())
}
