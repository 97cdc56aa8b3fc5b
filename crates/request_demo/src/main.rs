//! Polls one URL through the request engine and logs every result.
//!
//! Usage: `request_demo <url> [config.ron] [seconds]`
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::LevelFilter;
use request_engine::{
    HttpResponse, HttpService, HttpSettings, Request, RequestConfig, RequestError,
    RequestOptions,
};
use request_logging::{request_info, request_warn, LogDestination};

const DEFAULT_RUN_SECONDS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    request_logging::initialize(LogDestination::Terminal, LevelFilter::Info);

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .context("usage: request_demo <url> [config.ron] [seconds]")?;
    let config = match args.next() {
        Some(path) => RequestConfig::load(Path::new(&path))?,
        None => RequestConfig::default(),
    };
    let run_for = match args.next() {
        Some(seconds) => seconds
            .parse()
            .with_context(|| format!("invalid run time: {seconds}"))?,
        None => DEFAULT_RUN_SECONDS,
    };

    let options = config.apply(RequestOptions {
        default_params: Some(url.clone()),
        polling_interval: Some(Duration::from_secs(10)),
        on_success: Some(Arc::new(|response: &HttpResponse, url: &String| {
            request_info!(
                "{} -> {} ({} bytes, {})",
                url,
                response.status,
                response.body.len(),
                response.content_type.as_deref().unwrap_or("no content type")
            );
        })),
        on_error: Some(Arc::new(|err: &RequestError, url: &String| {
            request_warn!("{} failed: {}", url, err);
        })),
        ..RequestOptions::default()
    });

    let service = Arc::new(HttpService::new(HttpSettings::default())?);
    let request = Request::new(service, options);

    tokio::time::sleep(Duration::from_secs(run_for)).await;
    let state = request.state();
    request_info!(
        "stopping after {}s; last status {:?}, error {:?}",
        run_for,
        state.data.map(|response| response.status),
        state.error.map(|err| err.to_string())
    );
    Ok(())
}
