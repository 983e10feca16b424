use std::env;

use dotenvy::dotenv;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use logship::cloud::{AwsLambda, AwsLogs};
use logship::config::Config;
use logship::handler::{HandlerKind, Handlers};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenv();
    init_tracing();

    let cfg = Config::load(None)?;
    let kind = handler_kind()?;
    info!(handler = ?kind, "starting logship");

    let aws_cfg = aws_config::load_from_env().await;
    let handlers = Handlers::new(
        cfg,
        AwsLogs::new(aws_sdk_cloudwatchlogs::Client::new(&aws_cfg)),
        AwsLambda::new(aws_sdk_lambda::Client::new(&aws_cfg)),
    );
    let handlers = &handlers;

    run(service_fn(move |event: LambdaEvent<Value>| async move {
        let (payload, _context) = event.into_parts();
        handlers
            .handle(kind, payload)
            .await
            .map_err(|err| {
                tracing::error!("invocation failed: {err:#}");
                Error::from(format!("{err:#}"))
            })
    }))
    .await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            env::var("log_level")
                .ok()
                .filter(|lvl| !lvl.trim().is_empty())
                .and_then(|lvl| EnvFilter::try_new(lvl.trim().to_lowercase()).ok())
        })
        .unwrap_or_else(|| EnvFilter::new("info"));
    // CloudWatch stamps every line on ingestion.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .init();
}

/// Role from `LOGSHIP_HANDLER`, else the Lambda `_HANDLER` setting.
fn handler_kind() -> anyhow::Result<HandlerKind> {
    match env::var("LOGSHIP_HANDLER").or_else(|_| env::var("_HANDLER")) {
        Ok(raw) if !raw.trim().is_empty() => raw.parse(),
        _ => Ok(HandlerKind::Forwarder),
    }
}
