use std::sync::Arc;

use anyhow::Context;

use studiodesk_infra::StudioConfig;
use studiodesk_observability::{LogFormat, TracingOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = StudioConfig::load().context("failed to load configuration")?;

    studiodesk_observability::init_with(&TracingOptions {
        format: LogFormat::parse(&cfg.logging.format),
        default_directive: cfg.logging.filter.clone(),
    });

    let services = studiodesk_api::app::services::build_services(&cfg).await?;
    let app = studiodesk_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.bind))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
