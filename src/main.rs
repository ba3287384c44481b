use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use axum::{routing::get, Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use renegotiator::billing::{BillingGateway, IxcBillingGateway};
use renegotiator::renegotiation::RenegotiationEngine;
use renegotiator::routes::api_routes;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    // Fail fast when the billing API is not configured
    let base_url = renegotiator::BILLING_API_BASE_URL
        .clone()
        .ok_or_else(|| anyhow!("BILLING_API_BASE_URL must be set"))?;
    let token = renegotiator::BILLING_API_TOKEN
        .clone()
        .ok_or_else(|| anyhow!("BILLING_API_TOKEN must be set"))?;

    let gateway: Arc<dyn BillingGateway> = Arc::new(
        IxcBillingGateway::new(base_url, &token, *renegotiator::BILLING_API_TIMEOUT)
            .context("failed to build billing client")?,
    );
    let engine = Arc::new(RenegotiationEngine::new(
        gateway,
        *renegotiator::REPLACEMENT_POLLING,
    ));

    let (prometheus_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let app = Router::new()
        .route(
            "/metrics",
            get(move || async move { metrics_handle.render() }),
        )
        .merge(api_routes())
        .layer(prometheus_layer)
        .layer(Extension(engine));

    let addr: SocketAddr = format!(
        "{}:{}",
        renegotiator::BIND_ADDRESS.as_str(),
        *renegotiator::BIND_PORT
    )
    .parse()
    .context("invalid bind address")?;
    tracing::info!(%addr, "Listening for incoming connections");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
