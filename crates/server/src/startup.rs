use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use common::utils::logging::init_logging_from_env;
use configs::AppConfig;
use dotenvy::dotenv;
use tracing::info;

use crate::errors::StartupError;
use crate::routes;
use crate::state::AppState;
use service::integration::{HttpClientConfig, HttpProductClient, HttpRecommendationClient, HttpReviewClient};
use service::retry::RetryPolicy;
use service::{CompositeConfig, ProductCompositeService, SubResourcePolicy};

/// Aggregator settings derived from the loaded configuration.
pub fn composite_config(cfg: &AppConfig) -> Result<CompositeConfig, StartupError> {
    let sub_resource_policy = cfg
        .composite
        .sub_resource_policy
        .parse::<SubResourcePolicy>()
        .map_err(StartupError::InvalidConfig)?;
    let retry = RetryPolicy::new(
        cfg.retry.max_attempts,
        cfg.backoff_base(),
        cfg.backoff_max(),
        cfg.retry.enabled,
    );
    Ok(CompositeConfig {
        service_address: common::env::service_address(
            cfg.server.service_address.as_deref(),
            &cfg.server.host,
            cfg.server.port,
        ),
        sub_resource_policy,
        request_timeout: cfg.composite_timeout(),
        retry,
    })
}

/// Wire the HTTP backing clients and the aggregator.
pub fn build_state(cfg: &AppConfig) -> Result<AppState, StartupError> {
    let http = HttpClientConfig {
        connect_timeout: cfg.connect_timeout(),
        request_timeout: cfg.request_timeout(),
    }
    .build()
    .map_err(|e| StartupError::Any(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

    let backends = &cfg.backends;
    info!(
        product = %backends.product.base_url(),
        recommendation = %backends.recommendation.base_url(),
        review = %backends.review.base_url(),
        "backing services"
    );
    let composite = ProductCompositeService::new(
        Arc::new(HttpProductClient::new(http.clone(), backends.product.base_url())),
        Arc::new(HttpRecommendationClient::new(http.clone(), backends.recommendation.base_url())),
        Arc::new(HttpReviewClient::new(http, backends.review.base_url())),
        composite_config(cfg)?,
    );
    Ok(AppState::new(composite))
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(event = "shutdown_signal", "received Ctrl+C, draining connections");
    }
}

/// Public entry: build the app and run the HTTP server until Ctrl+C.
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging_from_env();

    let cfg = AppConfig::load_and_validate()?;
    let state = build_state(&cfg)?;
    info!(
        service_address = %state.composite.config().service_address,
        policy = ?state.composite.config().sub_resource_policy,
        retry_enabled = state.composite.config().retry.is_enabled(),
        "composite service configured"
    );
    let app: Router = routes::build_router(state);

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting product composite server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
