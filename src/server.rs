//! HTTP server assembly.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::signal;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::info;

use crate::{
    config::AppConfig, generation::GenerationClient, pipeline::PipelineGraph, routers,
};

/// Shared state for request handlers.
///
/// The generation client is the only resource shared across requests;
/// each run owns its own state and event channel.
pub struct AppState {
    pub config: AppConfig,
    pub client: Arc<dyn GenerationClient>,
    pub graph: Arc<PipelineGraph>,
}

async fn health() -> Response {
    (StatusCode::OK, "OK").into_response()
}

pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = create_cors_layer(&state.config.cors_allowed_origins);
    let body_limit = RequestBodyLimitLayer::new(state.config.max_payload_size);

    Router::new()
        .route("/health", get(health))
        .route("/generate_email", post(routers::email::generate_email))
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
}

fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    use tower_http::cors::Any;

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };

    cors.max_age(Duration::from_secs(3600))
}

pub async fn startup(
    config: AppConfig,
    client: Arc<dyn GenerationClient>,
) -> std::io::Result<()> {
    let graph = Arc::new(PipelineGraph::email());
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        config,
        client,
        graph,
    });
    let app = build_app(state);

    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, starting graceful shutdown");
    }
}
