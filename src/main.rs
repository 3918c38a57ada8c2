mod routes;
mod controllers;
mod services;
mod models;
mod api_docs;
mod shared_state;
mod config;
mod error;

use std::net::SocketAddr;
use axum::{Router, routing::get, response::Html};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_scalar::Scalar;
use crate::api_docs::ApiDoc;
use crate::config::Config;
use crate::routes::solar_routes::api_routes;
use crate::shared_state::AppState;

const CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Load configuration
    let config = match Config::load(CONFIG_PATH) {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not load {}: {}, using defaults", CONFIG_PATH, e);
            Config::default()
        }
    };
    info!(
        base_url = %config.nsrdb.base_url,
        delay_ms = config.nsrdb.request_delay().as_millis() as u64,
        timeout_s = config.nsrdb.timeout().as_secs(),
        "configuration loaded"
    );

    // 2. Initialize shared state
    let server_port = config.server.port;
    let state = match AppState::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build NSRDB client: {}", e);
            return;
        }
    };

    // 3. Start Axum HTTP server
    let app = Router::new()
        .nest("/api", api_routes(state))
        .route("/scalar", get(|| async {
            Html(Scalar::new(ApiDoc::openapi()).to_html())
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], server_port));
    info!("API Server listening on http://{}", addr);
    info!("Scalar UI: http://{}/scalar", addr);

    if let Err(e) = axum_server::bind(addr).serve(app.into_make_service()).await {
        error!("HTTP server error: {}", e);
    }
}
