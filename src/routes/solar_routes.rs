use axum::{routing::{get, post}, Router};
use crate::controllers::solar_controller::{
    health, parse_coordinates, fetch_irradiance, estimate_energy,
};
use crate::shared_state::AppState;

/// Build the `/api/*` sub-router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health",            get(health))
        .route("/coordinates/parse", post(parse_coordinates))
        .route("/irradiance/fetch",  post(fetch_irradiance))
        .route("/energy/estimate",   post(estimate_energy))
        .with_state(state)
}
