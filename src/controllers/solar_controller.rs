use axum::{extract::State, Json};

use crate::error::{AppError, AppResult};
use crate::models::solar::{
    Coordinate, EnergyEstimate, EstimateRequest, FetchOutcome, FetchRequest, HealthStatus,
    ParseCoordinatesRequest,
};
use crate::services::{coordinates, dataset_loader, energy_service};
use crate::shared_state::AppState;

/// GET /api/health
/// Service liveness and upstream endpoint in use
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthStatus)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        nsrdb_base_url: state.nsrdb.base_url().to_string(),
    })
}

/// POST /api/coordinates/parse
/// Parse free text into coordinates
///
/// One `latitude,longitude` pair per line. Malformed lines are dropped;
/// a text without any valid pair is rejected.
#[utoipa::path(
    post,
    path = "/api/coordinates/parse",
    request_body = ParseCoordinatesRequest,
    responses(
        (status = 200, description = "Parsed coordinates", body = Vec<Coordinate>),
        (status = 400, description = "No valid coordinates")
    )
)]
pub async fn parse_coordinates(
    Json(req): Json<ParseCoordinatesRequest>,
) -> AppResult<Json<Vec<Coordinate>>> {
    Ok(Json(coordinates::parse_coordinates(&req.text)?))
}

/// POST /api/irradiance/fetch
/// Download irradiance data from NSRDB
///
/// Issues one upstream call per (year/product × coordinate), at least one
/// second apart. The first failing call aborts the whole batch.
#[utoipa::path(
    post,
    path = "/api/irradiance/fetch",
    request_body = FetchRequest,
    responses(
        (status = 200, description = "Combined dataset or download tickets", body = FetchOutcome),
        (status = 400, description = "Invalid coordinates or selection"),
        (status = 502, description = "NSRDB rejected a request")
    )
)]
pub async fn fetch_irradiance(
    State(state): State<AppState>,
    Json(req): Json<FetchRequest>,
) -> AppResult<Json<FetchOutcome>> {
    Ok(Json(state.nsrdb.fetch(&req).await?))
}

/// POST /api/energy/estimate
/// Estimate the energy incident on a facade
///
/// `energy_wh` is mean irradiance × area (× efficiency for the
/// position-aware model). It is not integrated over the sampling interval.
#[utoipa::path(
    post,
    path = "/api/energy/estimate",
    request_body = EstimateRequest,
    responses(
        (status = 200, description = "Energy estimate", body = EnergyEstimate),
        (status = 400, description = "Missing file or invalid facade"),
        (status = 422, description = "Empty dataset, missing columns or no solar geometry")
    )
)]
pub async fn estimate_energy(
    State(state): State<AppState>,
    Json(req): Json<EstimateRequest>,
) -> AppResult<Json<EnergyEstimate>> {
    let dataset = match (req.csv, req.dataset) {
        (Some(csv), _) => dataset_loader::parse_csv(&csv)?,
        (None, Some(dataset)) => dataset,
        (None, None) => {
            return Err(AppError::Input(
                "Please upload a CSV file containing solar data.".to_string(),
            ))
        }
    };

    let estimate = energy_service::estimate(&dataset, &req.facade, &req.model, &state.config.estimator)?;
    Ok(Json(estimate))
}
