use utoipa::OpenApi;
use crate::controllers::solar_controller;
use crate::models::solar;

#[derive(OpenApi)]
#[openapi(
    paths(
        solar_controller::health,
        solar_controller::parse_coordinates,
        solar_controller::fetch_irradiance,
        solar_controller::estimate_energy
    ),
    components(
        schemas(
            solar::Coordinate,
            solar::IrradianceRecord,
            solar::IrradianceDataset,
            solar::FacadeConfig,
            solar::EnergyModel,
            solar::FetchMode,
            solar::FetchRequest,
            solar::DownloadTicket,
            solar::FetchOutcome,
            solar::EnergyEstimate,
            solar::EstimateRequest,
            solar::ParseCoordinatesRequest,
            solar::HealthStatus
        )
    ),
    tags(
        (name = "facade-solar-estimator", description = "NSRDB irradiance download and facade energy estimation")
    )
)]
pub struct ApiDoc;
