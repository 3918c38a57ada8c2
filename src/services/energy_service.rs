use tracing::info;

use crate::config::EstimatorConfig;
use crate::error::{AppError, AppResult};
use crate::models::solar::{
    Coordinate, EnergyEstimate, EnergyModel, FacadeConfig, IrradianceDataset,
};
use crate::services::dataset_loader::detect_interval;
use crate::services::solar_algorithm::{self, Surface, VERTICAL_TILT_DEG};

/// Column means; the only statistic the models consume.
#[derive(Debug, Clone, Copy)]
struct Means {
    ghi: f64,
    dni: f64,
    dhi: f64,
}

/// Energy figure for `facade` over `dataset`.
///
/// The result is mean irradiance × area (× efficiency for the position-aware
/// model). It is NOT integrated over the sampling interval: callers relying
/// on the existing numbers expect average power times area labelled "Wh".
pub fn estimate(
    dataset: &IrradianceDataset,
    facade: &FacadeConfig,
    model: &EnergyModel,
    settings: &EstimatorConfig,
) -> AppResult<EnergyEstimate> {
    validate_facade(facade)?;
    if dataset.is_empty() {
        return Err(AppError::Data("No data available to calculate energy.".to_string()));
    }

    let (incident, energy) = match model {
        EnergyModel::Flat => {
            let incident = flat_incident(means(dataset), facade.azimuth);
            (incident, incident * facade.area)
        }
        EnergyModel::ClippedVertical => {
            let incident = clipped_vertical_incident(means(dataset), facade.azimuth);
            (incident, incident * facade.area)
        }
        EnergyModel::PositionAware { site } => {
            let site = site.or(dataset.site).ok_or_else(|| {
                AppError::SolarGeometry(
                    "No site coordinate available to compute solar position.".to_string(),
                )
            })?;
            let efficiency = facade.efficiency.unwrap_or(settings.default_efficiency);
            let incident = position_aware_incident(dataset, site, facade.azimuth, settings.albedo)?;
            (incident, incident * facade.area * efficiency)
        }
    };

    let interval_minutes = detect_interval(&dataset.records).map(|d| d.num_minutes());
    info!(
        model = model.name(),
        records = dataset.len(),
        incident_w_m2 = incident,
        energy_wh = energy,
        "energy estimated"
    );

    Ok(EnergyEstimate {
        model: model.name().to_string(),
        energy_wh: energy,
        incident_w_m2: incident,
        record_count: dataset.len(),
        interval_minutes,
        display: format!("{:.2} Wh", energy),
    })
}

/// Maps a 0=North azimuth onto the 0=South convention: `(az + 180) mod 360`.
pub fn north_to_south_azimuth(azimuth_deg: f64) -> f64 {
    (azimuth_deg + 180.0).rem_euclid(360.0)
}

fn validate_facade(facade: &FacadeConfig) -> AppResult<()> {
    if !(facade.area.is_finite() && facade.area > 0.0) {
        return Err(AppError::Input(format!("Facade area must be > 0 m², got {}", facade.area)));
    }
    if !(0.0..=360.0).contains(&facade.azimuth) {
        return Err(AppError::Input(format!(
            "Facade azimuth must be within 0..360 degrees, got {}",
            facade.azimuth
        )));
    }
    if let Some(eff) = facade.efficiency {
        if !(0.0..=1.0).contains(&eff) {
            return Err(AppError::Input(format!("Efficiency must be within 0..1, got {}", eff)));
        }
    }
    Ok(())
}

fn means(dataset: &IrradianceDataset) -> Means {
    let n = dataset.len() as f64;
    let (ghi, dni, dhi) = dataset
        .records
        .iter()
        .fold((0.0, 0.0, 0.0), |(g, d, h), r| (g + r.ghi, d + r.dni, h + r.dhi));
    Means { ghi: ghi / n, dni: dni / n, dhi: dhi / n }
}

// Azimuth is used as supplied, without compass re-mapping.
fn flat_incident(m: Means, azimuth_deg: f64) -> f64 {
    let az = azimuth_deg.to_radians();
    m.ghi * az.cos() + m.dni * az.sin() + m.dhi
}

// GHI is taken not to reach a vertical surface.
fn clipped_vertical_incident(m: Means, azimuth_deg: f64) -> f64 {
    let az = azimuth_deg.to_radians();
    m.dni * az.cos().max(0.0) + m.dhi
}

/// Mean plane-of-array global irradiance on a vertical surface.
///
/// The re-mapped azimuth is handed to the transposition, which measures
/// azimuths from North like the solar position does.
fn position_aware_incident(
    dataset: &IrradianceDataset,
    site: Coordinate,
    azimuth_deg: f64,
    albedo: f64,
) -> AppResult<f64> {
    let surface = Surface {
        tilt_deg: VERTICAL_TILT_DEG,
        azimuth_deg: north_to_south_azimuth(azimuth_deg),
    };

    let mut total = 0.0;
    for (n, record) in dataset.records.iter().enumerate() {
        let at = record.timestamp.ok_or_else(|| {
            AppError::SolarGeometry(format!(
                "Record {} has no timestamp; a time index is required for solar position.",
                n + 1
            ))
        })?;
        let sun = solar_algorithm::solar_position(site, at)?;
        total += solar_algorithm::poa_irradiance(surface, sun, record.ghi, record.dni, record.dhi, albedo)
            .global;
    }
    Ok(total / dataset.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::solar::IrradianceRecord;
    use chrono::{TimeDelta, TimeZone, Utc};

    fn constant(n: usize, g: f64, d: f64, h: f64) -> IrradianceDataset {
        let t0 = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let records = (0..n)
            .map(|i| IrradianceRecord::new(Some(t0 + TimeDelta::hours(i as i64)), g, d, h))
            .collect();
        IrradianceDataset::new(records, None)
    }

    fn facade(area: f64, azimuth: f64) -> FacadeConfig {
        FacadeConfig { area, azimuth, efficiency: None }
    }

    #[test]
    fn test_flat_constant_dataset() {
        let settings = EstimatorConfig::default();
        let ds = constant(24, 500.0, 300.0, 100.0);
        for (area, az) in [(1.0, 0.0), (10.0, 45.0), (3.5, 180.0), (7.25, 300.0)] {
            let got = estimate(&ds, &facade(area, az), &EnergyModel::Flat, &settings).unwrap();
            let r = f64::to_radians(az);
            let expected = (500.0 * r.cos() + 300.0 * r.sin() + 100.0) * area;
            assert!((got.energy_wh - expected).abs() < 1e-9, "az={} got={} want={}", az, got.energy_wh, expected);
        }
    }

    #[test]
    fn test_flat_default_form_values() {
        let settings = EstimatorConfig::default();
        let ds = constant(2, 400.0, 200.0, 50.0);
        let got = estimate(&ds, &facade(10.0, 180.0), &EnergyModel::Flat, &settings).unwrap();
        // cos(180°) = -1, sin(180°) ≈ 0
        assert!((got.energy_wh - (-400.0 + 50.0) * 10.0).abs() < 1e-9);
        assert_eq!(got.display, "-3500.00 Wh");
        assert_eq!(got.record_count, 2);
        assert_eq!(got.interval_minutes, Some(60));
    }

    #[test]
    fn test_clipped_zeroes_dni_when_facing_away() {
        let settings = EstimatorConfig::default();
        let ds = constant(5, 800.0, 600.0, 90.0);
        for az in [91.0, 135.0, 180.0, 225.0, 269.0] {
            let got = estimate(&ds, &facade(4.0, az), &EnergyModel::ClippedVertical, &settings).unwrap();
            assert_eq!(got.energy_wh, 90.0 * 4.0);
        }
    }

    #[test]
    fn test_clipped_ignores_ghi() {
        let settings = EstimatorConfig::default();
        let a = estimate(&constant(3, 0.0, 600.0, 90.0), &facade(2.0, 30.0), &EnergyModel::ClippedVertical, &settings)
            .unwrap();
        let b = estimate(&constant(3, 999.0, 600.0, 90.0), &facade(2.0, 30.0), &EnergyModel::ClippedVertical, &settings)
            .unwrap();
        assert_eq!(a.energy_wh, b.energy_wh);
        let expected = (600.0 * f64::to_radians(30.0).cos() + 90.0) * 2.0;
        assert!((a.energy_wh - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_dataset_is_data_error_for_every_model() {
        let settings = EstimatorConfig::default();
        let empty = IrradianceDataset::default();
        let site = Coordinate::new(40.0, -105.0);
        for model in [EnergyModel::Flat, EnergyModel::ClippedVertical, EnergyModel::PositionAware { site }] {
            match estimate(&empty, &facade(10.0, 180.0), &model, &settings) {
                Err(AppError::Data(msg)) => assert_eq!(msg, "No data available to calculate energy."),
                other => panic!("{}: expected DataError, got {:?}", model.name(), other),
            }
        }
    }

    #[test]
    fn test_azimuth_remap() {
        assert_eq!(north_to_south_azimuth(180.0), 0.0);
        assert_eq!(north_to_south_azimuth(0.0), 180.0);
        assert_eq!(north_to_south_azimuth(270.0), 90.0);
        assert_eq!(north_to_south_azimuth(360.0), 180.0);
    }

    #[test]
    fn test_invalid_facade_is_input_error() {
        let settings = EstimatorConfig::default();
        let ds = constant(1, 1.0, 1.0, 1.0);
        for f in [facade(0.0, 10.0), facade(-2.0, 10.0), facade(5.0, 361.0), facade(5.0, -1.0)] {
            assert!(matches!(estimate(&ds, &f, &EnergyModel::Flat, &settings), Err(AppError::Input(_))));
        }
        let f = FacadeConfig { area: 5.0, azimuth: 10.0, efficiency: Some(1.5) };
        assert!(matches!(estimate(&ds, &f, &EnergyModel::Flat, &settings), Err(AppError::Input(_))));
    }

    #[test]
    fn test_position_aware_requires_timestamps() {
        let settings = EstimatorConfig::default();
        let mut ds = constant(3, 100.0, 100.0, 100.0);
        ds.records[1].timestamp = None;
        let model = EnergyModel::PositionAware { site: Coordinate::new(40.0, -105.0) };
        assert!(matches!(
            estimate(&ds, &facade(10.0, 180.0), &model, &settings),
            Err(AppError::SolarGeometry(_))
        ));
    }

    #[test]
    fn test_position_aware_requires_site() {
        let settings = EstimatorConfig::default();
        let ds = constant(3, 100.0, 100.0, 100.0);
        let model = EnergyModel::PositionAware { site: None };
        assert!(matches!(
            estimate(&ds, &facade(10.0, 180.0), &model, &settings),
            Err(AppError::SolarGeometry(_))
        ));
    }

    #[test]
    fn test_position_aware_diffuse_only_and_efficiency() {
        // Without beam irradiance the orientation does not matter:
        // POA = DHI/2 + GHI·ρ/2 for every timestamp.
        let settings = EstimatorConfig::default();
        let mut ds = constant(24, 200.0, 0.0, 80.0);
        ds.site = Coordinate::new(39.74, -105.18);
        let model = EnergyModel::PositionAware { site: None };

        let got = estimate(&ds, &facade(10.0, 90.0), &model, &settings).unwrap();
        let poa = 80.0 / 2.0 + 200.0 * 0.25 / 2.0;
        assert!((got.incident_w_m2 - poa).abs() < 1e-6);
        assert!((got.energy_wh - poa * 10.0 * 0.2).abs() < 1e-6);

        let f = FacadeConfig { area: 10.0, azimuth: 90.0, efficiency: Some(0.5) };
        let got = estimate(&ds, &f, &model, &settings).unwrap();
        assert!((got.energy_wh - poa * 10.0 * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_position_aware_beam_depends_on_orientation() {
        // Denver, midday UTC hours of a summer day; the sun is in the south.
        let settings = EstimatorConfig::default();
        let t0 = Utc.with_ymd_and_hms(2020, 6, 21, 17, 0, 0).unwrap();
        let records = (0..3)
            .map(|i| IrradianceRecord::new(Some(t0 + TimeDelta::hours(i)), 0.0, 800.0, 0.0))
            .collect();
        let ds = IrradianceDataset::new(records, Coordinate::new(39.74, -105.18));
        let model = EnergyModel::PositionAware { site: None };

        // Input 0 maps to 180 (South) in the frame shared with the sun azimuth.
        let south = estimate(&ds, &facade(1.0, 0.0), &model, &settings).unwrap();
        let north = estimate(&ds, &facade(1.0, 180.0), &model, &settings).unwrap();
        assert!(south.incident_w_m2 > 100.0, "south {}", south.incident_w_m2);
        assert_eq!(north.incident_w_m2, 0.0);
    }

    #[test]
    fn test_position_aware_uses_local_noon_from_nsrdb_csv() {
        // New York, local noon EST is 17:00Z and the sun sits due south.
        let csv = "\
Source,Latitude,Longitude,Time Zone
NSRDB,40.71,-74.01,-5
Year,Month,Day,Hour,Minute,GHI,DNI,DHI
2020,6,21,12,0,0,800,0
";
        let ds = crate::services::dataset_loader::parse_csv(csv).unwrap();
        let settings = EstimatorConfig::default();
        let model = EnergyModel::PositionAware { site: None };

        let south = estimate(&ds, &facade(1.0, 0.0), &model, &settings).unwrap();
        let east = estimate(&ds, &facade(1.0, 270.0), &model, &settings).unwrap();
        assert!(south.incident_w_m2 > 200.0, "south {}", south.incident_w_m2);
        assert!(east.incident_w_m2 < 10.0, "east {}", east.incident_w_m2);
    }
}
