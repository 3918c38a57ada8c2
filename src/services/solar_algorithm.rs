/// ============================================================
///  Solar Geometry & Plane-of-Array Transposition
///
///  Pipeline per timestamp:
///   1. Solar position  – NREL SPA (apparent zenith with standard
///                        refraction, azimuth 0° = North clockwise)
///   2. Angle of incidence between the sun and the surface normal
///   3. Isotropic transposition of GHI/DNI/DHI onto the surface:
///        beam   = max(DNI · cos θ, 0)
///        sky    = DHI · (1 + cos β) / 2
///        ground = GHI · ρ · (1 − cos β) / 2
/// ============================================================

use chrono::{DateTime, Utc};
use solar_positioning::{spa, time::DeltaT, RefractionCorrection};

use crate::error::{AppError, AppResult};
use crate::models::solar::Coordinate;

// Tilt of a facade
pub const VERTICAL_TILT_DEG: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    pub zenith_deg: f64,
    pub azimuth_deg: f64,
}

/// Orientation of the receiving surface, degrees.
#[derive(Debug, Clone, Copy)]
pub struct Surface {
    pub tilt_deg: f64,
    pub azimuth_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoaIrradiance {
    pub direct: f64,
    pub sky_diffuse: f64,
    pub ground_diffuse: f64,
    pub global: f64,
}

/// Sun position seen from `site` at `at`, sea level.
pub fn solar_position(site: Coordinate, at: DateTime<Utc>) -> AppResult<SunPosition> {
    let delta_t = DeltaT::estimate_from_date_like(at)
        .map_err(|e| AppError::SolarGeometry(format!("Cannot estimate ΔT for {}: {}", at, e)))?;

    let pos = spa::solar_position(
        at,
        site.latitude,
        site.longitude,
        0.0,
        delta_t,
        Some(RefractionCorrection::standard()),
    )
    .map_err(|e| AppError::SolarGeometry(format!("Solar position failed for {}: {}", at, e)))?;

    Ok(SunPosition {
        zenith_deg: pos.zenith_angle(),
        azimuth_deg: pos.azimuth(),
    })
}

/// Cosine of the angle of incidence, clamped to [-1, 1].
pub fn cos_angle_of_incidence(surface: Surface, sun: SunPosition) -> f64 {
    let tilt = surface.tilt_deg.to_radians();
    let zenith = sun.zenith_deg.to_radians();
    let az_diff = (sun.azimuth_deg - surface.azimuth_deg).to_radians();

    (tilt.cos() * zenith.cos() + tilt.sin() * zenith.sin() * az_diff.cos()).clamp(-1.0, 1.0)
}

/// Isotropic-sky plane-of-array irradiance (W/m²).
pub fn poa_irradiance(
    surface: Surface,
    sun: SunPosition,
    ghi: f64,
    dni: f64,
    dhi: f64,
    albedo: f64,
) -> PoaIrradiance {
    let tilt = surface.tilt_deg.to_radians();

    let direct = (dni * cos_angle_of_incidence(surface, sun)).max(0.0);
    let sky_diffuse = dhi * (1.0 + tilt.cos()) / 2.0;
    let ground_diffuse = ghi * albedo * (1.0 - tilt.cos()) / 2.0;

    PoaIrradiance {
        direct,
        sky_diffuse,
        ground_diffuse,
        global: direct + sky_diffuse + ground_diffuse,
    }
}
