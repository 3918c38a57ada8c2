use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ─── Core domain types ───────────────────────────────────────────────────────

/// Geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }

    /// Well-known-text point, longitude first.
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.longitude, self.latitude)
    }
}

/// One timestamped irradiance sample. Values in W/m².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IrradianceRecord {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
    /// Auxiliary numeric attributes (air_temperature, wind_speed, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, f64>,
}

impl IrradianceRecord {
    pub fn new(timestamp: Option<DateTime<Utc>>, ghi: f64, dni: f64, dhi: f64) -> Self {
        Self { timestamp, ghi, dni, dhi, extra: BTreeMap::new() }
    }
}

/// Ordered concatenation of fetched or uploaded blocks. No deduplication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IrradianceDataset {
    pub records: Vec<IrradianceRecord>,
    /// Location the rows belong to, when they all share one
    #[serde(default)]
    pub site: Option<Coordinate>,
}

impl IrradianceDataset {
    pub fn new(records: Vec<IrradianceRecord>, site: Option<Coordinate>) -> Self {
        Self { records, site }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends `block` after the current records. The site survives only
    /// while every appended block agrees on it.
    pub fn append(&mut self, block: IrradianceDataset) {
        if self.records.is_empty() {
            self.site = block.site;
        } else if self.site != block.site {
            self.site = None;
        }
        self.records.extend(block.records);
    }
}

/// Facade being evaluated. Azimuth is in degrees, 0 = North.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FacadeConfig {
    /// Facade area (m²), must be > 0
    pub area: f64,
    /// Facing direction in degrees, 0..=360
    pub azimuth: f64,
    /// PV efficiency in 0..=1; only the position-aware model uses it
    #[serde(default)]
    pub efficiency: Option<f64>,
}

/// Formula used to turn irradiance means into an energy figure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnergyModel {
    /// `mean(ghi)·cos(az) + mean(dni)·sin(az) + mean(dhi)`, raw azimuth
    #[default]
    Flat,
    /// `mean(dni)·max(cos(az), 0) + mean(dhi)`, GHI ignored
    ClippedVertical,
    /// Solar position + plane-of-array transposition on a vertical surface
    PositionAware {
        #[serde(default)]
        site: Option<Coordinate>,
    },
}

impl EnergyModel {
    pub fn name(&self) -> &'static str {
        match self {
            EnergyModel::Flat => "flat",
            EnergyModel::ClippedVertical => "clipped_vertical",
            EnergyModel::PositionAware { .. } => "position_aware",
        }
    }
}

// ─── Fetch request / outcome ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Synchronous PSM3 download, JSON rows
    #[default]
    Json,
    /// Synchronous PSM3 download, raw CSV
    Csv,
    /// Asynchronous TDY bulk download; returns a URL instead of rows
    TdyDownload,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FetchRequest {
    pub api_key: String,
    pub email: String,
    #[serde(default)]
    pub years: Vec<i32>,
    /// Product names such as `tdy-2014`
    #[serde(default)]
    pub product_names: Vec<String>,
    /// Free text, one `latitude,longitude` pair per line
    #[serde(default)]
    pub coordinates: Option<String>,
    /// Pre-resolved NSRDB location ids (TDY download only).
    /// Sending these together with non-empty `coordinates` is an input error.
    #[serde(default)]
    pub location_ids: Vec<String>,
    #[serde(default)]
    pub mode: FetchMode,
}

impl FetchRequest {
    /// Names queried upstream: years first, then products, first occurrence wins.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let candidates = self
            .years
            .iter()
            .map(|y| y.to_string())
            .chain(self.product_names.iter().map(|n| n.trim().to_string()));
        for name in candidates {
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Result of an asynchronous download request; the file is fetched later by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DownloadTicket {
    pub name: String,
    /// WKT point or location id list the ticket was issued for
    pub target: String,
    pub download_url: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchOutcome {
    Dataset { dataset: IrradianceDataset },
    Downloads { downloads: Vec<DownloadTicket> },
}

// ─── Estimation ──────────────────────────────────────────────────────────────

/// Energy figure for one facade.
///
/// `energy_wh` is mean irradiance × area (× efficiency). It is not multiplied
/// by the sampling interval; `interval_minutes` is informational.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnergyEstimate {
    pub model: String,
    pub energy_wh: f64,
    pub incident_w_m2: f64,
    pub record_count: usize,
    pub interval_minutes: Option<i64>,
    /// e.g. `"1234.57 Wh"`
    pub display: String,
}

// ─── REST API request / response types ───────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ParseCoordinatesRequest {
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EstimateRequest {
    pub facade: FacadeConfig,
    #[serde(default)]
    pub model: EnergyModel,
    /// Uploaded file contents
    #[serde(default)]
    pub csv: Option<String>,
    /// Dataset previously returned by the fetch endpoint
    #[serde(default)]
    pub dataset: Option<IrradianceDataset>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub nsrdb_base_url: String,
}

// ─── NSRDB wire types ────────────────────────────────────────────────────────

/// Envelope shared by every NSRDB endpoint.
#[derive(Debug, Deserialize)]
pub struct NsrdbResponse<T> {
    #[serde(default)]
    pub errors: Vec<String>,
    pub outputs: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct PsmOutputs {
    #[serde(default)]
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct TdyOutputs {
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TdyDownloadBody<'a> {
    pub attributes: String,
    pub interval: String,
    pub include_leap_day: String,
    pub api_key: &'a str,
    pub email: &'a str,
    pub names: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_ids: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wkt_is_lon_lat() {
        let c = Coordinate::new(40.7128, -74.006).unwrap();
        assert_eq!(c.to_wkt(), "POINT(-74.006 40.7128)");
    }

    #[test]
    fn test_coordinate_range() {
        assert!(Coordinate::new(91.0, 0.0).is_none());
        assert!(Coordinate::new(0.0, -180.5).is_none());
        assert!(Coordinate::new(f64::NAN, 0.0).is_none());
        assert!(Coordinate::new(-90.0, 180.0).is_some());
    }

    #[test]
    fn test_append_keeps_order_and_site() {
        let a = Coordinate::new(10.0, 20.0).unwrap();
        let b = Coordinate::new(30.0, 40.0).unwrap();
        let mut ds = IrradianceDataset::default();
        ds.append(IrradianceDataset::new(vec![IrradianceRecord::new(None, 1.0, 1.0, 1.0)], Some(a)));
        ds.append(IrradianceDataset::new(vec![IrradianceRecord::new(None, 2.0, 2.0, 2.0)], Some(a)));
        assert_eq!(ds.site, Some(a));
        ds.append(IrradianceDataset::new(vec![IrradianceRecord::new(None, 3.0, 3.0, 3.0)], Some(b)));
        assert_eq!(ds.site, None);
        let ghis: Vec<f64> = ds.records.iter().map(|r| r.ghi).collect();
        assert_eq!(ghis, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_names_dedup_years_first() {
        let req: FetchRequest = serde_json::from_value(serde_json::json!({
            "api_key": "k", "email": "e@x.org",
            "years": [2020, 2019, 2020],
            "product_names": ["tdy-2014", " ", "2019"]
        }))
        .unwrap();
        assert_eq!(req.names(), vec!["2020", "2019", "tdy-2014"]);
        assert_eq!(req.mode, FetchMode::Json);
    }

    #[test]
    fn test_model_tagging() {
        let m: EnergyModel = serde_json::from_str(r#"{"type": "clipped_vertical"}"#).unwrap();
        assert_eq!(m, EnergyModel::ClippedVertical);
        let m: EnergyModel = serde_json::from_str(
            r#"{"type": "position_aware", "site": {"latitude": 1.0, "longitude": 2.0}}"#,
        )
        .unwrap();
        assert_eq!(m.name(), "position_aware");
    }
}
