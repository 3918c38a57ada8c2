use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::config::NsrdbConfig;
use crate::error::{AppError, AppResult};
use crate::models::solar::{
    Coordinate, DownloadTicket, FetchMode, FetchOutcome, FetchRequest, IrradianceDataset,
    NsrdbResponse, PsmOutputs, TdyDownloadBody, TdyOutputs,
};
use crate::services::coordinates::parse_coordinates;
use crate::services::dataset_loader;

const PSM3_JSON_PATH: &str = "psm3-download.json";
const PSM3_CSV_PATH: &str = "psm3-download.csv";
const TDY_DOWNLOAD_PATH: &str = "nsrdb_msg_v1_0_0_tdy_download.json";

/// Where one sub-request points.
enum Target {
    Point(Coordinate),
    LocationIds(String),
}

impl Target {
    fn describe(&self) -> String {
        match self {
            Target::Point(c) => c.to_wkt(),
            Target::LocationIds(ids) => format!("location_ids={}", ids),
        }
    }
}

/// NSRDB client.
///
/// Sub-requests run strictly one after another (names outer, targets inner)
/// with a fixed pause between them. The first failure aborts the batch and
/// nothing fetched so far is returned. There is no retry.
#[derive(Clone)]
pub struct NsrdbClient {
    client: Client,
    base_url: String,
    attributes: String,
    interval: u32,
    include_leap_day: bool,
    request_delay: Duration,
}

impl NsrdbClient {
    pub fn new(cfg: &NsrdbConfig) -> AppResult<Self> {
        let client = Client::builder().timeout(cfg.timeout()).build()?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            attributes: cfg.attributes.join(","),
            interval: cfg.interval,
            include_leap_day: cfg.include_leap_day,
            request_delay: cfg.request_delay(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch(&self, request: &FetchRequest) -> AppResult<FetchOutcome> {
        let names = request.names();
        if names.is_empty() {
            return Err(AppError::Input("Select at least one year or product.".to_string()));
        }
        let targets = resolve_targets(request)?;

        info!(
            mode = ?request.mode,
            names = names.len(),
            targets = targets.len(),
            "starting NSRDB fetch"
        );

        let mut dataset = IrradianceDataset::default();
        let mut downloads = Vec::new();
        let mut issued = 0usize;

        for name in &names {
            for target in &targets {
                if issued > 0 {
                    tokio::time::sleep(self.request_delay).await;
                }
                issued += 1;

                match request.mode {
                    FetchMode::Json => dataset.append(self.fetch_json(request, name, target).await?),
                    FetchMode::Csv => dataset.append(self.fetch_csv(request, name, target).await?),
                    FetchMode::TdyDownload => {
                        downloads.push(self.request_download(request, name, target).await?)
                    }
                }
            }
        }

        info!(requests = issued, records = dataset.len(), downloads = downloads.len(), "NSRDB fetch complete");

        Ok(match request.mode {
            FetchMode::TdyDownload => FetchOutcome::Downloads { downloads },
            FetchMode::Json | FetchMode::Csv => FetchOutcome::Dataset { dataset },
        })
    }

    async fn fetch_json(&self, request: &FetchRequest, name: &str, target: &Target) -> AppResult<IrradianceDataset> {
        let Target::Point(point) = target else {
            return Err(location_ids_unsupported());
        };
        let response = self.psm3_get(PSM3_JSON_PATH, request, name, point).await?;
        let outputs: PsmOutputs = read_envelope(response).await?;
        let records = dataset_loader::records_from_rows(&outputs.data)?;

        info!(product = name, location = %target.describe(), records = records.len(), "fetched JSON block");
        Ok(IrradianceDataset::new(records, Some(*point)))
    }

    async fn fetch_csv(&self, request: &FetchRequest, name: &str, target: &Target) -> AppResult<IrradianceDataset> {
        let Target::Point(point) = target else {
            return Err(location_ids_unsupported());
        };
        let response = self.psm3_get(PSM3_CSV_PATH, request, name, point).await?;
        let body = response.text().await?;
        let mut block = dataset_loader::parse_csv(&body)?;
        block.site = Some(*point);

        info!(product = name, location = %target.describe(), records = block.len(), "fetched CSV block");
        Ok(block)
    }

    async fn request_download(&self, request: &FetchRequest, name: &str, target: &Target) -> AppResult<DownloadTicket> {
        let url = format!("{}/{}", self.base_url, TDY_DOWNLOAD_PATH);
        let (lat, lon, location_ids) = match target {
            Target::Point(c) => (Some(c.latitude), Some(c.longitude), None),
            Target::LocationIds(ids) => (None, None, Some(ids.clone())),
        };
        let body = TdyDownloadBody {
            attributes: self.attributes.clone(),
            interval: self.interval.to_string(),
            include_leap_day: self.include_leap_day.to_string(),
            api_key: &request.api_key,
            email: &request.email,
            names: name,
            lat,
            lon,
            location_ids,
        };

        debug!(url = %url, product = name, location = %target.describe(), "POST download request");
        let response = self.client.post(&url).json(&body).send().await?;
        let response = check_status(response).await?;
        let outputs: TdyOutputs = read_envelope(response).await?;

        info!(product = name, location = %target.describe(), message = %outputs.message, "download URL issued");
        Ok(DownloadTicket {
            name: name.to_string(),
            target: target.describe(),
            download_url: outputs.download_url,
            message: outputs.message,
        })
    }

    async fn psm3_get(&self, path: &str, request: &FetchRequest, name: &str, point: &Coordinate) -> AppResult<Response> {
        let url = format!("{}/{}", self.base_url, path);
        let wkt = point.to_wkt();
        let interval = self.interval.to_string();

        // api_key and email stay out of the log line; rows come back in UTC
        debug!(url = %url, product = name, wkt = %wkt, "GET PSM3 block");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", request.api_key.as_str()),
                ("email", request.email.as_str()),
                ("names", name),
                ("attributes", self.attributes.as_str()),
                ("interval", interval.as_str()),
                ("wkt", wkt.as_str()),
                ("utc", "true"),
            ])
            .send()
            .await?;
        check_status(response).await
    }
}

fn resolve_targets(request: &FetchRequest) -> AppResult<Vec<Target>> {
    let ids: Vec<&str> = request
        .location_ids
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if !ids.is_empty() && request.mode == FetchMode::TdyDownload {
        if request.coordinates.as_deref().is_some_and(|c| !c.trim().is_empty()) {
            return Err(AppError::Input(
                "Provide either coordinates or location ids, not both.".to_string(),
            ));
        }
        return Ok(vec![Target::LocationIds(ids.join(","))]);
    }

    match request.coordinates.as_deref() {
        Some(text) => Ok(parse_coordinates(text)?.into_iter().map(Target::Point).collect()),
        None if !ids.is_empty() => Err(location_ids_unsupported()),
        None => Err(AppError::Input("No valid coordinates provided.".to_string())),
    }
}

fn location_ids_unsupported() -> AppError {
    AppError::Input("Location ids are only supported for TDY download requests.".to_string())
}

/// Any status other than 200 aborts the batch.
async fn check_status(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<NsrdbResponse<serde_json::Value>>(&body)
        .ok()
        .filter(|r| !r.errors.is_empty())
        .map(|r| r.errors.join(", "))
        .unwrap_or(body);
    error!(%status, "NSRDB request failed");
    Err(AppError::Remote(format!("Failed to fetch data: {} {}", status, detail)))
}

/// Parses the JSON envelope and rejects a non-empty `errors` array.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let body = response.text().await?;
    let envelope: NsrdbResponse<T> = serde_json::from_str(&body)
        .map_err(|e| AppError::Remote(format!("Failed to parse NSRDB response: {}", e)))?;

    if !envelope.errors.is_empty() {
        let joined = envelope.errors.join(", ");
        error!(errors = %joined, "NSRDB reported errors");
        return Err(AppError::Remote(format!("Error: {}", joined)));
    }
    envelope
        .outputs
        .ok_or_else(|| AppError::Remote("NSRDB response contained no outputs.".to_string()))
}
