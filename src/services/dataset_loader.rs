//! Turns delimited tables and NSRDB JSON rows into an `IrradianceDataset`.
//!
//! Accepted layouts:
//!  - plain CSV with a header row (column case does not matter)
//!  - NSRDB PSM3 CSV: a metadata key row, a metadata value row, then the header
//!  - JSON row objects from `outputs.data`
//!
//! Timestamps are read from a `timestamp`/`time`/`datetime`/`date` column,
//! an unnamed leading index column, or `Year/Month/Day/Hour[/Minute]` parts.
//! NSRDB parts are in the standard time of the metadata `Time Zone` and are
//! shifted to UTC.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::solar::{Coordinate, IrradianceDataset, IrradianceRecord};

const REQUIRED: [&str; 3] = ["ghi", "dni", "dhi"];
const TIMESTAMP_COLUMNS: [&str; 5] = ["timestamp", "time", "datetime", "date", "time_index"];

/// Rows as strings with a normalised (trimmed, lower-case) header.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

enum TimeSource {
    Column(usize),
    Parts {
        year: usize,
        month: usize,
        day: usize,
        hour: usize,
        minute: Option<usize>,
    },
    Missing,
}

/// Parses an uploaded file or an NSRDB CSV body.
pub fn parse_csv(text: &str) -> AppResult<IrradianceDataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows: Vec<StringRecord> = Vec::new();
    for row in reader.records() {
        rows.push(row?);
    }
    if rows.is_empty() {
        return Err(AppError::Data("No data available in the uploaded file.".to_string()));
    }

    let header_idx = rows
        .iter()
        .position(|row| {
            let cells: Vec<String> = row.iter().map(normalise).collect();
            REQUIRED.iter().all(|c| cells.iter().any(|cell| cell == c))
        })
        .ok_or_else(|| missing_columns_error(&rows[0].iter().map(normalise).collect::<Vec<_>>()))?;

    let (site, utc_offset) = if header_idx >= 2 {
        let (keys, values) = (&rows[header_idx - 2], &rows[header_idx - 1]);
        (site_from_metadata(keys, values), utc_offset_from_metadata(keys, values))
    } else {
        (None, None)
    };

    let table = Table {
        headers: rows[header_idx].iter().map(normalise).collect(),
        rows: rows[header_idx + 1..]
            .iter()
            .map(|r| r.iter().map(str::to_string).collect())
            .collect(),
    };

    let records = records_from_table(&table, utc_offset)?;
    debug!(rows = records.len(), ?site, ?utc_offset, "parsed irradiance table");
    Ok(IrradianceDataset::new(records, site))
}

/// Parses the `outputs.data` rows of a PSM3 JSON response.
pub fn records_from_rows(rows: &[Map<String, Value>]) -> AppResult<Vec<IrradianceRecord>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let table = Table {
        headers: headers.iter().map(|h| normalise(h)).collect(),
        rows: rows
            .iter()
            .map(|row| headers.iter().map(|h| cell_text(row.get(h))).collect())
            .collect(),
    };

    records_from_table(&table, None)
}

/// Most common gap between consecutive timestamps.
///
/// Only used for display: the energy figure is never multiplied by it.
pub fn detect_interval(records: &[IrradianceRecord]) -> Option<TimeDelta> {
    let stamps: Vec<DateTime<Utc>> = records.iter().filter_map(|r| r.timestamp).collect();

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in stamps.windows(2) {
        let gap = (pair[1] - pair[0]).num_seconds();
        if gap > 0 {
            *counts.entry(gap).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|(gap_a, n_a), (gap_b, n_b)| n_a.cmp(n_b).then(gap_b.cmp(gap_a)))
        .map(|(gap, _)| TimeDelta::seconds(gap))
}

/// Accepts RFC 3339, ISO-like date-times with or without offset, and plain dates.
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%m/%d/%Y %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// `utc_offset` is the zone of `Year/Month/Day/Hour` parts; `None` means UTC.
fn records_from_table(table: &Table, utc_offset: Option<FixedOffset>) -> AppResult<Vec<IrradianceRecord>> {
    let col = |name: &str| table.headers.iter().position(|h| h == name);
    let (Some(ghi), Some(dni), Some(dhi)) = (col("ghi"), col("dni"), col("dhi")) else {
        return Err(missing_columns_error(&table.headers));
    };

    let time_source = time_source(&table.headers);
    let skip: Vec<usize> = match &time_source {
        TimeSource::Column(idx) => vec![*idx],
        TimeSource::Parts { year, month, day, hour, minute } => {
            let mut v = vec![*year, *month, *day, *hour];
            v.extend(minute);
            v
        }
        TimeSource::Missing => Vec::new(),
    };

    let mut records = Vec::with_capacity(table.rows.len());
    for (n, row) in table.rows.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let value = |idx: usize, name: &str| -> AppResult<f64> {
            let cell = row.get(idx).map(|c| c.trim()).unwrap_or("");
            cell.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    AppError::Data(format!("Row {}: invalid {} value '{}'", n + 1, name.to_uppercase(), cell))
                })
        };

        let mut record = IrradianceRecord::new(
            read_timestamp(&time_source, row, utc_offset),
            value(ghi, "ghi")?,
            value(dni, "dni")?,
            value(dhi, "dhi")?,
        );

        record.extra = table
            .headers
            .iter()
            .enumerate()
            .filter(|(idx, h)| {
                ![ghi, dni, dhi].contains(idx) && !skip.contains(idx) && !h.is_empty()
            })
            .filter_map(|(idx, h)| {
                let v = row.get(idx)?.trim().parse::<f64>().ok()?;
                v.is_finite().then(|| (h.clone(), v))
            })
            .collect::<BTreeMap<_, _>>();

        records.push(record);
    }
    Ok(records)
}

fn time_source(headers: &[String]) -> TimeSource {
    let col = |name: &str| headers.iter().position(|h| h == name);

    if let Some(idx) = TIMESTAMP_COLUMNS.iter().find_map(|name| col(name)) {
        return TimeSource::Column(idx);
    }
    if let (Some(year), Some(month), Some(day), Some(hour)) =
        (col("year"), col("month"), col("day"), col("hour"))
    {
        return TimeSource::Parts { year, month, day, hour, minute: col("minute") };
    }
    // A dataframe written with its index has an unnamed first column.
    if headers.first().is_some_and(|h| h.is_empty() || h == "unnamed: 0") {
        return TimeSource::Column(0);
    }
    TimeSource::Missing
}

fn read_timestamp(source: &TimeSource, row: &[String], utc_offset: Option<FixedOffset>) -> Option<DateTime<Utc>> {
    match source {
        TimeSource::Column(idx) => parse_timestamp(row.get(*idx)?),
        TimeSource::Parts { year, month, day, hour, minute } => {
            let part = |idx: usize| row.get(idx).and_then(|c| parse_int(c));
            let minute = match minute {
                Some(idx) => part(*idx)?,
                None => 0,
            };
            let local = NaiveDate::from_ymd_opt(
                i32::try_from(part(*year)?).ok()?,
                u32::try_from(part(*month)?).ok()?,
                u32::try_from(part(*day)?).ok()?,
            )?
            .and_hms_opt(u32::try_from(part(*hour)?).ok()?, u32::try_from(minute).ok()?, 0)?;
            match utc_offset {
                Some(tz) => local.and_local_timezone(tz).single().map(|dt| dt.with_timezone(&Utc)),
                None => Some(local.and_utc()),
            }
        }
        TimeSource::Missing => None,
    }
}

fn metadata_number(keys: &StringRecord, values: &StringRecord, name: &str) -> Option<f64> {
    let idx = keys.iter().position(|k| normalise(k) == name)?;
    values.get(idx)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn site_from_metadata(keys: &StringRecord, values: &StringRecord) -> Option<Coordinate> {
    Coordinate::new(
        metadata_number(keys, values, "latitude")?,
        metadata_number(keys, values, "longitude")?,
    )
}

/// `Time Zone` is whole or fractional hours east of UTC.
fn utc_offset_from_metadata(keys: &StringRecord, values: &StringRecord) -> Option<FixedOffset> {
    let hours = metadata_number(keys, values, "time zone")?;
    FixedOffset::east_opt((hours * 3600.0).round() as i32)
}

fn missing_columns_error(headers: &[String]) -> AppError {
    let missing: Vec<String> = REQUIRED
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_uppercase())
        .collect();
    AppError::Data(format!("Dataset is missing required columns: {}", missing.join(", ")))
}

fn normalise(s: &str) -> String {
    s.trim().trim_start_matches('\u{feff}').to_lowercase()
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn cell_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
