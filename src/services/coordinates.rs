use crate::error::{AppError, AppResult};
use crate::models::solar::Coordinate;

/// Parses free text with one `latitude,longitude` pair per line.
///
/// Lines with the wrong number of fields, unparseable numbers or values out
/// of range are skipped without complaint. Only a result with no coordinate
/// at all is an error.
pub fn parse_coordinates(text: &str) -> AppResult<Vec<Coordinate>> {
    let coordinates: Vec<Coordinate> = text.lines().filter_map(parse_line).collect();

    if coordinates.is_empty() {
        return Err(AppError::Input("No valid coordinates provided.".to_string()));
    }
    Ok(coordinates)
}

fn parse_line(line: &str) -> Option<Coordinate> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [lat, lon] = fields.as_slice() else {
        return None;
    };
    let lat = lat.parse::<f64>().ok()?;
    let lon = lon.parse::<f64>().ok()?;
    Coordinate::new(lat, lon)
}
