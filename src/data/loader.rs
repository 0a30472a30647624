use std::path::Path;

use log::{debug, info};
use serde_json::{Map, Value as JsonValue};

use super::model::{Camera, CameraSet, Coordinates, Magnetometer, MagnetometerSet};
use super::series::{parse_timestamp, Series, Timestamp};
use crate::error::ParseError;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a camera measurement set from a JSON file.
pub fn load_cameras(path: &Path) -> Result<CameraSet, ParseError> {
    let cameras = parse_cameras(&read(path)?)?;
    info!("loaded {} cameras from {}", cameras.len(), path.display());
    Ok(cameras)
}

/// Load a magnetometer measurement set from a JSON file.
pub fn load_magnetometers(path: &Path) -> Result<MagnetometerSet, ParseError> {
    let magnetometers = parse_magnetometers(&read(path)?)?;
    info!(
        "loaded {} magnetometers from {}",
        magnetometers.len(),
        path.display()
    );
    Ok(magnetometers)
}

fn read(path: &Path) -> Result<String, ParseError> {
    std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Camera sets
// ---------------------------------------------------------------------------

/// Expected layout, keyed by station name:
///
/// ```json
/// {
///   "ORLEANS": {
///     "lon": 1.9, "lat": 47.9,
///     "lumd": { "20240510T2140": 18.2, "20240510T2150": 18.5 }
///   }
/// }
/// ```
pub fn parse_cameras(text: &str) -> Result<CameraSet, ParseError> {
    let root = parse_root(text)?;
    let mut cameras = Vec::with_capacity(root.len());

    for (name, record) in &root {
        let obj = station_object(name, record)?;
        let coordinates = coordinates(name, obj)?;

        let lumd = obj
            .get("lumd")
            .ok_or_else(|| missing(name, "lumd"))?
            .as_object()
            .ok_or_else(|| invalid(name, "lumd", "is not an object"))?;

        let mut samples = Vec::with_capacity(lumd.len());
        for (raw_ts, value) in lumd {
            let ts = timestamp(name, raw_ts)?;
            let field = format!("lumd.{raw_ts}");
            samples.push((ts, number(name, &field, value)?));
        }

        cameras.push(Camera::new(
            name.clone(),
            coordinates,
            build_series(name, samples),
        ));
    }

    Ok(CameraSet::from_stations(cameras))
}

// ---------------------------------------------------------------------------
// Magnetometer sets
// ---------------------------------------------------------------------------

/// Expected layout, keyed by station name:
///
/// ```json
/// {
///   "CLF": {
///     "lon": 2.26, "lat": 48.02,
///     "time":   ["20240510T2140", "20240510T2141"],
///     "valeur": [20951.3, 20948.7]
///   }
/// }
/// ```
pub fn parse_magnetometers(text: &str) -> Result<MagnetometerSet, ParseError> {
    let root = parse_root(text)?;
    let mut magnetometers = Vec::with_capacity(root.len());

    for (name, record) in &root {
        let obj = station_object(name, record)?;
        let coordinates = coordinates(name, obj)?;

        let times = array(name, obj, "time")?;
        let values = array(name, obj, "valeur")?;
        if times.len() != values.len() {
            return Err(ParseError::LengthMismatch {
                station: name.clone(),
                times: times.len(),
                values: values.len(),
            });
        }

        let mut samples = Vec::with_capacity(times.len());
        for (i, (raw_ts, value)) in times.iter().zip(values).enumerate() {
            let raw_ts = raw_ts
                .as_str()
                .ok_or_else(|| invalid(name, &format!("time[{i}]"), "is not a string"))?;
            let ts = timestamp(name, raw_ts)?;
            samples.push((ts, number(name, &format!("valeur[{i}]"), value)?));
        }

        magnetometers.push(Magnetometer::new(
            name.clone(),
            coordinates,
            build_series(name, samples),
        ));
    }

    Ok(MagnetometerSet::from_stations(magnetometers))
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn parse_root(text: &str) -> Result<Map<String, JsonValue>, ParseError> {
    match serde_json::from_str::<JsonValue>(text)? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

fn station_object<'a>(
    name: &str,
    record: &'a JsonValue,
) -> Result<&'a Map<String, JsonValue>, ParseError> {
    record
        .as_object()
        .ok_or_else(|| invalid(name, "record", "is not an object"))
}

fn coordinates(name: &str, obj: &Map<String, JsonValue>) -> Result<Coordinates, ParseError> {
    let lat = number(name, "lat", obj.get("lat").ok_or_else(|| missing(name, "lat"))?)?;
    let lon = number(name, "lon", obj.get("lon").ok_or_else(|| missing(name, "lon"))?)?;
    Coordinates::new(lat, lon).map_err(|(field, value)| ParseError::CoordinateOutOfRange {
        station: name.to_string(),
        field,
        value,
    })
}

fn array<'a>(
    name: &str,
    obj: &'a Map<String, JsonValue>,
    field: &'static str,
) -> Result<&'a Vec<JsonValue>, ParseError> {
    obj.get(field)
        .ok_or_else(|| missing(name, field))?
        .as_array()
        .ok_or_else(|| invalid(name, field, "is not an array"))
}

/// JSON numbers and numeric strings are both accepted.
fn number(name: &str, field: &str, val: &JsonValue) -> Result<f64, ParseError> {
    match val {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| invalid(name, field, "is not representable as f64")),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(name, field, &format!("'{s}' is not a number"))),
        other => Err(invalid(name, field, &format!("expected a number, got {other}"))),
    }
}

fn timestamp(name: &str, raw: &str) -> Result<Timestamp, ParseError> {
    parse_timestamp(raw).ok_or_else(|| ParseError::Timestamp {
        station: name.to_string(),
        raw: raw.to_string(),
    })
}

fn build_series(name: &str, samples: Vec<(Timestamp, f64)>) -> Series {
    let (series, merged) = Series::from_unsorted(samples);
    if merged > 0 {
        debug!("{name}: merged {merged} duplicate timestamp(s), last value kept");
    }
    series
}

fn missing(name: &str, field: &'static str) -> ParseError {
    ParseError::MissingField {
        station: name.to_string(),
        field,
    }
}

fn invalid(name: &str, field: &str, reason: &str) -> ParseError {
    ParseError::InvalidField {
        station: name.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
