use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Load-time errors
// ---------------------------------------------------------------------------

/// Errors raised while turning a raw measurement set into stations.
///
/// Every variant is fatal for the load: there is no partial-record recovery.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("top-level document must be an object keyed by station name")]
    NotAnObject,

    #[error("station '{station}': missing required field '{field}'")]
    MissingField { station: String, field: &'static str },

    #[error("station '{station}': field '{field}' {reason}")]
    InvalidField {
        station: String,
        field: String,
        reason: String,
    },

    #[error("station '{station}': malformed timestamp '{raw}' (expected YYYYMMDDTHHMM)")]
    Timestamp { station: String, raw: String },

    #[error("station '{station}': {field} {value} is out of range")]
    CoordinateOutOfRange {
        station: String,
        field: &'static str,
        value: f64,
    },

    #[error("station '{station}': {times} timestamps but {values} values")]
    LengthMismatch {
        station: String,
        times: usize,
        values: usize,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while reading or validating a [`crate::config::BatchConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp '{0}' in config")]
    Timestamp(String),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Output errors
// ---------------------------------------------------------------------------

/// Errors raised while writing output tables.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("creating {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing table: {0}")]
    Csv(#[from] csv::Error),
}
