//! Batch configuration.
//!
//! Read from a JSON file; every section has defaults so a partial file (or
//! none at all) works. Timestamps use the measurement layout
//! `YYYYMMDDTHHMM`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::contour::{default_levels, SamplerParams, SearchMethod, Sweep, MAX_SWEEP_SAMPLES};
use crate::data::filter::{LatitudeBand, TimeWindow};
use crate::data::series::{parse_timestamp, StalenessPolicy, Timestamp};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub cameras_path: PathBuf,
    pub magnetometers_path: PathBuf,
    pub output_dir: PathBuf,
    pub window: WindowConfig,
    /// Magnetometer whose timestamps define the frame times. First station
    /// of the set when absent.
    pub base_magnetometer: Option<String>,
    /// Cameras kept per magnetometer.
    pub neighbors: usize,
    /// Carry-forward horizon in minutes. Absent means unbounded.
    pub staleness_minutes: Option<i64>,
    pub reference: ReferenceConfig,
    pub contours: ContourConfig,
    pub color: ColorConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            cameras_path: PathBuf::from("cameras.json"),
            magnetometers_path: PathBuf::from("magnetometers.json"),
            output_dir: PathBuf::from("out"),
            window: WindowConfig::default(),
            base_magnetometer: None,
            neighbors: 3,
            staleness_minutes: None,
            reference: ReferenceConfig::default(),
            contours: ContourConfig::default(),
            color: ColorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            start: "20240510T2100".to_string(),
            end: "20240511T0230".to_string(),
        }
    }
}

/// Per-camera reference brightness for delta maps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReferenceConfig {
    /// Sample nearest to `time`.
    Nearest { time: String },
    /// Mean over `[start, end]`.
    WindowMean { start: String, end: String },
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        ReferenceConfig::Nearest {
            time: "20240510T2140".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    pub levels: Vec<f64>,
    pub longitudes: Sweep,
    pub latitudes: Sweep,
    pub tolerance: f64,
    pub altitude_km: f64,
    pub epoch: String,
    /// Epoch at which camera positions are converted to QD latitude.
    pub camera_epoch: String,
    pub method: SearchMethod,
    /// Longitude shift applied to contour labels.
    pub label_offset_lon: f64,
}

impl Default for ContourConfig {
    fn default() -> Self {
        let params = SamplerParams::default();
        ContourConfig {
            levels: default_levels(),
            longitudes: params.longitudes,
            latitudes: params.latitudes,
            tolerance: params.tolerance,
            altitude_km: params.altitude_km,
            epoch: "20240510T2200".to_string(),
            camera_epoch: "20240510T0000".to_string(),
            method: params.method,
            label_offset_lon: -20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lat_transition: f64,
    pub brightness_min: f64,
    pub brightness_max: f64,
    pub delta_range: f64,
}

impl Default for ColorConfig {
    fn default() -> Self {
        ColorConfig {
            lat_min: 42.0,
            lat_max: 50.0,
            lat_transition: 46.0,
            // 21.8 mag/arcsec² is a really dark sky.
            brightness_min: 16.0,
            brightness_max: 21.0,
            delta_range: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

fn timestamp(raw: &str) -> Result<Timestamp, ConfigError> {
    parse_timestamp(raw).ok_or_else(|| ConfigError::Timestamp(raw.to_string()))
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: BatchConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = self.window()?;
        if window.start > window.end {
            return Err(ConfigError::Invalid(format!(
                "window start {} is after end {}",
                self.window.start, self.window.end
            )));
        }
        if matches!(self.staleness_minutes, Some(m) if m < 0) {
            return Err(ConfigError::Invalid("staleness_minutes must be >= 0".into()));
        }
        self.reference_times()?;
        self.sampler_params()?;
        self.camera_epoch()?;

        let c = &self.contours;
        if !(c.tolerance > 0.0) {
            return Err(ConfigError::Invalid("contour tolerance must be > 0".into()));
        }
        for (name, sweep) in [("latitude", c.latitudes), ("longitude", c.longitudes)] {
            if sweep.sample_count().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{name} sweep needs a finite range, a step > 0 and at most {MAX_SWEEP_SAMPLES} values"
                )));
            }
        }
        if self.color.lat_max <= self.color.lat_min {
            return Err(ConfigError::Invalid("color lat_max must exceed lat_min".into()));
        }
        Ok(())
    }

    pub fn window(&self) -> Result<TimeWindow, ConfigError> {
        Ok(TimeWindow {
            start: timestamp(&self.window.start)?,
            end: timestamp(&self.window.end)?,
        })
    }

    pub fn staleness_policy(&self) -> StalenessPolicy {
        match self.staleness_minutes {
            Some(minutes) => StalenessPolicy::max_age_minutes(minutes),
            None => StalenessPolicy::Unbounded,
        }
    }

    pub fn reference_times(&self) -> Result<Reference, ConfigError> {
        Ok(match &self.reference {
            ReferenceConfig::Nearest { time } => Reference::Nearest(timestamp(time)?),
            ReferenceConfig::WindowMean { start, end } => Reference::WindowMean(TimeWindow {
                start: timestamp(start)?,
                end: timestamp(end)?,
            }),
        })
    }

    pub fn sampler_params(&self) -> Result<SamplerParams, ConfigError> {
        let c = &self.contours;
        Ok(SamplerParams {
            longitudes: c.longitudes,
            latitudes: c.latitudes,
            tolerance: c.tolerance,
            altitude_km: c.altitude_km,
            epoch: timestamp(&c.epoch)?,
            method: c.method,
        })
    }

    pub fn camera_epoch(&self) -> Result<Timestamp, ConfigError> {
        timestamp(&self.contours.camera_epoch)
    }

    pub fn latitude_band(&self) -> LatitudeBand {
        LatitudeBand {
            min: self.color.lat_min,
            max: self.color.lat_max,
        }
    }
}

/// Resolved reference for brightness deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Nearest(Timestamp),
    WindowMean(TimeWindow),
}
