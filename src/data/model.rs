use std::fmt;

use chrono::NaiveDateTime;

use super::series::Series;
use crate::geomag::QdModel;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Validated constructor: both values finite, latitude in [-90, 90],
    /// longitude in [-180, 180]. Returns the offending field on failure.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, (&'static str, f64)> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(("lat", latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(("lon", longitude));
        }
        Ok(Coordinates {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}°N {:.2}°E", self.latitude, self.longitude)
    }
}

// ---------------------------------------------------------------------------
// Station capability
// ---------------------------------------------------------------------------

/// Read-only view shared by cameras and magnetometers.
pub trait Station {
    fn id(&self) -> &str;
    fn coordinates(&self) -> Coordinates;
    fn series(&self) -> &Series;
}

/// All-sky camera: sky brightness in mag/arcsec².
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    id: String,
    coordinates: Coordinates,
    brightness: Series,
}

impl Camera {
    pub fn new(id: impl Into<String>, coordinates: Coordinates, brightness: Series) -> Self {
        Camera {
            id: id.into(),
            coordinates,
            brightness,
        }
    }

    /// QD latitude of the camera site under `model`.
    pub fn qd_latitude<M: QdModel + ?Sized>(
        &self,
        model: &M,
        altitude_km: f64,
        epoch: NaiveDateTime,
    ) -> f64 {
        model.qd_latitude(
            self.coordinates.latitude,
            self.coordinates.longitude,
            altitude_km,
            epoch,
        )
    }
}

impl Station for Camera {
    fn id(&self) -> &str {
        &self.id
    }

    fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    fn series(&self) -> &Series {
        &self.brightness
    }
}

/// Ground magnetometer: H component in nT.
#[derive(Debug, Clone, PartialEq)]
pub struct Magnetometer {
    id: String,
    coordinates: Coordinates,
    field: Series,
}

impl Magnetometer {
    pub fn new(id: impl Into<String>, coordinates: Coordinates, field: Series) -> Self {
        Magnetometer {
            id: id.into(),
            coordinates,
            field,
        }
    }
}

impl Station for Magnetometer {
    fn id(&self) -> &str {
        &self.id
    }

    fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    fn series(&self) -> &Series {
        &self.field
    }
}

// ---------------------------------------------------------------------------
// StationSet – one loaded measurement set
// ---------------------------------------------------------------------------

/// Stations in source document order. Iteration order is stable and is the
/// tie-break order used by the association engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSet<S> {
    stations: Vec<S>,
}

impl<S> Default for StationSet<S> {
    fn default() -> Self {
        StationSet {
            stations: Vec::new(),
        }
    }
}

impl<S: Station> StationSet<S> {
    pub fn from_stations(stations: Vec<S>) -> Self {
        StationSet { stations }
    }

    pub fn get(&self, id: &str) -> Option<&S> {
        self.stations.iter().find(|s| s.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.stations.iter()
    }

    pub fn as_slice(&self) -> &[S] {
        &self.stations
    }

    pub fn ids(&self) -> Vec<&str> {
        self.stations.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl<'a, S> IntoIterator for &'a StationSet<S> {
    type Item = &'a S;
    type IntoIter = std::slice::Iter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.stations.iter()
    }
}

pub type CameraSet = StationSet<Camera>;
pub type MagnetometerSet = StationSet<Magnetometer>;
