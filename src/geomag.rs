//! Geomagnetic coordinate models.
//!
//! The contour sampler only needs one pure function,
//! `qd_latitude(lat, lon, altitude_km, datetime) -> degrees`. Any full model
//! (AACGM, apex/QD) can be plugged in through [`QdModel`]; closures with the
//! same signature implement it directly.

use chrono::NaiveDateTime;

/// Mean Earth radius used as the magnetic reference sphere, in km.
pub const EARTH_RADIUS_KM: f64 = 6371.2;

/// Maps a geographic position at altitude and epoch to a quasi-dipole
/// latitude in degrees. Implementations must be deterministic.
pub trait QdModel {
    fn qd_latitude(&self, lat: f64, lon: f64, altitude_km: f64, at: NaiveDateTime) -> f64;
}

impl<F> QdModel for F
where
    F: Fn(f64, f64, f64, NaiveDateTime) -> f64,
{
    fn qd_latitude(&self, lat: f64, lon: f64, altitude_km: f64, at: NaiveDateTime) -> f64 {
        self(lat, lon, altitude_km, at)
    }
}

// ---------------------------------------------------------------------------
// Centred dipole
// ---------------------------------------------------------------------------

/// Centred-dipole approximation with field-line mapping to the ground.
///
/// Dipole latitude comes from the angular distance to the geomagnetic north
/// pole. The field line through a point at radius `R_E + h` reaches the
/// reference sphere at `cos λ_qd = cos λ_dip · sqrt(R_E / (R_E + h))`.
/// The pole is fixed, so the epoch argument is ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DipoleModel {
    pub pole_latitude: f64,
    pub pole_longitude: f64,
}

impl Default for DipoleModel {
    /// IGRF-13 geomagnetic north pole, epoch 2020.
    fn default() -> Self {
        DipoleModel {
            pole_latitude: 80.65,
            pole_longitude: -72.68,
        }
    }
}

impl DipoleModel {
    /// Dipole latitude at ground level, in degrees.
    pub fn dipole_latitude(&self, lat: f64, lon: f64) -> f64 {
        let (phi, lambda) = (lat.to_radians(), lon.to_radians());
        let (phi_p, lambda_p) = (
            self.pole_latitude.to_radians(),
            self.pole_longitude.to_radians(),
        );
        let sin_mlat =
            phi.sin() * phi_p.sin() + phi.cos() * phi_p.cos() * (lambda - lambda_p).cos();
        sin_mlat.clamp(-1.0, 1.0).asin().to_degrees()
    }
}

impl QdModel for DipoleModel {
    fn qd_latitude(&self, lat: f64, lon: f64, altitude_km: f64, _at: NaiveDateTime) -> f64 {
        let mlat = self.dipole_latitude(lat, lon);
        let scale = (EARTH_RADIUS_KM / (EARTH_RADIUS_KM + altitude_km.max(0.0))).sqrt();
        let cos_qd = (mlat.to_radians().cos() * scale).clamp(-1.0, 1.0);
        cos_qd.acos().to_degrees().copysign(mlat)
    }
}
