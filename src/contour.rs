//! QD-latitude contour sampling.
//!
//! For every longitude of a sweep the sampler looks for the geographic
//! latitude at which the geomagnetic model reports the target QD latitude.
//! The reference search is a linear forward scan at a fixed step where the
//! first sample within tolerance wins. It does not look for the closest
//! match and does not check that the model is monotonic along the scan.
//! A step that is coarse relative to the local gradient can skip a crossing.

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde::Deserialize;

use crate::geomag::QdModel;

/// Contours with fewer converged samples are dropped.
pub const MIN_CONTOUR_POINTS: usize = 3;

const MAX_BISECTIONS: usize = 64;

/// Upper bound on the values in one sweep.
pub const MAX_SWEEP_SAMPLES: usize = 100_000;

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

/// A 1-D sampling grid, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sweep {
    /// `count` evenly spaced values from `start` to `end`, both included.
    Linspace { start: f64, end: f64, count: usize },
    /// `start, start + step, …` strictly below `stop`.
    Arange { start: f64, stop: f64, step: f64 },
}

impl Sweep {
    /// Number of grid values, or `None` for a grid that is not finite or
    /// holds more than [`MAX_SWEEP_SAMPLES`] values.
    pub fn sample_count(&self) -> Option<usize> {
        match *self {
            Sweep::Linspace { start, end, count } => {
                (start.is_finite() && end.is_finite() && count <= MAX_SWEEP_SAMPLES)
                    .then_some(count)
            }
            Sweep::Arange { start, stop, step } => {
                if !(step > 0.0) || !start.is_finite() || !stop.is_finite() {
                    return None;
                }
                if stop <= start {
                    return Some(0);
                }
                let count = ((stop - start) / step).ceil();
                (count <= MAX_SWEEP_SAMPLES as f64).then_some(count as usize)
            }
        }
    }

    /// Grid values; empty for a grid that [`Sweep::sample_count`] rejects.
    pub fn values(&self) -> Vec<f64> {
        let Some(count) = self.sample_count() else {
            warn!("sweep {self:?} rejected, no values produced");
            return Vec::new();
        };
        match *self {
            Sweep::Linspace { start, end, .. } => match count {
                0 => Vec::new(),
                1 => vec![start],
                _ => {
                    let delta = (end - start) / (count - 1) as f64;
                    let mut out: Vec<f64> = (0..count).map(|i| start + i as f64 * delta).collect();
                    out[count - 1] = end;
                    out
                }
            },
            Sweep::Arange { start, step, .. } => {
                (0..count).map(|i| start + i as f64 * step).collect()
            }
        }
    }
}

/// How a single longitude is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    /// First latitude of the grid within tolerance. Reference behavior.
    #[default]
    LinearScan,
    /// Bisection between the first and last grid latitudes. Only valid where
    /// the model is monotonic in latitude over the search range.
    Bisection,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerParams {
    pub longitudes: Sweep,
    pub latitudes: Sweep,
    pub tolerance: f64,
    pub altitude_km: f64,
    pub epoch: NaiveDateTime,
    pub method: SearchMethod,
}

impl Default for SamplerParams {
    /// The European overlay grid: 300 longitudes over -40..60°, latitudes
    /// 30..90° every 0.05°, 0.1° tolerance, 110 km, 2024-05-10 22:00 UTC.
    fn default() -> Self {
        SamplerParams {
            longitudes: Sweep::Linspace {
                start: -40.0,
                end: 60.0,
                count: 300,
            },
            latitudes: Sweep::Arange {
                start: 30.0,
                stop: 90.0,
                step: 0.05,
            },
            tolerance: 0.1,
            altitude_km: 110.0,
            epoch: NaiveDate::from_ymd_opt(2024, 5, 10)
                .and_then(|d| d.and_hms_opt(22, 0, 0))
                .unwrap_or_default(),
            method: SearchMethod::LinearScan,
        }
    }
}

/// QD-latitude levels every 5° from 30° to 60°.
pub fn default_levels() -> Vec<f64> {
    (30..65).step_by(5).map(f64::from).collect()
}

// ---------------------------------------------------------------------------
// Contour lines
// ---------------------------------------------------------------------------

/// Geographic polyline along which the model reports one QD latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourLine {
    pub qd_latitude: f64,
    /// `(longitude, geographic latitude)`, in sweep order.
    pub points: Vec<(f64, f64)>,
}

impl ContourLine {
    /// Where to place the level label: the middle sample, shifted in
    /// longitude by `lon_offset`.
    pub fn label_anchor(&self, lon_offset: f64) -> Option<(f64, f64)> {
        self.points
            .get(self.points.len() / 2)
            .map(|(lon, lat)| (lon + lon_offset, *lat))
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

pub struct ContourSampler<'a, M: QdModel + ?Sized> {
    model: &'a M,
    params: SamplerParams,
    latitudes: Vec<f64>,
}

impl<'a, M: QdModel + ?Sized> ContourSampler<'a, M> {
    pub fn new(model: &'a M, params: SamplerParams) -> Self {
        let latitudes = params.latitudes.values();
        ContourSampler {
            model,
            params,
            latitudes,
        }
    }

    pub fn params(&self) -> &SamplerParams {
        &self.params
    }

    fn offset(&self, lat: f64, lon: f64, target: f64) -> f64 {
        self.model
            .qd_latitude(lat, lon, self.params.altitude_km, self.params.epoch)
            - target
    }

    /// Geographic latitude at `lon` where the model reaches `target`, or
    /// `None` when the search does not converge (a contour gap).
    pub fn find_latitude(&self, lon: f64, target: f64) -> Option<f64> {
        match self.params.method {
            SearchMethod::LinearScan => self.linear_scan(lon, target),
            SearchMethod::Bisection => self.bisect(lon, target),
        }
    }

    fn linear_scan(&self, lon: f64, target: f64) -> Option<f64> {
        let tol = self.params.tolerance;
        self.latitudes
            .iter()
            .copied()
            .find(|&lat| self.offset(lat, lon, target).abs() <= tol)
    }

    fn bisect(&self, lon: f64, target: f64) -> Option<f64> {
        let tol = self.params.tolerance;
        let (mut lo, mut hi) = (*self.latitudes.first()?, *self.latitudes.last()?);

        let mut f_lo = self.offset(lo, lon, target);
        if f_lo.abs() <= tol {
            return Some(lo);
        }
        let f_hi = self.offset(hi, lon, target);
        if f_hi.abs() <= tol {
            return Some(hi);
        }
        if f_lo.signum() == f_hi.signum() {
            return None;
        }

        for _ in 0..MAX_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            let f_mid = self.offset(mid, lon, target);
            if f_mid.abs() <= tol {
                return Some(mid);
            }
            if f_mid.signum() == f_lo.signum() {
                lo = mid;
                f_lo = f_mid;
            } else {
                hi = mid;
            }
        }
        None
    }

    /// Sample one QD-latitude level across the longitude sweep.
    ///
    /// Returns `None` when fewer than [`MIN_CONTOUR_POINTS`] longitudes
    /// converge.
    pub fn sample(&self, target: f64) -> Option<ContourLine> {
        let longitudes = self.params.longitudes.values();
        let points: Vec<(f64, f64)> = longitudes
            .iter()
            .filter_map(|&lon| self.find_latitude(lon, target).map(|lat| (lon, lat)))
            .collect();

        let gaps = longitudes.len() - points.len();
        if gaps > 0 {
            debug!("QD {target}°: {gaps} of {} longitudes did not converge", longitudes.len());
        }
        if points.len() < MIN_CONTOUR_POINTS {
            debug!("QD {target}°: dropped, only {} point(s)", points.len());
            return None;
        }

        Some(ContourLine {
            qd_latitude: target,
            points,
        })
    }

    /// Sample several levels, keeping only usable contours, in level order.
    pub fn sample_levels(&self, levels: &[f64]) -> Vec<ContourLine> {
        levels.iter().filter_map(|&level| self.sample(level)).collect()
    }
}
