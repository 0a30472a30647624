//! Correlates all-sky camera sky brightness with ground magnetometer
//! records and samples quasi-dipole latitude contours for map overlays.

pub mod association;
pub mod color;
pub mod config;
pub mod contour;
pub mod data;
pub mod error;
pub mod geomag;
pub mod report;
pub mod session;
