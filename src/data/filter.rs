use super::model::{Station, StationSet};
use super::series::Timestamp;

// ---------------------------------------------------------------------------
// Station predicates
// ---------------------------------------------------------------------------

/// Inclusive latitude band, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatitudeBand {
    pub min: f64,
    pub max: f64,
}

impl LatitudeBand {
    pub fn contains(&self, latitude: f64) -> bool {
        (self.min..=self.max).contains(&latitude)
    }
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Indices of stations whose latitude lies inside `band`.
pub fn in_latitude_band<S: Station>(stations: &StationSet<S>, band: LatitudeBand) -> Vec<usize> {
    stations
        .iter()
        .enumerate()
        .filter(|(_, s)| band.contains(s.coordinates().latitude))
        .map(|(i, _)| i)
        .collect()
}

/// Indices of stations with at least one sample inside `window`.
///
/// Stations with no data in the window would contribute empty traces and are
/// left out.
pub fn with_data_in<S: Station>(stations: &StationSet<S>, window: TimeWindow) -> Vec<usize> {
    stations
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.series().range(window.start, window.end).is_empty())
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Camera, CameraSet, Coordinates};
    use crate::data::series::{parse_timestamp, Series};

    fn camera(id: &str, lat: f64, stamps: &[&str]) -> Camera {
        let samples = stamps
            .iter()
            .map(|s| (parse_timestamp(s).unwrap(), 18.0))
            .collect();
        let (series, _) = Series::from_unsorted(samples);
        Camera::new(id, Coordinates::new(lat, 2.0).unwrap(), series)
    }

    #[test]
    fn latitude_band_is_inclusive() {
        let cams = CameraSet::from_stations(vec![
            camera("A", 41.9, &[]),
            camera("B", 42.0, &[]),
            camera("C", 50.0, &[]),
            camera("D", 50.1, &[]),
        ]);
        let band = LatitudeBand { min: 42.0, max: 50.0 };
        assert_eq!(in_latitude_band(&cams, band), vec![1, 2]);
    }

    #[test]
    fn window_filter_skips_stations_without_samples() {
        let cams = CameraSet::from_stations(vec![
            camera("A", 45.0, &["20240510T2000"]),
            camera("B", 45.0, &["20240510T2130", "20240510T2200"]),
            camera("C", 45.0, &[]),
        ]);
        let window = TimeWindow {
            start: parse_timestamp("20240510T2100").unwrap(),
            end: parse_timestamp("20240511T0230").unwrap(),
        };
        assert_eq!(with_data_in(&cams, window), vec![1]);
    }
}
