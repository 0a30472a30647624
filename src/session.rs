use chrono::{Duration, NaiveDateTime};
use log::warn;

use crate::association::{associate, Association};
use crate::config::Reference;
use crate::data::filter::TimeWindow;
use crate::data::model::{CameraSet, Coordinates, MagnetometerSet, Station};
use crate::data::series::{Lookup, Span, StalenessPolicy, Timestamp};
use crate::geomag::QdModel;

/// Duration given to the last sample of a camera series in QD bands.
pub const DEFAULT_LAST_SPAN_MINUTES: i64 = 10;

// ---------------------------------------------------------------------------
// Per-frame records
// ---------------------------------------------------------------------------

/// One camera's brightness at a frame time.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSample {
    pub camera_id: String,
    pub coordinates: Coordinates,
    pub lookup: Lookup,
}

/// One camera's brightness change relative to its reference.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDelta {
    pub camera_id: String,
    pub coordinates: Coordinates,
    pub delta: f64,
}

/// A camera's brightness history placed at its QD latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct QdBand {
    pub camera_id: String,
    pub qd_latitude: f64,
    pub spans: Vec<Span>,
    /// Brightness the band's deltas are taken against, if any.
    pub reference: Option<f64>,
}

impl QdBand {
    /// Span values minus the reference, aligned with `spans`.
    pub fn deltas(&self) -> Vec<Option<f64>> {
        self.spans
            .iter()
            .map(|span| self.reference.map(|r| span.value - r))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Session – the loaded station sets
// ---------------------------------------------------------------------------

/// Both station sets for one batch run. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct Session {
    cameras: CameraSet,
    magnetometers: MagnetometerSet,
}

impl Session {
    pub fn new(cameras: CameraSet, magnetometers: MagnetometerSet) -> Self {
        Session {
            cameras,
            magnetometers,
        }
    }

    pub fn cameras(&self) -> &CameraSet {
        &self.cameras
    }

    pub fn magnetometers(&self) -> &MagnetometerSet {
        &self.magnetometers
    }

    pub fn associations(&self, k: usize) -> Vec<Association> {
        associate(&self.magnetometers, &self.cameras, k)
    }

    /// Frame times: the base magnetometer's timestamps inside `window`.
    ///
    /// `base` defaults to the first magnetometer. An unknown id yields no
    /// frames.
    pub fn frame_times(&self, base: Option<&str>, window: TimeWindow) -> Vec<Timestamp> {
        let station = match base {
            Some(id) => self.magnetometers.get(id),
            None => self.magnetometers.iter().next(),
        };
        match station {
            Some(mag) => mag
                .series()
                .range(window.start, window.end)
                .iter()
                .map(|(ts, _)| *ts)
                .collect(),
            None => {
                warn!("no base magnetometer {:?}, no frames", base.unwrap_or("<first>"));
                Vec::new()
            }
        }
    }

    /// Every camera's lookup at `t`. Cameras with no sample at or before
    /// `t` are left out.
    pub fn snapshot(&self, t: Timestamp, policy: &StalenessPolicy) -> Vec<CameraSample> {
        self.cameras
            .iter()
            .filter_map(|cam| {
                let lookup = cam.series().at(t, policy);
                if lookup == Lookup::NoData {
                    return None;
                }
                Some(CameraSample {
                    camera_id: cam.id().to_string(),
                    coordinates: cam.coordinates(),
                    lookup,
                })
            })
            .collect()
    }

    /// Reference brightness per camera, aligned with the camera set.
    pub fn reference_brightness(&self, reference: Reference) -> Vec<Option<f64>> {
        self.cameras
            .iter()
            .map(|cam| match reference {
                Reference::Nearest(t) => cam.series().nearest(t).map(|(_, v)| v),
                Reference::WindowMean(w) => cam.series().mean_in(w.start, w.end),
            })
            .collect()
    }

    /// Brightness change at `t` for cameras with a usable value and a
    /// reference.
    pub fn deltas(
        &self,
        t: Timestamp,
        policy: &StalenessPolicy,
        references: &[Option<f64>],
    ) -> Vec<CameraDelta> {
        self.cameras
            .iter()
            .zip(references)
            .filter_map(|(cam, reference)| {
                let value = cam.series().at(t, policy).usable()?;
                Some(CameraDelta {
                    camera_id: cam.id().to_string(),
                    coordinates: cam.coordinates(),
                    delta: value - (*reference)?,
                })
            })
            .collect()
    }

    /// Camera brightness spans inside `window`, each placed at the
    /// camera's QD latitude. Cameras with no data in the window are skipped.
    ///
    /// The band reference for a `Nearest` reference is the windowed sample
    /// closest to the reference time. For `WindowMean` it is the mean over
    /// the reference window; cameras without data there get no reference.
    pub fn qd_bands<M: QdModel + ?Sized>(
        &self,
        model: &M,
        altitude_km: f64,
        epoch: NaiveDateTime,
        window: TimeWindow,
        reference: Reference,
    ) -> Vec<QdBand> {
        let default_last = Duration::minutes(DEFAULT_LAST_SPAN_MINUTES);
        self.cameras
            .iter()
            .filter_map(|cam| {
                let series = cam.series();
                let spans = series.spans_in(window.start, window.end, default_last);
                if spans.is_empty() {
                    return None;
                }
                let reference = match reference {
                    Reference::Nearest(t) => {
                        series.nearest_in(t, window.start, window.end).map(|(_, v)| v)
                    }
                    Reference::WindowMean(w) => {
                        let mean = series.mean_in(w.start, w.end);
                        if mean.is_none() {
                            warn!(
                                "camera {}: no data in reference window, band has no deltas",
                                cam.id()
                            );
                        }
                        mean
                    }
                };
                Some(QdBand {
                    camera_id: cam.id().to_string(),
                    qd_latitude: cam.qd_latitude(model, altitude_km, epoch),
                    spans,
                    reference,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{parse_cameras, parse_magnetometers};
    use crate::data::series::parse_timestamp;

    fn ts(raw: &str) -> Timestamp {
        parse_timestamp(raw).unwrap()
    }

    fn session() -> Session {
        let cameras = parse_cameras(
            r#"{
                "EARLY": { "lon": 2.0, "lat": 47.0,
                           "lumd": { "20240510T2140": 18.0, "20240510T2200": 16.5 } },
                "LATE":  { "lon": 4.0, "lat": 45.0,
                           "lumd": { "20240510T2230": 19.0 } }
            }"#,
        )
        .unwrap();
        let magnetometers = parse_magnetometers(
            r#"{
                "CLF": { "lon": 2.26, "lat": 48.02,
                         "time": ["20240510T2130", "20240510T2140", "20240510T2150", "20240510T2300"],
                         "valeur": [1.0, 2.0, 3.0, 4.0] },
                "EBR": { "lon": 0.49, "lat": 40.96, "time": [], "valeur": [] }
            }"#,
        )
        .unwrap();
        Session::new(cameras, magnetometers)
    }

    fn window() -> TimeWindow {
        TimeWindow {
            start: ts("20240510T2135"),
            end: ts("20240510T2250"),
        }
    }

    #[test]
    fn frames_follow_base_magnetometer() {
        let s = session();
        assert_eq!(
            s.frame_times(None, window()),
            vec![ts("20240510T2140"), ts("20240510T2150")]
        );
        assert!(s.frame_times(Some("EBR"), window()).is_empty());
        assert!(s.frame_times(Some("NOPE"), window()).is_empty());
    }

    #[test]
    fn snapshot_skips_cameras_without_history() {
        let s = session();
        let frame = s.snapshot(ts("20240510T2150"), &StalenessPolicy::Unbounded);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].camera_id, "EARLY");
        assert_eq!(frame[0].lookup.usable(), Some(18.0));
    }

    #[test]
    fn snapshot_reports_staleness() {
        let s = session();
        let frame = s.snapshot(ts("20240510T2300"), &StalenessPolicy::max_age_minutes(45));
        let early = frame.iter().find(|c| c.camera_id == "EARLY").unwrap();
        assert!(early.lookup.is_stale() && early.lookup.is_past_end());
        let late = frame.iter().find(|c| c.camera_id == "LATE").unwrap();
        assert_eq!(late.lookup.usable(), Some(19.0));
    }

    #[test]
    fn deltas_against_nearest_reference() {
        let s = session();
        let refs = s.reference_brightness(Reference::Nearest(ts("20240510T2140")));
        assert_eq!(refs, vec![Some(18.0), Some(19.0)]);

        let deltas = s.deltas(ts("20240510T2200"), &StalenessPolicy::Unbounded, &refs);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].camera_id, "EARLY");
        assert!((deltas[0].delta + 1.5).abs() < 1e-12);
    }

    #[test]
    fn window_mean_reference_can_be_missing() {
        let s = session();
        let refs = s.reference_brightness(Reference::WindowMean(TimeWindow {
            start: ts("20240510T2130"),
            end: ts("20240510T2210"),
        }));
        assert_eq!(refs, vec![Some(17.25), None]);
        let deltas = s.deltas(ts("20240510T2240"), &StalenessPolicy::Unbounded, &refs);
        assert_eq!(deltas.len(), 1);
    }

    #[test]
    fn qd_bands_cover_cameras_with_data_in_window() {
        let s = session();
        let identity = |lat: f64, _: f64, _: f64, _: NaiveDateTime| lat;
        let bands = s.qd_bands(
            &identity,
            110.0,
            ts("20240510T0000"),
            window(),
            Reference::Nearest(ts("20240510T2140")),
        );
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].qd_latitude, 47.0);
        assert_eq!(bands[0].spans.len(), 2);
        assert_eq!(bands[0].spans[0].duration, Duration::minutes(20));
        assert_eq!(bands[1].spans[0].duration, Duration::minutes(10));
    }

    #[test]
    fn qd_band_nearest_reference_stays_inside_window() {
        let s = session();
        let identity = |lat: f64, _: f64, _: f64, _: NaiveDateTime| lat;
        // Window starts after EARLY's 21:40 sample, the closest to 21:40.
        let window = TimeWindow {
            start: ts("20240510T2150"),
            end: ts("20240510T2250"),
        };
        let bands = s.qd_bands(
            &identity,
            110.0,
            ts("20240510T0000"),
            window,
            Reference::Nearest(ts("20240510T2140")),
        );
        let early = bands.iter().find(|b| b.camera_id == "EARLY").unwrap();
        assert_eq!(early.reference, Some(16.5));
        assert_eq!(early.deltas(), vec![Some(0.0)]);
        let late = bands.iter().find(|b| b.camera_id == "LATE").unwrap();
        assert_eq!(late.reference, Some(19.0));
    }

    #[test]
    fn qd_band_window_mean_reference_skips_empty_windows() {
        let s = session();
        let identity = |lat: f64, _: f64, _: f64, _: NaiveDateTime| lat;
        let reference = Reference::WindowMean(TimeWindow {
            start: ts("20240510T2130"),
            end: ts("20240510T2210"),
        });
        let bands = s.qd_bands(&identity, 110.0, ts("20240510T0000"), window(), reference);
        let early = bands.iter().find(|b| b.camera_id == "EARLY").unwrap();
        assert_eq!(early.reference, Some(17.25));
        assert_eq!(early.deltas(), vec![Some(0.75), Some(-0.75)]);
        let late = bands.iter().find(|b| b.camera_id == "LATE").unwrap();
        assert_eq!(late.reference, None);
        assert_eq!(late.deltas(), vec![None]);
    }

    #[test]
    fn associations_use_the_whole_camera_set() {
        let s = session();
        let assoc = s.associations(1);
        assert_eq!(assoc.len(), 2);
        assert_eq!(assoc[0].best.as_ref().unwrap().camera_id, "EARLY");
        assert_eq!(assoc[1].best.as_ref().unwrap().camera_id, "LATE");
    }
}
