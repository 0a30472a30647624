//! Batch output tables.
//!
//! [`build`] runs one pass over a [`Session`] and flattens associations,
//! cameras, contours, frame snapshots and QD bands into row records; [`Report::write_to`]
//! writes each table as CSV for an external renderer.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::color::{to_hex, ColorMapCache, DivergingMap, Gradient, Normalize};
use crate::config::BatchConfig;
use crate::contour::ContourSampler;
use crate::data::filter::{in_latitude_band, with_data_in};
use crate::data::model::Station;
use crate::data::series::{format_timestamp, Lookup};
use crate::error::{ConfigError, ReportError};
use crate::geomag::QdModel;
use crate::session::Session;

pub const ASSOCIATIONS_FILE: &str = "associations.csv";
pub const CAMERAS_FILE: &str = "cameras.csv";
pub const CONTOURS_FILE: &str = "contours.csv";
pub const CONTOUR_LABELS_FILE: &str = "contour_labels.csv";
pub const FRAMES_FILE: &str = "frames.csv";
pub const QD_BANDS_FILE: &str = "qd_bands.csv";

// ---------------------------------------------------------------------------
// Row records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRow {
    pub magnetometer_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub best_camera_id: Option<String>,
    pub best_distance: Option<f64>,
    /// Ranked neighbour ids joined with `;`.
    pub neighbors: String,
}

/// One camera on the all-cameras map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraRow {
    pub camera_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub in_band: bool,
    /// Has at least one sample inside the window.
    pub active: bool,
    /// Latitude colour; only for active cameras inside the band.
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourRow {
    pub qd_latitude: f64,
    pub index: usize,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourLabelRow {
    pub qd_latitude: f64,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRow {
    pub frame: String,
    pub camera_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub in_band: bool,
    pub status: &'static str,
    /// Usable brightness; empty when stale.
    pub value: Option<f64>,
    pub last_known: Option<f64>,
    pub age_minutes: i64,
    pub past_end: bool,
    pub brightness_color: Option<String>,
    pub delta: Option<f64>,
    pub delta_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QdBandRow {
    pub camera_id: String,
    pub qd_latitude: f64,
    pub start: String,
    pub duration_minutes: i64,
    pub value: f64,
    pub color: String,
    pub delta: Option<f64>,
    pub delta_color: Option<String>,
}

/// All tables produced by one batch pass.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub associations: Vec<AssociationRow>,
    pub cameras: Vec<CameraRow>,
    pub contours: Vec<ContourRow>,
    pub contour_labels: Vec<ContourLabelRow>,
    pub frames: Vec<FrameRow>,
    pub qd_bands: Vec<QdBandRow>,
}

fn lookup_status(lookup: &Lookup) -> (&'static str, i64) {
    match lookup {
        Lookup::Exact(_) => ("exact", 0),
        Lookup::CarriedForward { age, .. } => ("carried", age.num_minutes()),
        Lookup::Stale { age, .. } => ("stale", age.num_minutes()),
        Lookup::NoData => ("no_data", 0),
    }
}

// ---------------------------------------------------------------------------
// Batch pass
// ---------------------------------------------------------------------------

/// Run the whole pipeline over `session` with the settings in `config`.
pub fn build<M: QdModel + ?Sized>(
    session: &Session,
    config: &BatchConfig,
    model: &M,
    colors: &mut ColorMapCache,
) -> Result<Report, ConfigError> {
    let window = config.window()?;
    let policy = config.staleness_policy();
    let reference = config.reference_times()?;
    let params = config.sampler_params()?;
    let camera_epoch = config.camera_epoch()?;
    let scheme = &config.color;

    let mut report = Report::default();

    // Associations.
    for (assoc, mag) in session
        .associations(config.neighbors)
        .into_iter()
        .zip(session.magnetometers())
    {
        let coords = mag.coordinates();
        report.associations.push(AssociationRow {
            magnetometer_id: assoc.magnetometer_id,
            latitude: coords.latitude,
            longitude: coords.longitude,
            best_camera_id: assoc.best.as_ref().map(|n| n.camera_id.clone()),
            best_distance: assoc.best.as_ref().map(|n| n.distance),
            neighbors: assoc
                .neighbors
                .iter()
                .map(|n| n.camera_id.as_str())
                .collect::<Vec<_>>()
                .join(";"),
        });
    }

    // Cameras, coloured by latitude when inside the band with data in the window.
    let cameras = session.cameras().as_slice();
    let in_band: HashSet<usize> = in_latitude_band(session.cameras(), config.latitude_band())
        .into_iter()
        .collect();
    let active: HashSet<usize> = with_data_in(session.cameras(), window).into_iter().collect();
    info!(
        "{} of {} cameras have data in the window",
        active.len(),
        cameras.len()
    );
    let lat_map = colors.latitude_map(scheme.lat_min, scheme.lat_max, scheme.lat_transition);
    report.cameras = cameras
        .iter()
        .enumerate()
        .map(|(i, cam)| {
            let coords = cam.coordinates();
            let (in_band, active) = (in_band.contains(&i), active.contains(&i));
            CameraRow {
                camera_id: cam.id().to_string(),
                latitude: coords.latitude,
                longitude: coords.longitude,
                in_band,
                active,
                color: (in_band && active).then(|| to_hex(lat_map.color_for(coords.latitude))),
            }
        })
        .collect();

    // Contours.
    let altitude_km = params.altitude_km;
    let sampler = ContourSampler::new(model, params);
    for line in sampler.sample_levels(&config.contours.levels) {
        if let Some((longitude, latitude)) = line.label_anchor(config.contours.label_offset_lon) {
            report.contour_labels.push(ContourLabelRow {
                qd_latitude: line.qd_latitude,
                longitude,
                latitude,
            });
        }
        report
            .contours
            .extend(line.points.iter().enumerate().map(|(index, &(lon, lat))| ContourRow {
                qd_latitude: line.qd_latitude,
                index,
                longitude: lon,
                latitude: lat,
            }));
    }

    // Frames.
    let in_band_ids: HashSet<&str> = in_band.iter().map(|&i| cameras[i].id()).collect();

    let brightness = Normalize::new(scheme.brightness_min, scheme.brightness_max);
    let greys = Gradient::greys();
    let diverging = DivergingMap::symmetric(scheme.delta_range);
    let references = session.reference_brightness(reference);

    let frame_times = session.frame_times(config.base_magnetometer.as_deref(), window);
    for &t in &frame_times {
        let deltas: HashMap<String, f64> = session
            .deltas(t, &policy, &references)
            .into_iter()
            .map(|d| (d.camera_id, d.delta))
            .collect();
        let frame = format_timestamp(&t);

        for sample in session.snapshot(t, &policy) {
            let (status, age_minutes) = lookup_status(&sample.lookup);
            let value = sample.lookup.usable();
            let delta = deltas.get(&sample.camera_id).copied();
            report.frames.push(FrameRow {
                frame: frame.clone(),
                in_band: in_band_ids.contains(sample.camera_id.as_str()),
                latitude: sample.coordinates.latitude,
                longitude: sample.coordinates.longitude,
                status,
                value,
                last_known: sample.lookup.last_known(),
                age_minutes,
                past_end: sample.lookup.is_past_end(),
                brightness_color: value.map(|v| to_hex(greys.at(brightness.apply(v)))),
                delta,
                delta_color: delta.map(|d| to_hex(diverging.color_for(d))),
                camera_id: sample.camera_id,
            });
        }
    }

    // QD bands.
    for band in session.qd_bands(model, altitude_km, camera_epoch, window, reference) {
        let deltas = band.deltas();
        report
            .qd_bands
            .extend(band.spans.iter().zip(deltas).map(|(span, delta)| QdBandRow {
                camera_id: band.camera_id.clone(),
                qd_latitude: band.qd_latitude,
                start: format_timestamp(&span.start),
                duration_minutes: span.duration.num_minutes(),
                value: span.value,
                color: to_hex(greys.at(brightness.apply(span.value))),
                delta,
                delta_color: delta.map(|d| to_hex(diverging.color_for(d))),
            }));
    }

    info!(
        "{} associations, {} contour points, {} frames ({} rows), {} band spans",
        report.associations.len(),
        report.contours.len(),
        frame_times.len(),
        report.frames.len(),
        report.qd_bands.len()
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// CSV output
// ---------------------------------------------------------------------------

fn write_table<R: Serialize>(dir: &Path, name: &str, rows: &[R]) -> Result<(), ReportError> {
    let path = dir.join(name);
    let file = File::create(&path).map_err(|source| ReportError::Io {
        path: path.clone(),
        source,
    })?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| ReportError::Io { path, source })?;
    Ok(())
}

impl Report {
    /// Write every table into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<(), ReportError> {
        std::fs::create_dir_all(dir).map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        write_table(dir, ASSOCIATIONS_FILE, &self.associations)?;
        write_table(dir, CAMERAS_FILE, &self.cameras)?;
        write_table(dir, CONTOURS_FILE, &self.contours)?;
        write_table(dir, CONTOUR_LABELS_FILE, &self.contour_labels)?;
        write_table(dir, FRAMES_FILE, &self.frames)?;
        write_table(dir, QD_BANDS_FILE, &self.qd_bands)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{parse_cameras, parse_magnetometers};
    use chrono::NaiveDateTime;

    fn session() -> Session {
        let cameras = parse_cameras(
            r#"{
                "A": { "lon": 5.0, "lat": 46.0,
                       "lumd": { "20240510T2140": 18.0, "20240510T2200": 16.0 } },
                "B": { "lon": 3.0, "lat": 41.0,
                       "lumd": { "20240510T2150": 20.0 } }
            }"#,
        )
        .unwrap();
        let magnetometers = parse_magnetometers(
            r#"{
                "M": { "lon": 4.5, "lat": 45.5,
                       "time": ["20240510T2140", "20240510T2200"],
                       "valeur": [0.1, 0.2] }
            }"#,
        )
        .unwrap();
        Session::new(cameras, magnetometers)
    }

    fn config() -> BatchConfig {
        BatchConfig::from_json(
            r#"{
                "window": { "start": "20240510T2130", "end": "20240510T2230" },
                "neighbors": 2,
                "reference": { "mode": "nearest", "time": "20240510T2140" },
                "contours": { "levels": [45.0],
                              "longitudes": { "kind": "linspace", "start": 0, "end": 10, "count": 5 } }
            }"#,
        )
        .unwrap()
    }

    fn identity(lat: f64, _: f64, _: f64, _: NaiveDateTime) -> f64 {
        lat
    }

    #[test]
    fn associations_list_ranked_neighbors() {
        let report = build(&session(), &config(), &identity, &mut ColorMapCache::new()).unwrap();
        assert_eq!(report.associations.len(), 1);
        let row = &report.associations[0];
        assert_eq!(row.best_camera_id.as_deref(), Some("A"));
        assert!((row.best_distance.unwrap() - 0.5f64.sqrt()).abs() < 1e-9);
        assert_eq!(row.neighbors, "A;B");
    }

    #[test]
    fn only_active_cameras_inside_band_are_coloured() {
        let cameras = parse_cameras(
            r#"{
                "A": { "lon": 5.0, "lat": 46.0, "lumd": { "20240510T2140": 18.0 } },
                "B": { "lon": 3.0, "lat": 41.0, "lumd": { "20240510T2150": 20.0 } },
                "IDLE": { "lon": 2.0, "lat": 47.0, "lumd": { "20240509T2140": 19.0 } }
            }"#,
        )
        .unwrap();
        let session = Session::new(cameras, session().magnetometers().clone());
        let report = build(&session, &config(), &identity, &mut ColorMapCache::new()).unwrap();

        let row = |id: &str| report.cameras.iter().find(|r| r.camera_id == id).unwrap();
        let a = row("A");
        assert!(a.in_band && a.active);
        assert!(a.color.as_deref().is_some_and(|c| c.starts_with('#') && c.len() == 7));

        let b = row("B");
        assert!(!b.in_band && b.active);
        assert_eq!(b.color, None);

        let idle = row("IDLE");
        assert!(idle.in_band && !idle.active);
        assert_eq!(idle.color, None);
    }

    #[test]
    fn contour_rows_follow_the_level() {
        let report = build(&session(), &config(), &identity, &mut ColorMapCache::new()).unwrap();
        assert_eq!(report.contours.len(), 5);
        assert!(report.contours.iter().all(|r| (r.latitude - 45.0).abs() <= 0.1));
        assert_eq!(report.contour_labels.len(), 1);
        assert!((report.contour_labels[0].longitude - (5.0 - 20.0)).abs() < 1e-9);
    }

    #[test]
    fn frames_carry_status_and_delta() {
        let report = build(&session(), &config(), &identity, &mut ColorMapCache::new()).unwrap();
        let at = |frame: &str, cam: &str| {
            report
                .frames
                .iter()
                .find(|r| r.frame == frame && r.camera_id == cam)
                .cloned()
        };

        let a = at("20240510T2140", "A").unwrap();
        assert_eq!(a.status, "exact");
        assert_eq!(a.delta, Some(0.0));
        assert!(a.in_band);
        assert!(at("20240510T2140", "B").is_none());

        let b = at("20240510T2200", "B").unwrap();
        assert_eq!(b.status, "carried");
        assert_eq!(b.age_minutes, 10);
        assert!(b.past_end);
        assert!(!b.in_band);
        // Nearest reference for B is its only sample.
        assert_eq!(b.delta, Some(0.0));

        let a = at("20240510T2200", "A").unwrap();
        assert_eq!(a.delta, Some(-2.0));
        assert!(a.delta_color.is_some());
    }

    #[test]
    fn qd_band_rows_span_samples() {
        let report = build(&session(), &config(), &identity, &mut ColorMapCache::new()).unwrap();
        let a: Vec<_> = report.qd_bands.iter().filter(|r| r.camera_id == "A").collect();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].duration_minutes, 20);
        assert_eq!(a[1].duration_minutes, 10);
        assert_eq!(a[0].qd_latitude, 46.0);
        // Deltas against A's 21:40 sample, the windowed one nearest 21:40.
        assert_eq!(a[0].delta, Some(0.0));
        assert_eq!(a[1].delta, Some(-2.0));
        assert!(a[1].delta_color.is_some());
    }

    #[test]
    fn camera_qd_latitude_uses_camera_epoch() {
        use chrono::Timelike;
        // Shifts latitude by the hour of the epoch it is evaluated at.
        let hourly = |lat: f64, _: f64, _: f64, at: NaiveDateTime| lat + at.hour() as f64;
        let report = build(&session(), &config(), &hourly, &mut ColorMapCache::new()).unwrap();
        let a = report.qd_bands.iter().find(|r| r.camera_id == "A").unwrap();
        assert_eq!(a.qd_latitude, 46.0);
    }

    #[test]
    fn qd_band_rows_without_reference_have_no_delta() {
        let mut config = config();
        config.reference = crate::config::ReferenceConfig::WindowMean {
            start: "20240510T2135".to_string(),
            end: "20240510T2145".to_string(),
        };
        let report = build(&session(), &config, &identity, &mut ColorMapCache::new()).unwrap();
        let a: Vec<_> = report.qd_bands.iter().filter(|r| r.camera_id == "A").collect();
        assert_eq!(a[1].delta, Some(-2.0));
        let b: Vec<_> = report.qd_bands.iter().filter(|r| r.camera_id == "B").collect();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].delta, None);
        assert_eq!(b[0].delta_color, None);
    }
}
