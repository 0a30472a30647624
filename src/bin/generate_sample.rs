use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};

use aurora_correlate::data::series::format_timestamp;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minutes since the start of the night, 20:00 UTC.
fn minutes(t: NaiveDateTime, start: NaiveDateTime) -> f64 {
    (t - start).num_minutes() as f64
}

/// Sky brightness in mag/arcsec²: a dark baseline with an auroral
/// brightening (lower magnitude) that is stronger further north.
fn sky_brightness(t: f64, lat: f64, rng: &mut SimpleRng) -> f64 {
    let strength = ((lat - 40.0) / 10.0).clamp(0.0, 1.2);
    let baseline = 20.8 - 0.05 * (lat - 45.0).abs();
    baseline - gaussian(t, 150.0, 40.0, 2.5 * strength) + rng.gauss(0.0, 0.05)
}

/// Horizontal field disturbance in nT around the same substorm.
fn field_disturbance(t: f64, lat: f64, rng: &mut SimpleRng) -> f64 {
    let strength = ((lat - 35.0) / 10.0).clamp(0.2, 2.0);
    -gaussian(t, 145.0, 30.0, 400.0 * strength) + rng.gauss(0.0, 2.0)
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

const CAMERAS: [(&str, f64, f64); 6] = [
    ("BRITTANY", 48.11, -3.42),
    ("PYRENEES", 42.94, 0.14),
    ("JURA", 46.78, 6.12),
    ("ARDENNES", 49.77, 4.72),
    ("CEVENNES", 44.12, 3.58),
    ("NORMANDY", 49.18, -0.37),
];

const MAGNETOMETERS: [(&str, f64, f64); 3] = [
    ("CLF", 48.02, 2.26),
    ("EBR", 40.96, 0.49),
    ("HAD", 50.99, -4.48),
];

#[derive(Parser)]
#[command(name = "generate_sample", about = "Write a synthetic night of camera and magnetometer data", long_about = None)]
struct Cli {
    /// Directory receiving cameras.json and magnetometers.json
    #[arg(default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    let out_dir = Cli::parse().out_dir;
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let start = NaiveDate::from_ymd_opt(2024, 5, 10)
        .and_then(|d| d.and_hms_opt(20, 0, 0))
        .context("building start time")?;
    let night = move |step: i64, count: i64| {
        (0..count).map(move |i| start + Duration::minutes(i * step))
    };

    // Cameras: a reading every 10 minutes, with some gaps.
    let mut cameras = Map::new();
    for (i, &(id, lat, lon)) in CAMERAS.iter().enumerate() {
        let mut lumd = Map::new();
        for t in night(10, 49) {
            // Each camera misses a slot now and then.
            if rng.next_f64() < 0.08 + 0.02 * i as f64 {
                continue;
            }
            let value = sky_brightness(minutes(t, start), lat, &mut rng);
            lumd.insert(format_timestamp(&t), json!((value * 100.0).round() / 100.0));
        }
        cameras.insert(id.to_string(), json!({ "lon": lon, "lat": lat, "lumd": lumd }));
    }

    // Magnetometers: a reading every 5 minutes.
    let mut magnetometers = Map::new();
    for &(id, lat, lon) in &MAGNETOMETERS {
        let (time, valeur): (Vec<String>, Vec<f64>) = night(5, 97)
            .map(|t| {
                let value = field_disturbance(minutes(t, start), lat, &mut rng);
                (format_timestamp(&t), (value * 10.0).round() / 10.0)
            })
            .unzip();
        magnetometers.insert(
            id.to_string(),
            json!({ "lon": lon, "lat": lat, "time": time, "valeur": valeur }),
        );
    }

    for (name, doc) in [
        ("cameras.json", Value::Object(cameras)),
        ("magnetometers.json", Value::Object(magnetometers)),
    ] {
        let path = out_dir.join(name);
        let text = serde_json::to_string_pretty(&doc)?;
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    println!(
        "{} cameras, {} magnetometers, night of 2024-05-10",
        CAMERAS.len(),
        MAGNETOMETERS.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn output_directory_defaults_to_current() {
        assert_eq!(Cli::try_parse_from(["generate_sample"]).unwrap().out_dir, PathBuf::from("."));
        assert!(Cli::try_parse_from(["generate_sample", "a", "b"]).is_err());
    }

    #[test]
    fn generator_is_deterministic() {
        let mut a = SimpleRng::new(42);
        let mut b = SimpleRng::new(42);
        assert!((0..16).all(|_| a.next_u64() == b.next_u64()));
    }
}
