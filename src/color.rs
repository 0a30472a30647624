use std::collections::HashMap;

use palette::{IntoColor, LinSrgb, Mix, Srgb};

/// 8-bit sRGB colour handed to renderers.
pub type Rgb8 = Srgb<u8>;

/// Number of entries in a sampled colour map.
pub const LUT_SIZE: usize = 256;

/// `#rrggbb` form, as written to CSV output.
pub fn to_hex(color: Rgb8) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

fn lin(r: f32, g: f32, b: f32) -> LinSrgb {
    Srgb::new(r, g, b).into_linear()
}

fn to_rgb8(c: LinSrgb) -> Rgb8 {
    let rgb: Srgb = c.into_color();
    Srgb::new(
        (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Linear map from `[vmin, vmax]` onto `[0, 1]`, clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub vmin: f64,
    pub vmax: f64,
}

impl Normalize {
    pub fn new(vmin: f64, vmax: f64) -> Self {
        Normalize { vmin, vmax }
    }

    pub fn apply(&self, value: f64) -> f32 {
        if self.vmax <= self.vmin {
            return 0.0;
        }
        ((value - self.vmin) / (self.vmax - self.vmin)).clamp(0.0, 1.0) as f32
    }
}

// ---------------------------------------------------------------------------
// Gradients
// ---------------------------------------------------------------------------

/// Two-stop gradient mixed in linear RGB.
#[derive(Debug, Clone, Copy)]
pub struct Gradient {
    from: LinSrgb,
    to: LinSrgb,
}

impl Gradient {
    /// White → black, for absolute sky brightness.
    pub fn greys() -> Self {
        Gradient {
            from: lin(1.0, 1.0, 1.0),
            to: lin(0.0, 0.0, 0.0),
        }
    }

    /// Light → dark red.
    pub fn reds() -> Self {
        Gradient {
            from: lin(1.0, 0.96, 0.94),
            to: lin(0.40, 0.0, 0.05),
        }
    }

    /// Light → dark green.
    pub fn greens() -> Self {
        Gradient {
            from: lin(0.97, 0.99, 0.96),
            to: lin(0.0, 0.27, 0.11),
        }
    }

    pub fn at(&self, t: f32) -> Rgb8 {
        to_rgb8(self.from.mix(self.to, t.clamp(0.0, 1.0)))
    }
}

/// Diverging map for brightness deltas: blue below zero, black at zero,
/// orange above.
#[derive(Debug, Clone, Copy)]
pub struct DivergingMap {
    norm: Normalize,
    low: LinSrgb,
    mid: LinSrgb,
    high: LinSrgb,
}

impl DivergingMap {
    /// Symmetric map over `[-half_range, half_range]`.
    pub fn symmetric(half_range: f64) -> Self {
        DivergingMap {
            norm: Normalize::new(-half_range, half_range),
            low: lin(0.62, 0.85, 0.98),
            mid: lin(0.07, 0.07, 0.07),
            high: lin(1.0, 0.68, 0.68),
        }
    }

    pub fn color_for(&self, delta: f64) -> Rgb8 {
        let t = self.norm.apply(delta);
        if t < 0.5 {
            to_rgb8(self.low.mix(self.mid, t * 2.0))
        } else {
            to_rgb8(self.mid.mix(self.high, (t - 0.5) * 2.0))
        }
    }
}

// ---------------------------------------------------------------------------
// Latitude colour map: red below the transition, green above
// ---------------------------------------------------------------------------

/// Lookup table over `[lat_min, lat_max]` split at a transition latitude.
///
/// Below the transition the colours run from dark red at `lat_min` to light
/// red at the transition; above it from light green to dark green at
/// `lat_max`.
#[derive(Debug, Clone)]
pub struct LatitudeColorMap {
    norm: Normalize,
    lut: Vec<Rgb8>,
}

impl LatitudeColorMap {
    pub fn new(lat_min: f64, lat_max: f64, transition: f64) -> Self {
        let norm = Normalize::new(lat_min, lat_max);
        let split = ((LUT_SIZE as f32 * norm.apply(transition)) as usize).min(LUT_SIZE);

        // Both halves skip the palest 10% of their gradient.
        let ramp = |i: usize, n: usize| -> f32 {
            if n <= 1 {
                1.0
            } else {
                0.1 + 0.9 * i as f32 / (n - 1) as f32
            }
        };
        let reds = Gradient::reds();
        let greens = Gradient::greens();

        let mut lut = Vec::with_capacity(LUT_SIZE);
        lut.extend((0..split).rev().map(|i| reds.at(ramp(i, split))));
        lut.extend((0..LUT_SIZE - split).map(|i| greens.at(ramp(i, LUT_SIZE - split))));

        LatitudeColorMap { norm, lut }
    }

    pub fn color_for(&self, latitude: f64) -> Rgb8 {
        let idx = (self.norm.apply(latitude) * (LUT_SIZE - 1) as f32).round() as usize;
        self.lut[idx.min(self.lut.len() - 1)]
    }
}

/// Cache of latitude maps keyed by `(lat_min, lat_max, transition)`.
///
/// Owned by the caller; there is no process-wide instance.
#[derive(Debug, Default)]
pub struct ColorMapCache {
    maps: HashMap<(u64, u64, u64), LatitudeColorMap>,
}

impl ColorMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latitude_map(&mut self, lat_min: f64, lat_max: f64, transition: f64) -> &LatitudeColorMap {
        let key = (lat_min.to_bits(), lat_max.to_bits(), transition.to_bits());
        self.maps
            .entry(key)
            .or_insert_with(|| LatitudeColorMap::new(lat_min, lat_max, transition))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
