use chrono::{Duration, NaiveDateTime};

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Naive UTC timestamp at minute resolution.
pub type Timestamp = NaiveDateTime;

/// Canonical measurement timestamp layout, e.g. `20240510T2140`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M";

/// Parse a measurement timestamp.
///
/// Accepts the canonical `YYYYMMDDTHHMM` layout and the compact
/// `YYYYMMDDHHMM` layout (same fields, no `T`) that some exports use.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let canonical;
    let text = if raw.len() == 12 && raw.bytes().all(|b| b.is_ascii_digit()) {
        canonical = format!("{}T{}", &raw[..8], &raw[8..]);
        canonical.as_str()
    } else {
        raw
    };
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()
}

/// Format a timestamp in the canonical layout.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Staleness policy
// ---------------------------------------------------------------------------

/// How long a carried-forward value stays usable.
///
/// `Unbounded` reuses the last sample forever; `MaxAge` marks anything
/// older than the horizon as [`Lookup::Stale`]. Age equal to the horizon is
/// still fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalenessPolicy {
    #[default]
    Unbounded,
    MaxAge(Duration),
}

impl StalenessPolicy {
    pub fn max_age_minutes(minutes: i64) -> Self {
        StalenessPolicy::MaxAge(Duration::minutes(minutes))
    }

    fn is_stale(&self, age: Duration) -> bool {
        match self {
            StalenessPolicy::Unbounded => false,
            StalenessPolicy::MaxAge(horizon) => age > *horizon,
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup result
// ---------------------------------------------------------------------------

/// Result of a point query against a [`Series`].
///
/// `past_end` is `true` when the query time lies after the last sample, i.e.
/// the series no longer covers it and the value is pure carry-forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    /// A sample exists exactly at the query time.
    Exact(f64),
    /// Nearest-before sample, within the staleness horizon.
    CarriedForward {
        value: f64,
        age: Duration,
        past_end: bool,
    },
    /// Nearest-before sample, older than the staleness horizon.
    Stale {
        value: f64,
        age: Duration,
        past_end: bool,
    },
    /// Query time precedes the first sample, or the series is empty.
    NoData,
}

impl Lookup {
    /// The value a renderer may use: exact or fresh carry-forward.
    pub fn usable(&self) -> Option<f64> {
        match self {
            Lookup::Exact(v) => Some(*v),
            Lookup::CarriedForward { value, .. } => Some(*value),
            Lookup::Stale { .. } | Lookup::NoData => None,
        }
    }

    /// The last known value regardless of staleness.
    pub fn last_known(&self) -> Option<f64> {
        match self {
            Lookup::Exact(v) => Some(*v),
            Lookup::CarriedForward { value, .. } | Lookup::Stale { value, .. } => Some(*value),
            Lookup::NoData => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Lookup::Stale { .. })
    }

    pub fn is_past_end(&self) -> bool {
        match self {
            Lookup::CarriedForward { past_end, .. } | Lookup::Stale { past_end, .. } => *past_end,
            _ => false,
        }
    }
}

/// One sample paired with how long it holds until the next one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: Timestamp,
    pub duration: Duration,
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// A sorted, duplicate-free scalar time series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    samples: Vec<(Timestamp, f64)>,
}

impl Series {
    /// Build a series from samples in arbitrary order.
    ///
    /// Sorting is stable, and a duplicate timestamp keeps the value that came
    /// last in the input. Returns the series and the number of merged
    /// duplicates.
    pub fn from_unsorted(mut samples: Vec<(Timestamp, f64)>) -> (Self, usize) {
        samples.sort_by_key(|(ts, _)| *ts);

        let mut merged = 0;
        let mut out: Vec<(Timestamp, f64)> = Vec::with_capacity(samples.len());
        for (ts, value) in samples {
            match out.last_mut() {
                Some(last) if last.0 == ts => {
                    last.1 = value;
                    merged += 1;
                }
                _ => out.push((ts, value)),
            }
        }
        (Series { samples: out }, merged)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[(Timestamp, f64)] {
        &self.samples
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.samples.iter().map(|(ts, _)| *ts)
    }

    pub fn first(&self) -> Option<(Timestamp, f64)> {
        self.samples.first().copied()
    }

    pub fn last(&self) -> Option<(Timestamp, f64)> {
        self.samples.last().copied()
    }

    /// Value at `t`, or the nearest-before sample under `policy`.
    pub fn at(&self, t: Timestamp, policy: &StalenessPolicy) -> Lookup {
        let idx = self.samples.partition_point(|(ts, _)| *ts <= t);
        if idx == 0 {
            return Lookup::NoData;
        }
        let (ts, value) = self.samples[idx - 1];
        if ts == t {
            return Lookup::Exact(value);
        }

        let age = t - ts;
        let past_end = idx == self.samples.len();
        if policy.is_stale(age) {
            Lookup::Stale {
                value,
                age,
                past_end,
            }
        } else {
            Lookup::CarriedForward {
                value,
                age,
                past_end,
            }
        }
    }

    /// Samples with `t0 <= ts <= t1`. Empty when `t0 > t1`.
    pub fn range(&self, t0: Timestamp, t1: Timestamp) -> &[(Timestamp, f64)] {
        if t0 > t1 {
            return &[];
        }
        let lo = self.samples.partition_point(|(ts, _)| *ts < t0);
        let hi = self.samples.partition_point(|(ts, _)| *ts <= t1);
        &self.samples[lo..hi]
    }

    /// Closest sample to `t` in either direction.
    ///
    /// When the previous and next samples are equally far away the later one
    /// is returned.
    pub fn nearest(&self, t: Timestamp) -> Option<(Timestamp, f64)> {
        nearest_of(&self.samples, t)
    }

    /// Closest sample to `t` among those inside `[t0, t1]`.
    pub fn nearest_in(&self, t: Timestamp, t0: Timestamp, t1: Timestamp) -> Option<(Timestamp, f64)> {
        nearest_of(self.range(t0, t1), t)
    }

    /// Mean value over the inclusive window `[t0, t1]`.
    pub fn mean_in(&self, t0: Timestamp, t1: Timestamp) -> Option<f64> {
        let window = self.range(t0, t1);
        if window.is_empty() {
            return None;
        }
        Some(window.iter().map(|(_, v)| v).sum::<f64>() / window.len() as f64)
    }

    /// Each sample with its duration until the next one.
    ///
    /// The last sample has no successor and is given `default_last`.
    pub fn spans(&self, default_last: Duration) -> Vec<Span> {
        spans_of(&self.samples, default_last)
    }

    /// Spans of the samples inside `[t0, t1]`. The last one in the window is
    /// given `default_last`.
    pub fn spans_in(&self, t0: Timestamp, t1: Timestamp, default_last: Duration) -> Vec<Span> {
        spans_of(self.range(t0, t1), default_last)
    }
}

fn nearest_of(samples: &[(Timestamp, f64)], t: Timestamp) -> Option<(Timestamp, f64)> {
    let idx = samples.partition_point(|(ts, _)| *ts < t);
    let after = samples.get(idx).copied();
    let before = idx.checked_sub(1).and_then(|i| samples.get(i).copied());

    match (before, after) {
        (Some(b), Some(a)) => {
            if t - b.0 < a.0 - t {
                Some(b)
            } else {
                Some(a)
            }
        }
        (b, a) => a.or(b),
    }
}

fn spans_of(samples: &[(Timestamp, f64)], default_last: Duration) -> Vec<Span> {
    samples
        .iter()
        .enumerate()
        .map(|(i, (start, value))| Span {
            start: *start,
            duration: samples
                .get(i + 1)
                .map(|(next, _)| *next - *start)
                .unwrap_or(default_last),
            value: *value,
        })
        .collect()
}
