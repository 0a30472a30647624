/// Data layer: station types, time series, loading, and filtering.
///
/// Architecture:
/// ```text
///  cameras.json / magnetometers.json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse JSON → StationSet<Camera> / StationSet<Magnetometer>
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ model/series  │  coordinates + sorted Series, carry-forward lookup
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  latitude band / time window → station indices
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod series;
