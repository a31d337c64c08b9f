//! Common types shared across the rain radar crates and services.

pub mod error;
pub mod forecast;
pub mod grid;
pub mod views;

pub use error::{ErrorKind, FormatError, RadarError, RadarResult};
pub use forecast::ForecastPoint;
pub use grid::GridCoordinate;
pub use views::{OffsetOutlook, RainOutlook, BUCKET_MINUTES, FORECAST_OFFSETS};
