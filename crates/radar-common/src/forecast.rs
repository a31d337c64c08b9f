//! Precipitation forecast values produced by the decoder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Precipitation at the configured location for one radar frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Frame valid-at time plus its forecast lead time.
    pub prediction_time: DateTime<Utc>,
    /// Precipitation in millimetres; `None` when the radar has no data.
    pub precipitation_mm: Option<f64>,
}

impl ForecastPoint {
    pub fn new(prediction_time: DateTime<Utc>, precipitation_mm: Option<f64>) -> Self {
        Self {
            prediction_time,
            precipitation_mm,
        }
    }

    /// Whether any precipitation is forecast. `None` when there is no data.
    pub fn is_raining(&self) -> Option<bool> {
        self.precipitation_mm.map(|mm| mm > 0.0)
    }

    /// True only when a positive precipitation value is present.
    pub fn has_rain(&self) -> bool {
        self.is_raining().unwrap_or(false)
    }
}

/// Sort points ascending by prediction time, keeping archive order for ties.
pub fn sort_chronologically(points: &mut [ForecastPoint]) {
    points.sort_by_key(|p| p.prediction_time);
}
