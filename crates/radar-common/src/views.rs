//! Derived views over an ascending forecast sequence.
//!
//! Radar frames come in 5 minute buckets. A bucket "covers" an instant when
//! its prediction time is less than one bucket before that instant, so the
//! lookups below search for the first point strictly after a threshold.
//! All functions expect points sorted ascending by prediction time.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::ForecastPoint;

/// Spacing between radar forecast frames, in minutes.
pub const BUCKET_MINUTES: i64 = 5;

/// Lead times (minutes) reported by [`RainOutlook`].
pub const FORECAST_OFFSETS: [i64; 24] = [
    5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70, 75, 80, 85, 90, 95, 100, 105, 110, 115,
    120,
];

fn first_after(points: &[ForecastPoint], threshold: DateTime<Utc>) -> Option<&ForecastPoint> {
    points.iter().find(|p| p.prediction_time > threshold)
}

/// The point covering `now`.
pub fn current(points: &[ForecastPoint], now: DateTime<Utc>) -> Option<&ForecastPoint> {
    first_after(points, now - Duration::minutes(BUCKET_MINUTES))
}

/// The point covering `now + minutes`.
pub fn at_offset(
    points: &[ForecastPoint],
    now: DateTime<Utc>,
    minutes: i64,
) -> Option<&ForecastPoint> {
    first_after(points, now + Duration::minutes(minutes - BUCKET_MINUTES))
}

/// The first future point with positive precipitation.
pub fn next_rain(points: &[ForecastPoint], now: DateTime<Utc>) -> Option<&ForecastPoint> {
    points
        .iter()
        .find(|p| p.has_rain() && p.prediction_time > now)
}

/// Whole minutes from `now` until [`next_rain`], rounded down.
pub fn minutes_until_rain(points: &[ForecastPoint], now: DateTime<Utc>) -> Option<i64> {
    next_rain(points, now).map(|p| (p.prediction_time - now).num_seconds().div_euclid(60))
}

/// Forecast at one lead time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetOutlook {
    pub minutes: i64,
    pub prediction_time: Option<DateTime<Utc>>,
    pub precipitation_mm: Option<f64>,
    pub raining: Option<bool>,
}

/// Every derived view evaluated at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainOutlook {
    pub evaluated_at: DateTime<Utc>,
    pub precipitation_mm: Option<f64>,
    pub prediction_time: Option<DateTime<Utc>>,
    pub raining: Option<bool>,
    pub rain_expected_at: Option<DateTime<Utc>>,
    pub rain_expected_precipitation_mm: Option<f64>,
    pub rain_expected_in_minutes: Option<i64>,
    pub offsets: Vec<OffsetOutlook>,
}

impl RainOutlook {
    pub fn evaluate(points: &[ForecastPoint], now: DateTime<Utc>) -> Self {
        let now_point = current(points, now);
        let rain = next_rain(points, now);

        let offsets = FORECAST_OFFSETS
            .iter()
            .map(|&minutes| {
                let point = at_offset(points, now, minutes);
                OffsetOutlook {
                    minutes,
                    prediction_time: point.map(|p| p.prediction_time),
                    precipitation_mm: point.and_then(|p| p.precipitation_mm),
                    raining: point.and_then(|p| p.is_raining()),
                }
            })
            .collect();

        Self {
            evaluated_at: now,
            precipitation_mm: now_point.and_then(|p| p.precipitation_mm),
            prediction_time: now_point.map(|p| p.prediction_time),
            raining: now_point.and_then(|p| p.is_raining()),
            rain_expected_at: rain.map(|p| p.prediction_time),
            rain_expected_precipitation_mm: rain.and_then(|p| p.precipitation_mm),
            rain_expected_in_minutes: minutes_until_rain(points, now),
            offsets,
        }
    }

    /// Look up the entry for a lead time.
    pub fn offset(&self, minutes: i64) -> Option<&OffsetOutlook> {
        self.offsets.iter().find(|o| o.minutes == minutes)
    }
}
