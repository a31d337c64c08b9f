//! Reference scenario for the recorded RV archive.
//!
//! The recorded archive was captured on 2024-08-08; these constants describe
//! what a correct decoder reports for the reference location at the
//! evaluation instant used throughout the test suite.

use chrono::{DateTime, TimeZone, Utc};

/// Reference location (Bavaria, south-west of Munich).
pub const REFERENCE_LAT: f64 = 48.07530;
pub const REFERENCE_LON: f64 = 11.32589;

/// Grid cell of the reference location in the DE1200 composite.
pub const REFERENCE_CELL: (u32, u32) = (649, 256);

/// Evaluation instant: 2024-08-08 17:47 CEST.
pub fn evaluation_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 8, 15, 47, 0).unwrap()
}

/// Valid-at time of the first frame in the recorded archive.
pub fn archive_valid_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 8, 15, 50, 0).unwrap()
}

/// Raw cell values (precision E-02) for a synthetic stand-in of the recorded
/// archive, one per lead time of 0, 5, 10, ... 120 minutes. They agree with
/// the recording at 0, 5 and 115 minutes.
pub const REFERENCE_RAW_VALUES: [u16; 25] = [
    84, 12, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];
