//! RADOLAN frame header parsing.
//!
//! Every RADOLAN composite product starts with a fixed-width ASCII header
//! followed by a variable-length free-text segment and an ETX byte.
//!
//! Fixed header layout (byte ranges, end exclusive):
//! - [0:2)   product id, e.g. "RV"
//! - [2:8)   valid-at day, hour, minute ("DDhhmm")
//! - [13:17) valid-at month and two-digit year ("MMYY")
//! - [47:51) precision as "E-02"; characters [1:4) are the decimal exponent
//! - [60:69) dimensions as "<rows>x<cols>"
//! - [72:75) forecast lead time in minutes
//! - [88:91) length of the free-text ("MS") segment

use std::io::Read;
use std::ops::Range;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use radar_common::{FormatError, RadarResult};

use crate::read_full;

/// Length of the fixed header.
const FIXED_HEADER_LEN: usize = 91;

/// End-of-text byte closing the header.
const HEADER_TERMINATOR: u8 = 0x03;

const PRODUCT: Range<usize> = 0..2;
const DAY_TIME: Range<usize> = 2..8;
const MONTH_YEAR: Range<usize> = 13..17;
const PRECISION: Range<usize> = 47..51;
const DIMENSIONS: Range<usize> = 60..69;
const FORECAST: Range<usize> = 72..75;
const FREE_TEXT_LEN: Range<usize> = 88..91;

/// Decoded header of one RADOLAN frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameHeader {
    pub product: String,
    /// Number of columns
    pub width: u32,
    /// Number of rows
    pub height: u32,
    /// Multiplier applied to raw cell values
    pub precision: f64,
    pub valid_at: DateTime<Utc>,
    pub forecast_minutes: u32,
    /// Contents of the free-text segment (site list for composites)
    pub free_text: String,
}

impl FrameHeader {
    /// Valid-at time shifted by the forecast lead time.
    pub fn prediction_time(&self) -> DateTime<Utc> {
        self.valid_at + Duration::minutes(self.forecast_minutes as i64)
    }

    /// Bytes per payload row.
    pub fn row_len(&self) -> usize {
        self.width as usize * 2
    }
}

/// Read and parse a header, leaving `reader` at the first payload byte.
pub fn read_header<R: Read>(reader: &mut R) -> RadarResult<FrameHeader> {
    let mut fixed = [0u8; FIXED_HEADER_LEN];
    let n = read_full(reader, &mut fixed)?;
    if n < FIXED_HEADER_LEN {
        return Err(FormatError::HeaderTooShort {
            expected: FIXED_HEADER_LEN,
            actual: n,
        }
        .into());
    }

    let free_text_len: usize = parse_field(&fixed, FREE_TEXT_LEN, "MS length")?;
    let mut free_text = vec![0u8; free_text_len];
    let n = read_full(reader, &mut free_text)?;
    if n < free_text_len {
        return Err(FormatError::HeaderTooShort {
            expected: FIXED_HEADER_LEN + free_text_len + 1,
            actual: FIXED_HEADER_LEN + n,
        }
        .into());
    }

    let mut terminator = [0u8; 1];
    let found = match read_full(reader, &mut terminator)? {
        0 => None,
        _ => Some(terminator[0]),
    };
    if found != Some(HEADER_TERMINATOR) {
        return Err(FormatError::MissingTerminator { found }.into());
    }

    parse_fixed(&fixed, String::from_utf8_lossy(&free_text).into_owned())
}

fn parse_fixed(fixed: &[u8], free_text: String) -> RadarResult<FrameHeader> {
    let (height, width) = parse_dimensions(fixed)?;

    Ok(FrameHeader {
        product: ascii_field(fixed, PRODUCT, "product")?.to_string(),
        width,
        height,
        precision: parse_precision(fixed)?,
        valid_at: parse_valid_at(fixed)?,
        forecast_minutes: parse_field(fixed, FORECAST, "forecast")?,
        free_text,
    })
}

/// Rows and columns from "<rows>x<cols>".
fn parse_dimensions(fixed: &[u8]) -> Result<(u32, u32), FormatError> {
    let text = ascii_field(fixed, DIMENSIONS, "dimensions")?;
    let invalid = || FormatError::invalid_field("dimensions", text);

    let (rows, cols) = text.split_once('x').ok_or_else(invalid)?;
    let rows = rows.trim().parse().map_err(|_| invalid())?;
    let cols = cols.trim().parse().map_err(|_| invalid())?;

    Ok((rows, cols))
}

/// "E-02" -> 0.01
fn parse_precision(fixed: &[u8]) -> Result<f64, FormatError> {
    let text = ascii_field(fixed, PRECISION, "precision")?;
    let exponent: i32 = text
        .get(1..4)
        .and_then(|e| e.trim().parse().ok())
        .ok_or_else(|| FormatError::invalid_field("precision", text))?;

    if exponent < 0 {
        Ok(1.0 / 10f64.powi(-exponent))
    } else {
        Ok(10f64.powi(exponent))
    }
}

fn parse_valid_at(fixed: &[u8]) -> Result<DateTime<Utc>, FormatError> {
    let day_time = ascii_field(fixed, DAY_TIME, "timestamp")?;
    let month_year = ascii_field(fixed, MONTH_YEAR, "timestamp")?;
    let invalid = || FormatError::invalid_field("timestamp", format!("{} {}", day_time, month_year));

    let two_digits = |s: &str, at: usize| -> Result<u32, FormatError> {
        s.get(at..at + 2)
            .and_then(|d| d.parse().ok())
            .ok_or_else(invalid)
    };

    let day = two_digits(day_time, 0)?;
    let hour = two_digits(day_time, 2)?;
    let minute = two_digits(day_time, 4)?;
    let month = two_digits(month_year, 0)?;
    let year = 2000 + two_digits(month_year, 2)? as i32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .ok_or_else(invalid)
}

fn ascii_field<'a>(
    fixed: &'a [u8],
    range: Range<usize>,
    field: &'static str,
) -> Result<&'a str, FormatError> {
    let bytes = &fixed[range];
    std::str::from_utf8(bytes)
        .map(str::trim)
        .map_err(|_| FormatError::invalid_field(field, String::from_utf8_lossy(bytes)))
}

fn parse_field<T: FromStr>(
    fixed: &[u8],
    range: Range<usize>,
    field: &'static str,
) -> Result<T, FormatError> {
    let text = ascii_field(fixed, range, field)?;
    text.parse()
        .map_err(|_| FormatError::invalid_field(field, text))
}
