//! Decoder for DWD RADOLAN RV composite products.
//!
//! The RV product is a nowcast of 5 minute precipitation sums on the
//! 1100x1200 DE1200 grid, published as a `.tar.bz2` archive holding one
//! frame per forecast lead time. This crate reads such an archive and
//! extracts the value of a single grid cell from every frame.
//!
//! # Example
//!
//! ```no_run
//! use radar_common::GridCoordinate;
//!
//! let bytes = std::fs::read("DE1200_RV_LATEST.tar.bz2").unwrap();
//! let points = radolan_parser::decode_archive(&bytes, GridCoordinate::new(649, 256)).unwrap();
//! for point in &points {
//!     println!("{} {:?}", point.prediction_time, point.precipitation_mm);
//! }
//! ```

pub mod archive;
pub mod header;
pub mod payload;

use std::io::{self, Read};

use radar_common::{ForecastPoint, GridCoordinate, RadarError, RadarResult};
use tracing::{debug, instrument};

pub use archive::{ArchiveReader, Member, Members};
pub use header::{read_header, FrameHeader};
pub use payload::{read_cell, NO_DATA};

/// Decode the value at `target` from one frame.
pub fn decode_frame<R: Read>(reader: &mut R, target: GridCoordinate) -> RadarResult<ForecastPoint> {
    let header = read_header(reader)?;
    let value = read_cell(reader, &header, target)?;
    Ok(ForecastPoint::new(header.prediction_time(), value))
}

/// Decode every frame of an RV archive at `target`.
///
/// Points are returned in archive order. Any malformed frame fails the
/// whole archive.
#[instrument(skip(bytes), fields(size = bytes.len()))]
pub fn decode_archive(bytes: &[u8], target: GridCoordinate) -> RadarResult<Vec<ForecastPoint>> {
    let mut reader = ArchiveReader::new(bytes);
    let mut points = Vec::new();

    for member in reader.members()? {
        let mut member = member?;
        let header = read_header(&mut member)?;
        let value = read_cell(&mut member, &header, target)?;

        debug!(
            member = member.name(),
            product = %header.product,
            forecast_minutes = header.forecast_minutes,
            value = ?value,
            "Decoded frame"
        );

        points.push(ForecastPoint::new(header.prediction_time(), value));
    }

    debug!(frames = points.len(), "Decoded archive");
    Ok(points)
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
///
/// Returns the number of bytes read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> RadarResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RadarError::archive(e)),
        }
    }
    Ok(filled)
}
