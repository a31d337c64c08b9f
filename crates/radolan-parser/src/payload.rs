//! Cell payload of a RADOLAN frame.
//!
//! The payload follows the header terminator as `height` rows of `width`
//! little-endian 16-bit cells. Only the rows up to the target are read.

use std::io::Read;

use radar_common::{FormatError, GridCoordinate, RadarResult};

use crate::header::FrameHeader;
use crate::read_full;

/// Raw value the composite uses for cells without radar coverage.
pub const NO_DATA: u16 = 0x29C4;

/// Convert a raw cell to precipitation in millimetres.
fn decode_cell(bytes: [u8; 2], precision: f64) -> Option<f64> {
    match u16::from_le_bytes(bytes) {
        NO_DATA => None,
        raw => Some(raw as f64 * precision),
    }
}

/// Read the value of `target` from a reader positioned at the payload.
pub fn read_cell<R: Read>(
    reader: &mut R,
    header: &FrameHeader,
    target: GridCoordinate,
) -> RadarResult<Option<f64>> {
    let out_of_range = || FormatError::CoordinateOutOfRange {
        x: target.x,
        y: target.y,
        width: header.width,
        height: header.height,
    };

    // Edge coordinates pass here and are caught while scanning rows.
    if target.x > header.width || target.y > header.height {
        return Err(out_of_range().into());
    }

    let row_len = header.row_len();
    let mut row = vec![0u8; row_len];
    for index in 0..=target.y {
        if index == header.height {
            return Err(out_of_range().into());
        }
        if read_full(reader, &mut row)? < row_len {
            return Err(FormatError::TruncatedPayload {
                row: index,
                expected: row_len,
            }
            .into());
        }
    }

    let offset = target.column_offset();
    let cell = row
        .get(offset..offset + 2)
        .and_then(|b| <[u8; 2]>::try_from(b).ok())
        .ok_or_else(out_of_range)?;

    Ok(decode_cell(cell, header.precision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::read_header;
    use test_utils::RvFrameBuilder;

    fn cell_of(frame: &[u8], x: u32, y: u32) -> RadarResult<Option<f64>> {
        let mut reader = frame;
        let header = read_header(&mut reader)?;
        read_cell(&mut reader, &header, GridCoordinate::new(x, y))
    }

    #[test]
    fn test_decode_cell() {
        assert_eq!(decode_cell([84, 0], 0.01), Some(0.84));
        assert_eq!(decode_cell([0, 0], 0.01), Some(0.0));
        assert_eq!(decode_cell([0xC4, 0x29], 0.01), None);
        assert_eq!(decode_cell([0xC4, 0x29], 1.0), None);
        assert_eq!(decode_cell([0x29, 0xC4], 1.0), Some(50217.0));
    }

    #[test]
    fn test_reads_target_cell() {
        let frame = RvFrameBuilder::new(4, 3)
            .fill(1)
            .cell(2, 1, 250)
            .cell(1, 2, NO_DATA)
            .build();

        assert_eq!(cell_of(&frame, 2, 1).unwrap(), Some(2.5));
        assert_eq!(cell_of(&frame, 0, 0).unwrap(), Some(0.01));
        assert_eq!(cell_of(&frame, 1, 2).unwrap(), None);
        assert_eq!(cell_of(&frame, 3, 2).unwrap(), Some(0.01));
    }

    #[test]
    fn test_coordinate_beyond_edge() {
        let frame = RvFrameBuilder::new(4, 3).build();
        for (x, y) in [(5, 0), (0, 4), (9, 9)] {
            let err = cell_of(&frame, x, y).unwrap_err();
            assert!(matches!(
                err.as_format(),
                Some(FormatError::CoordinateOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_coordinate_on_edge() {
        let frame = RvFrameBuilder::new(4, 3).build();
        for (x, y) in [(4, 0), (0, 3), (4, 3)] {
            let err = cell_of(&frame, x, y).unwrap_err();
            assert_eq!(
                err.as_format(),
                Some(&FormatError::CoordinateOutOfRange {
                    x,
                    y,
                    width: 4,
                    height: 3
                })
            );
        }
    }

    #[test]
    fn test_truncated_payload() {
        let frame = RvFrameBuilder::new(4, 3).build();
        let cut = &frame[..frame.len() - 3];

        // Rows before the cut are still readable.
        assert_eq!(cell_of(cut, 1, 1).unwrap(), Some(0.0));

        let err = cell_of(cut, 1, 2).unwrap_err();
        assert_eq!(
            err.as_format(),
            Some(&FormatError::TruncatedPayload {
                row: 2,
                expected: 8
            })
        );
    }
}
