//! Pixel addressing in the radar composite grid.

use serde::{Deserialize, Serialize};

/// Width (columns) of the DE1200 composite grid.
pub const DE1200_WIDTH: u32 = 1100;

/// Height (rows) of the DE1200 composite grid.
pub const DE1200_HEIGHT: u32 = 1200;

/// 0-based pixel index into a radar grid.
///
/// `x` is the column and `y` the row. Bounds are checked against the
/// dimensions of each decoded frame, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoordinate {
    pub x: u32,
    pub y: u32,
}

impl GridCoordinate {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Byte offset of this column within a row of 16-bit cells.
    pub fn column_offset(&self) -> usize {
        self.x as usize * 2
    }

    /// Check whether the coordinate addresses a cell of a `width` x `height` grid.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.x < width && self.y < height
    }
}

impl std::fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_offset() {
        assert_eq!(GridCoordinate::new(0, 5).column_offset(), 0);
        assert_eq!(GridCoordinate::new(649, 256).column_offset(), 1298);
    }

    #[test]
    fn test_is_within() {
        let coord = GridCoordinate::new(649, 256);
        assert!(coord.is_within(DE1200_WIDTH, DE1200_HEIGHT));
        assert!(!GridCoordinate::new(1100, 0).is_within(DE1200_WIDTH, DE1200_HEIGHT));
        assert!(!GridCoordinate::new(0, 1200).is_within(DE1200_WIDTH, DE1200_HEIGHT));
    }
}
