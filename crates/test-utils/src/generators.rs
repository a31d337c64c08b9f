//! Synthetic RADOLAN RV frames and compressed archives.
//!
//! Frames are laid out byte-for-byte like the DWD composite products so the
//! decoder under test cannot tell them apart from real data.

use std::io::{self, Write};

use bzip2::write::BzEncoder;
use bzip2::Compression;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use tar::{EntryType, Header};

/// Raw cell value marking "no data".
pub const NO_DATA_RAW: u16 = 0x29C4;

/// Length of the fixed part of an RV header.
pub const FIXED_HEADER_LEN: usize = 91;

/// Header terminator byte.
pub const ETX: u8 = 0x03;

/// Builder for a single RV frame.
///
/// # Example
///
/// ```
/// use test_utils::RvFrameBuilder;
///
/// let frame = RvFrameBuilder::new(4, 3).cell(2, 1, 84).build();
/// assert_eq!(frame.len(), 91 + 1 + 4 * 3 * 2);
/// assert_eq!(&frame[0..2], b"RV");
/// ```
#[derive(Debug, Clone)]
pub struct RvFrameBuilder {
    width: u32,
    height: u32,
    valid_at: DateTime<Utc>,
    forecast_minutes: u32,
    precision_exponent: i32,
    free_text: String,
    terminator: u8,
    cells: Vec<u16>,
}

impl RvFrameBuilder {
    /// A frame of `width` columns and `height` rows, all cells zero.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            valid_at: Utc.with_ymd_and_hms(2024, 8, 8, 15, 50, 0).unwrap(),
            forecast_minutes: 0,
            precision_exponent: -2,
            free_text: String::new(),
            terminator: ETX,
            cells: vec![0; width as usize * height as usize],
        }
    }

    pub fn valid_at(mut self, valid_at: DateTime<Utc>) -> Self {
        self.valid_at = valid_at;
        self
    }

    pub fn forecast_minutes(mut self, minutes: u32) -> Self {
        self.forecast_minutes = minutes;
        self
    }

    pub fn precision_exponent(mut self, exponent: i32) -> Self {
        self.precision_exponent = exponent;
        self
    }

    /// Free-text ("MS") segment following the fixed header.
    pub fn free_text(mut self, text: &str) -> Self {
        self.free_text = text.to_string();
        self
    }

    /// Replace the header terminator, for malformed-frame tests.
    pub fn terminator(mut self, byte: u8) -> Self {
        self.terminator = byte;
        self
    }

    pub fn fill(mut self, raw: u16) -> Self {
        self.cells.iter_mut().for_each(|c| *c = raw);
        self
    }

    pub fn cell(mut self, x: u32, y: u32, raw: u16) -> Self {
        let idx = y as usize * self.width as usize + x as usize;
        self.cells[idx] = raw;
        self
    }

    /// Fixed header, free-text segment and terminator.
    pub fn header_bytes(&self) -> Vec<u8> {
        let total_len = FIXED_HEADER_LEN + self.free_text.len() + 1 + self.cells.len() * 2;
        let v = &self.valid_at;

        let mut header = vec![b' '; FIXED_HEADER_LEN];
        let mut put = |offset: usize, text: &str| {
            header[offset..offset + text.len()].copy_from_slice(text.as_bytes());
        };

        put(0, "RV");
        put(2, &format!("{:02}{:02}{:02}", v.day(), v.hour(), v.minute()));
        put(8, "10000");
        put(13, &format!("{:02}{:02}", v.month(), v.year() % 100));
        put(17, "BY");
        put(19, &format!("{:>7}", total_len));
        put(26, "VS 5");
        put(30, "SW   2.28.0");
        put(44, "PR");
        put(47, &format!("E{:+03}", self.precision_exponent));
        put(51, "INT   5");
        put(58, "GP");
        put(60, &format!("{:>4}x{:>4}", self.height, self.width));
        put(69, "VV ");
        put(72, &format!("{:03}", self.forecast_minutes));
        put(75, "MF 00000002");
        put(86, "MS");
        put(88, &format!("{:>3}", self.free_text.len()));

        header.extend_from_slice(self.free_text.as_bytes());
        header.push(self.terminator);
        header
    }

    /// Complete frame: header followed by little-endian 16-bit cells.
    pub fn build(&self) -> Vec<u8> {
        let mut frame = self.header_bytes();
        frame.reserve(self.cells.len() * 2);
        for raw in &self.cells {
            frame.extend_from_slice(&raw.to_le_bytes());
        }
        frame
    }
}

/// Builder for a bzip2-compressed tar archive.
pub struct ArchiveBuilder {
    builder: tar::Builder<BzEncoder<Vec<u8>>>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(BzEncoder::new(Vec::new(), Compression::fast())),
        }
    }

    /// Append a regular file.
    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_723_132_200);
        self.builder
            .append_data(&mut header, name, data)
            .expect("Failed to append archive member");
        self
    }

    /// Append a directory entry.
    pub fn directory(mut self, name: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        self.builder
            .append_data(&mut header, name, io::empty())
            .expect("Failed to append directory");
        self
    }

    /// Append a symbolic link.
    pub fn symlink(mut self, name: &str, target: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        header
            .set_link_name(target)
            .expect("Failed to set link target");
        self.builder
            .append_data(&mut header, name, io::empty())
            .expect("Failed to append symlink");
        self
    }

    /// Finish the tar stream and return the compressed bytes.
    pub fn finish(self) -> Vec<u8> {
        self.builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .expect("Failed to finish archive")
    }
}

/// Compress arbitrary bytes as a bzip2 stream.
pub fn bzip2_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data).expect("Failed to compress");
    encoder.finish().expect("Failed to finish compression")
}

/// Member name DWD uses for a frame of the RV composite.
pub fn rv_member_name(valid_at: DateTime<Utc>, forecast_minutes: u32) -> String {
    format!(
        "DE1200_RV{}_{:03}",
        valid_at.format("%y%m%d%H%M"),
        forecast_minutes
    )
}

/// Build an RV forecast archive with one frame per raw value.
///
/// Frame `i` has a lead time of `5 * i` minutes and carries `raws[i]` at
/// `(x, y)`. Members are written in the order given by `order`, which holds
/// indices into `raws`.
pub fn rv_forecast_archive(
    width: u32,
    height: u32,
    (x, y): (u32, u32),
    valid_at: DateTime<Utc>,
    raws: &[u16],
    order: &[usize],
) -> Vec<u8> {
    let mut archive = ArchiveBuilder::new();
    for &i in order {
        let lead = i as u32 * 5;
        let frame = RvFrameBuilder::new(width, height)
            .valid_at(valid_at)
            .forecast_minutes(lead)
            .cell(x, y, raws[i])
            .build();
        archive = archive.file(&rv_member_name(valid_at, lead), &frame);
    }
    archive.finish()
}
