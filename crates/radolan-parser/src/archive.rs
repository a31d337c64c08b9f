//! Reader for the bzip2-compressed tar archives DWD publishes.

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bzip2::read::BzDecoder;
use radar_common::{RadarError, RadarResult};
use tracing::debug;

/// Size of a tar block. Even an empty archive holds two of them.
const TAR_BLOCK_LEN: u64 = 512;

/// Decompressed stream, counting the bytes handed to the tar reader.
struct Decompressed<R: Read> {
    inner: BzDecoder<R>,
    consumed: Arc<AtomicU64>,
}

impl<R: Read> Read for Decompressed<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Streaming reader over a `.tar.bz2` archive.
pub struct ArchiveReader<R: Read> {
    archive: tar::Archive<Decompressed<R>>,
    consumed: Arc<AtomicU64>,
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(reader: R) -> Self {
        let consumed = Arc::new(AtomicU64::new(0));
        Self {
            archive: tar::Archive::new(Decompressed {
                inner: BzDecoder::new(reader),
                consumed: consumed.clone(),
            }),
            consumed,
        }
    }

    /// Iterate over the regular files of the archive in stored order.
    ///
    /// Directories, links and other special entries are skipped. Each
    /// member must be consumed (or dropped) before requesting the next.
    /// A stream that ends before the first tar block is an error.
    pub fn members(&mut self) -> RadarResult<Members<'_, R>> {
        let entries = self.archive.entries().map_err(RadarError::archive)?;
        Ok(Members {
            entries,
            consumed: self.consumed.clone(),
            failed: false,
        })
    }
}

/// Iterator over regular archive members.
pub struct Members<'a, R: 'a + Read> {
    entries: tar::Entries<'a, Decompressed<R>>,
    consumed: Arc<AtomicU64>,
    failed: bool,
}

impl<'a, R: 'a + Read> Iterator for Members<'a, R> {
    type Item = RadarResult<Member<'a, R>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let entry = match self.entries.next() {
                Some(Ok(entry)) => entry,
                None => {
                    self.failed = true;
                    let consumed = self.consumed.load(Ordering::Relaxed);
                    if consumed < TAR_BLOCK_LEN {
                        return Some(Err(RadarError::Archive(format!(
                            "not a tar archive: stream ended after {} bytes",
                            consumed
                        ))));
                    }
                    return None;
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(RadarError::archive(e)));
                }
            };

            let name = match entry.path() {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(RadarError::archive(e)));
                }
            };

            let kind = entry.header().entry_type();
            if !kind.is_file() {
                debug!(member = %name, kind = ?kind, "Skipping non-file archive member");
                continue;
            }

            return Some(Ok(Member { name, entry }));
        }
    }
}

/// One regular file inside the archive.
pub struct Member<'a, R: 'a + Read> {
    name: String,
    entry: tar::Entry<'a, Decompressed<R>>,
}

impl<'a, R: 'a + Read> Member<'a, R> {
    /// Path of the member as stored in the archive.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<'a, R: 'a + Read> Read for Member<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.entry.read(buf)
    }
}
