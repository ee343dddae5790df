//! Destination of a snapshot download.
//!
//! Data chunks are appended as they arrive and handed back as one blob when
//! the transfer ends. Large worlds can be spooled to disk instead of memory.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bound on what a memory sink reserves up front, whatever the
/// announced size.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

static SPOOL_SEQ: AtomicU64 = AtomicU64::new(0);

pub trait SnapshotSink: fmt::Debug + Send {
    fn append(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Bytes appended so far.
    fn received(&self) -> usize;

    fn finish(self: Box<Self>) -> io::Result<Vec<u8>>;
}

#[derive(Debug, Default)]
pub struct MemorySink {
    buf: Vec<u8>,
}

impl MemorySink {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.min(MAX_PREALLOC)),
        }
    }
}

impl SnapshotSink for MemorySink {
    fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    fn received(&self) -> usize {
        self.buf.len()
    }

    fn finish(self: Box<Self>) -> io::Result<Vec<u8>> {
        Ok(self.buf)
    }
}

/// Spools the download to a temporary file, removed once the sink is gone.
#[derive(Debug)]
pub struct SpoolSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: usize,
}

impl SpoolSink {
    pub fn create(dir: &Path, tick: u32) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let seq = SPOOL_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!(
            "snapshot-{}-{tick}-{seq}.part",
            std::process::id()
        ));
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for SpoolSink {
    fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("spool already finished"))?;
        writer.write_all(chunk)?;
        self.written += chunk.len();
        Ok(())
    }

    fn received(&self) -> usize {
        self.written
    }

    fn finish(mut self: Box<Self>) -> io::Result<Vec<u8>> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        fs::read(&self.path)
    }
}

impl Drop for SpoolSink {
    fn drop(&mut self) {
        self.writer = None;
        let _ = fs::remove_file(&self.path);
    }
}

/// Sink for a transfer of `total_size` bytes captured at `tick`.
pub fn open_sink(
    spool_dir: Option<&Path>,
    tick: u32,
    total_size: u32,
) -> io::Result<Box<dyn SnapshotSink>> {
    Ok(match spool_dir {
        Some(dir) => Box::new(SpoolSink::create(dir, tick)?),
        None => Box::new(MemorySink::with_capacity(total_size as usize)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spool_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lockstep-netplay-{name}-{}", std::process::id()))
    }

    #[test]
    fn memory_sink_concatenates() {
        let mut sink = open_sink(None, 5, 6).unwrap();
        sink.append(b"abc").unwrap();
        sink.append(b"def").unwrap();
        assert_eq!(sink.received(), 6);
        assert_eq!(sink.finish().unwrap(), b"abcdef");
    }

    #[test]
    fn huge_announcement_does_not_preallocate() {
        let sink = MemorySink::with_capacity(u32::MAX as usize);
        assert!(sink.buf.capacity() <= MAX_PREALLOC);
    }

    #[test]
    fn spool_sink_reads_back_and_cleans_up() {
        let dir = spool_dir("roundtrip");
        let sink = SpoolSink::create(&dir, 9).unwrap();
        let path = sink.path().to_path_buf();
        let mut sink: Box<dyn SnapshotSink> = Box::new(sink);

        let blob: Vec<u8> = (0..20_000u32).map(|i| (i % 253) as u8).collect();
        for chunk in blob.chunks(1457) {
            sink.append(chunk).unwrap();
        }
        assert_eq!(sink.received(), blob.len());
        assert_eq!(sink.finish().unwrap(), blob);
        assert!(!path.exists());
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn abandoned_spool_is_removed() {
        let dir = spool_dir("abandoned");
        let mut sink = SpoolSink::create(&dir, 1).unwrap();
        sink.append(b"partial").unwrap();
        let path = sink.path().to_path_buf();
        assert!(path.exists());
        drop(sink);
        assert!(!path.exists());
        let _ = fs::remove_dir(&dir);
    }
}
