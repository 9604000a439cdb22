//! Destinations for finished containers.
//!
//! A sink hands out a writer when a stream starts and later either commits
//! or discards what was written. Nothing becomes visible before commit.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::stream::LogicalStream;
use crate::stream_id::StreamId;

/// Where a stream's container bytes go.
pub trait ContainerSink: Send + Sync {
    /// Opens a writer for a new stream.
    fn create(&self, stream: &LogicalStream) -> io::Result<Box<dyn Write + Send>>;

    /// Publishes the finished container. `writer` is the one from `create`.
    fn commit(&self, id: &StreamId, writer: Box<dyn Write + Send>) -> io::Result<()>;

    /// Drops whatever was written for `id`.
    fn discard(&self, id: &StreamId) -> io::Result<()>;
}

/// Keeps containers in memory, keyed by stream id.
#[derive(Default)]
pub struct MemorySink {
    pending: Mutex<HashMap<StreamId, Arc<Mutex<Vec<u8>>>>>,
    committed: Mutex<HashMap<StreamId, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a committed container.
    pub fn get(&self, id: &StreamId) -> Option<Vec<u8>> {
        self.committed.lock().get(id).cloned()
    }

    /// Ids of committed containers.
    pub fn ids(&self) -> Vec<StreamId> {
        let mut ids: Vec<_> = self.committed.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of streams still being written.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ContainerSink for MemorySink {
    fn create(&self, stream: &LogicalStream) -> io::Result<Box<dyn Write + Send>> {
        let buf = Arc::new(Mutex::new(Vec::new()));
        self.pending.lock().insert(stream.id.clone(), buf.clone());
        Ok(Box::new(SharedBuffer(buf)))
    }

    fn commit(&self, id: &StreamId, mut writer: Box<dyn Write + Send>) -> io::Result<()> {
        writer.flush()?;
        drop(writer);
        let buf = self.pending.lock().remove(id).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no pending container {}", id))
        })?;
        let data = std::mem::take(&mut *buf.lock());
        self.committed.lock().insert(id.clone(), data);
        Ok(())
    }

    fn discard(&self, id: &StreamId) -> io::Result<()> {
        self.pending.lock().remove(id);
        Ok(())
    }
}

/// Writes `<dir>/<id>.ogg`, going through `<id>.ogg.part` until commit.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Creates the sink, making `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path of a committed container.
    pub fn path_for(&self, id: &StreamId) -> PathBuf {
        self.dir.join(format!("{}.ogg", id))
    }

    fn part_path(&self, id: &StreamId) -> PathBuf {
        self.dir.join(format!("{}.ogg.part", id))
    }
}

impl ContainerSink for FileSink {
    fn create(&self, stream: &LogicalStream) -> io::Result<Box<dyn Write + Send>> {
        let file = File::create(self.part_path(&stream.id))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn commit(&self, id: &StreamId, mut writer: Box<dyn Write + Send>) -> io::Result<()> {
        writer.flush()?;
        drop(writer);
        fs::rename(self.part_path(id), self.path_for(id))
    }

    fn discard(&self, id: &StreamId) -> io::Result<()> {
        match fs::remove_file(self.part_path(id)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
