//! Fixed-size rechunking of a PCM byte stream.

/// Cuts an arbitrary byte stream into chunks of exactly `chunk_size` bytes.
///
/// Bytes that don't yet fill a chunk stay in the carry buffer until more
/// arrive or [`finish`](Self::finish) flushes them as a short chunk.
#[derive(Debug)]
pub struct Rechunker {
    chunk_size: usize,
    pending: Vec<u8>,
}

impl Rechunker {
    /// Creates a rechunker. A zero size is treated as one byte.
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
        }
    }

    /// Returns the configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes held in the carry buffer.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Appends `data` and returns every chunk now complete, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(data);

        let mut out = Vec::with_capacity(self.pending.len() / self.chunk_size);
        let mut offset = 0;
        while self.pending.len() - offset >= self.chunk_size {
            out.push(self.pending[offset..offset + self.chunk_size].to_vec());
            offset += self.chunk_size;
        }
        if offset > 0 {
            self.pending.drain(..offset);
        }
        out
    }

    /// Returns the short remainder, if any, and empties the carry buffer.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }
}
