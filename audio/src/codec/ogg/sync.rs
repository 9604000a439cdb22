//! Page-level reader for Ogg streams.

use std::io::{self, Read};

use super::page::{PAGE_HEADER_SIZE, PAGE_MAGIC, Page};

/// Reads Ogg pages one by one, verifying each checksum.
pub struct OggSync<R: Read> {
    reader: R,
    pages_read: u64,
}

impl<R: Read> OggSync<R> {
    /// Creates a new Ogg sync state.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pages_read: 0,
        }
    }

    /// Returns how many pages have been read.
    pub fn pages_read(&self) -> u64 {
        self.pages_read
    }

    /// Reads the next Ogg page.
    ///
    /// Returns `Ok(None)` on a clean end of input. A page cut short or a
    /// checksum mismatch yields `InvalidData`.
    pub fn read_page(&mut self) -> io::Result<Option<Page>> {
        let mut header = [0u8; PAGE_HEADER_SIZE];
        match self.reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        if &header[0..4] != PAGE_MAGIC {
            return Err(invalid("ogg: invalid capture pattern"));
        }

        let segments = header[26];
        let mut segment_table = vec![0u8; segments as usize];
        self.reader
            .read_exact(&mut segment_table)
            .map_err(|_| invalid("ogg: truncated segment table"))?;

        let body_size: usize = segment_table.iter().map(|&s| s as usize).sum();
        let mut body = vec![0u8; body_size];
        self.reader
            .read_exact(&mut body)
            .map_err(|_| invalid("ogg: truncated page body"))?;

        let page = Page {
            version: header[4],
            header_type: header[5],
            granule_position: i64::from_le_bytes(le_array(&header[6..14])),
            serial: u32::from_le_bytes(le_array(&header[14..18])),
            sequence: u32::from_le_bytes(le_array(&header[18..22])),
            checksum: u32::from_le_bytes(le_array(&header[22..26])),
            segments,
            segment_table,
            body,
        };

        if !page.verify_checksum() {
            return Err(invalid(&format!(
                "ogg: checksum mismatch on page {}",
                page.sequence
            )));
        }

        self.pages_read += 1;
        Ok(Some(page))
    }

    /// Returns the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
