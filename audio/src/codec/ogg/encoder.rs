//! Ogg page writer.

use std::io::{self, Write};

use super::page::Page;
use super::stream::StreamState;

/// Writes one logical Ogg stream, one packet per page.
pub struct OggEncoder<W: Write> {
    writer: W,
    state: StreamState,
}

impl<W: Write> OggEncoder<W> {
    /// Creates a new Ogg encoder.
    pub fn new(writer: W, serial: u32) -> Self {
        Self {
            writer,
            state: StreamState::new(serial),
        }
    }

    /// Returns the stream serial number.
    pub fn serial(&self) -> u32 {
        self.state.serial()
    }

    /// Returns the granule position of the last page written.
    pub fn granule_position(&self) -> i64 {
        self.state.granule_position()
    }

    /// Returns the number of pages written so far.
    pub fn pages_written(&self) -> u32 {
        self.state.sequence()
    }

    /// Writes a fully formed page as-is. The checksum is recomputed.
    pub fn write_page(&mut self, page: &Page) -> io::Result<()> {
        self.writer.write_all(&page.to_bytes())
    }

    /// Wraps `data` in its own page stamped with the absolute `granule`.
    ///
    /// Granule positions must not decrease within the stream.
    pub fn write_packet(&mut self, data: &[u8], granule: i64, header_type: u8) -> io::Result<()> {
        if granule < self.state.granule_position() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "ogg: granule {} precedes {}",
                    granule,
                    self.state.granule_position()
                ),
            ));
        }

        let page = Page::with_packet(
            data,
            header_type,
            granule,
            self.state.serial(),
            self.state.sequence(),
        )?;
        self.write_page(&page)?;

        self.state.advance_granule(granule);
        self.state.next_sequence();
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Returns a reference to the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
