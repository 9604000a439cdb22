//! Opus-in-Ogg writer for a single logical stream.
//!
//! The stream starts with an OpusHead page (BOS) followed by an OpusTags
//! page, then carries one Opus packet per page. The writer keeps the most
//! recent audio page back so that [`OpusWriter::close`] can mark it as the
//! end of stream instead of appending an empty page.

use std::io::{self, Write};

use super::encoder::OggEncoder;
use super::page::flags;

const OPUS_HEAD_MAGIC: &[u8] = b"OpusHead";
const OPUS_TAGS_MAGIC: &[u8] = b"OpusTags";
const OPUS_HEAD_SIZE: usize = 19;
const VENDOR: &[u8] = b"voicegate";

/// Identification header (RFC 7845 section 5.1), channel mapping family 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusHead {
    pub channels: u8,
    pub pre_skip: u16,
    pub input_sample_rate: u32,
    pub output_gain: i16,
}

impl OpusHead {
    /// Stereo 48 kHz header with the given pre-skip.
    pub fn stereo_48k(pre_skip: u16) -> Self {
        Self {
            channels: 2,
            pre_skip,
            input_sample_rate: 48000,
            output_gain: 0,
        }
    }

    /// Serializes the 19-byte header packet.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(OPUS_HEAD_SIZE);
        out.extend_from_slice(OPUS_HEAD_MAGIC);
        out.push(1); // version
        out.push(self.channels);
        out.extend_from_slice(&self.pre_skip.to_le_bytes());
        out.extend_from_slice(&self.input_sample_rate.to_le_bytes());
        out.extend_from_slice(&self.output_gain.to_le_bytes());
        out.push(0); // mapping family
        out
    }

    /// Parses an OpusHead packet.
    pub fn parse(data: &[u8]) -> io::Result<Self> {
        if data.len() < OPUS_HEAD_SIZE || &data[..8] != OPUS_HEAD_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "opus: missing OpusHead",
            ));
        }
        if data[8] & 0xf0 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("opus: unsupported OpusHead version {}", data[8]),
            ));
        }
        Ok(Self {
            channels: data[9],
            pre_skip: u16::from_le_bytes([data[10], data[11]]),
            input_sample_rate: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            output_gain: i16::from_le_bytes([data[16], data[17]]),
        })
    }
}

fn opus_tags() -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + VENDOR.len());
    out.extend_from_slice(OPUS_TAGS_MAGIC);
    out.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
    out.extend_from_slice(VENDOR);
    out.extend_from_slice(&0u32.to_le_bytes()); // no user comments
    out
}

/// Returns true when `data` is an OpusHead or OpusTags header packet.
pub fn is_header_packet(data: &[u8]) -> bool {
    data.len() >= 8 && (&data[..8] == OPUS_HEAD_MAGIC || &data[..8] == OPUS_TAGS_MAGIC)
}

/// Writes Opus packets into an Ogg container.
pub struct OpusWriter<W: Write> {
    ogg: OggEncoder<W>,
    head: OpusHead,
    pending: Option<(Vec<u8>, i64)>,
    granule: i64,
    packets: u64,
    closed: bool,
}

impl<W: Write> OpusWriter<W> {
    /// Creates the writer and emits the OpusHead and OpusTags pages.
    pub fn new(writer: W, serial: u32, head: OpusHead) -> io::Result<Self> {
        let mut ogg = OggEncoder::new(writer, serial);
        ogg.write_packet(&head.encode(), 0, flags::BOS)?;
        ogg.write_packet(&opus_tags(), 0, 0)?;

        Ok(Self {
            ogg,
            head,
            pending: None,
            granule: 0,
            packets: 0,
            closed: false,
        })
    }

    /// Returns the header this stream was opened with.
    pub fn head(&self) -> &OpusHead {
        &self.head
    }

    /// Returns the stream serial number.
    pub fn serial(&self) -> u32 {
        self.ogg.serial()
    }

    /// Appends one Opus packet ending at absolute granule `granule`.
    pub fn write_packet(&mut self, data: &[u8], granule: i64) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "opus: writer closed"));
        }
        if granule < self.granule {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("opus: granule {} precedes {}", granule, self.granule),
            ));
        }

        if let Some((prev, prev_granule)) = self.pending.take() {
            self.ogg.write_packet(&prev, prev_granule, 0)?;
        }
        self.pending = Some((data.to_vec(), granule));
        self.granule = granule;
        self.packets += 1;
        Ok(())
    }

    /// Returns the granule position of the last packet accepted.
    pub fn granule(&self) -> i64 {
        self.granule
    }

    /// Returns the number of audio packets accepted.
    pub fn packets_written(&self) -> u64 {
        self.packets
    }

    /// Returns true once [`close`](Self::close) has completed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Finishes the stream with an EOS page and flushes.
    ///
    /// Calling `close` again is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        match self.pending.take() {
            Some((last, granule)) => self.ogg.write_packet(&last, granule, flags::EOS)?,
            None => self.ogg.write_packet(&[], self.granule, flags::EOS)?,
        }
        self.ogg.flush()?;
        self.closed = true;
        Ok(())
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.ogg.get_ref()
    }

    /// Returns the underlying writer. Does not close the stream.
    pub fn into_inner(self) -> W {
        self.ogg.into_inner()
    }
}

/// An Opus packet read from an Ogg container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpusPacket {
    /// Raw Opus frame data.
    pub data: Vec<u8>,
    /// Granule position of the page that completed this packet.
    pub granule: i64,
    /// Stream serial number.
    pub serial_no: u32,
}
