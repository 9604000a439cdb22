//! Read Opus packets from an Ogg container.

use std::io::{self, Read};

use super::opus_writer::{OpusHead, OpusPacket, is_header_packet};
use super::sync::OggSync;

/// Reads Opus packets from an Ogg stream.
///
/// Packets are reassembled from lacing values, so a packet spanning
/// several pages comes out whole. The OpusHead and OpusTags packets are
/// consumed; the parsed head is available through [`head`](Self::head).
pub struct OpusPacketReader<R: Read> {
    sync: OggSync<R>,
    head: Option<OpusHead>,
    ready: std::collections::VecDeque<OpusPacket>,
    partial: Vec<u8>,
    eos: bool,
}

impl<R: Read> OpusPacketReader<R> {
    /// Creates a new Opus packet reader.
    pub fn new(reader: R) -> Self {
        Self {
            sync: OggSync::new(reader),
            head: None,
            ready: Default::default(),
            partial: Vec::new(),
            eos: false,
        }
    }

    /// Returns the identification header once it has been read.
    pub fn head(&self) -> Option<&OpusHead> {
        self.head.as_ref()
    }

    /// Reads the next audio packet.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn read_packet(&mut self) -> io::Result<Option<OpusPacket>> {
        loop {
            if let Some(packet) = self.ready.pop_front() {
                return Ok(Some(packet));
            }
            if self.eos {
                return Ok(None);
            }

            let Some(page) = self.sync.read_page()? else {
                self.eos = true;
                continue;
            };
            if !page.is_continuation() {
                self.partial.clear();
            }

            let mut offset = 0;
            for &lace in &page.segment_table {
                let end = offset + lace as usize;
                self.partial.extend_from_slice(&page.body[offset..end]);
                offset = end;
                if lace == 255 {
                    continue;
                }

                let data = std::mem::take(&mut self.partial);
                if is_header_packet(&data) {
                    if data.starts_with(b"OpusHead") {
                        self.head = Some(OpusHead::parse(&data)?);
                    }
                    continue;
                }
                // an empty EOS page only terminates the stream
                if data.is_empty() && page.is_eos() {
                    continue;
                }
                self.ready.push_back(OpusPacket {
                    data,
                    granule: page.granule_position,
                    serial_no: page.serial,
                });
            }

            if page.is_eos() {
                self.eos = true;
            }
        }
    }
}

/// Returns an iterator over Opus packets in an Ogg stream.
pub fn read_opus_packets<R: Read>(reader: R) -> OpusPacketIter<R> {
    OpusPacketIter {
        reader: OpusPacketReader::new(reader),
        done: false,
    }
}

/// Iterator over Opus packets in an Ogg stream.
pub struct OpusPacketIter<R: Read> {
    reader: OpusPacketReader<R>,
    done: bool,
}

impl<R: Read> OpusPacketIter<R> {
    /// Returns the identification header once it has been read.
    pub fn head(&self) -> Option<&OpusHead> {
        self.reader.head()
    }
}

impl<R: Read> Iterator for OpusPacketIter<R> {
    type Item = io::Result<OpusPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_packet() {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
