//! Ogg container format.
//!
//! This module implements the Ogg bitstream format as defined in RFC 3533,
//! plus the Opus encapsulation from RFC 7845.

mod encoder;
pub mod opus_reader;
pub mod opus_writer;
mod page;
mod stream;
mod sync;

pub use encoder::*;
pub use opus_reader::{OpusPacketIter, OpusPacketReader, read_opus_packets};
pub use opus_writer::{OpusHead, OpusPacket, OpusWriter, is_header_packet};
pub use page::*;
pub use stream::*;
pub use sync::*;
