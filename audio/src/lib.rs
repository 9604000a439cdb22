//! Audio framing utilities for the voice pipeline.
//!
//! This crate provides the synchronous building blocks shared by both
//! directions of the pipeline:
//!
//! - `codec::ogg`: Ogg pages (RFC 3533) and the Opus mapping (RFC 7845)
//! - `opusrt`: wire packets, compressed frames and the fixed audio constants
//! - `pcm`: 20 ms stereo PCM frames, rechunking and sample conversion
//!
//! # Example
//!
//! ```rust
//! use voicegate_audio::codec::ogg::{OpusHead, OpusWriter};
//! use voicegate_audio::opusrt::{FRAME_SAMPLES, OPUS_SILENCE_20MS};
//!
//! let mut writer = OpusWriter::new(Vec::new(), 1, OpusHead::stereo_48k(0)).unwrap();
//! writer.write_packet(&OPUS_SILENCE_20MS, i64::from(FRAME_SAMPLES)).unwrap();
//! writer.close().unwrap();
//! let bytes = writer.into_inner();
//! assert_eq!(&bytes[..4], b"OggS");
//! ```

pub mod codec;
pub mod opusrt;
pub mod pcm;

pub use pcm::Format;
