//! Real-time voice stream plumbing.
//!
//! This crate carries audio between a call transport and the rest of the
//! system:
//!
//! - [`Router`]: maps inbound packets to logical streams, one task each
//! - [`GapEncoder`]: writes a stream's frames into an Ogg/Opus container,
//!   filling transmission gaps with silence so the timeline stays true
//! - [`ContainerSink`] ([`MemorySink`], [`FileSink`]): where containers go
//! - [`FrameStore`] and [`build_container`]: persisted frames and rebuilds
//! - [`Recognizer`]: per-locale recognition sessions fed by the router
//! - [`playback`]: speech bytes to paced 20 ms frames via an external decoder
//!
//! # Example
//!
//! ```rust
//! use voicegate_voice::GapEncoder;
//! use voicegate_audio::opusrt::CompressedFrame;
//!
//! let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
//! enc.write_frame(&CompressedFrame::new(0, 0, vec![0xfc])).unwrap();
//! let silence = enc.write_frame(&CompressedFrame::new(1, 3840, vec![0xfc])).unwrap();
//! assert_eq!(silence, 3);
//! enc.close().unwrap();
//! ```

mod config;
mod encoder;
mod error;
pub mod logger;
pub mod playback;
mod recognizer;
mod router;
mod sink;
mod store;
mod stream;
mod stream_id;

pub use config::*;
pub use encoder::*;
pub use error::*;
pub use recognizer::*;
pub use router::*;
pub use sink::*;
pub use store::*;
pub use stream::*;
pub use stream_id::StreamId;

#[cfg(test)]
mod tests;
