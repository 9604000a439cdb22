//! PCM framing for the playback direction.
//!
//! - [`Format`]: sample rate and channel layout of 16-bit PCM
//! - [`Rechunker`]: carry buffer that cuts a byte stream into fixed-size chunks
//! - [`PcmFrame`]: one 20 ms block of interleaved signed 16-bit samples
//!
//! # Example
//!
//! ```rust
//! use voicegate_audio::pcm::{PcmFrame, Rechunker};
//! use voicegate_audio::opusrt::PCM_FRAME_BYTES;
//!
//! let mut chunker = Rechunker::new(PCM_FRAME_BYTES);
//! let full = chunker.push(&vec![0u8; PCM_FRAME_BYTES + 10]);
//! assert_eq!(full.len(), 1);
//! let tail = chunker.finish().unwrap();
//! assert!(!PcmFrame::from_le_bytes(&tail).is_complete());
//! ```

mod chunker;
mod format;
mod frame;

pub use chunker::Rechunker;
pub use format::Format;
pub use frame::{PcmFrame, pcm_bytes_to_i16};
