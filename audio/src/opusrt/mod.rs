//! Real-time Opus transport types.
//!
//! - [`Packet`]: RTP ingress packet (fixed header plus opaque payload)
//! - [`CompressedFrame`]: one encoded 20 ms frame on the 48 kHz timeline
//! - [`EpochMillis`]: wall-clock arrival timestamps
//! - [`sample_delta`]: signed distance on the wrapping 32-bit sample timeline
//!
//! # Example
//!
//! ```rust
//! use voicegate_audio::opusrt::{Packet, FRAME_SAMPLES};
//!
//! let wire = Packet::new(7, 1, 960, vec![0xF8, 0xFF, 0xFE]).marshal();
//! let frame = Packet::parse(&wire).unwrap().into_frame();
//! assert_eq!(frame.sample_index, FRAME_SAMPLES);
//! ```

use std::time::Duration;

mod frame;
mod packet;
mod timestamp;

pub use frame::*;
pub use packet::*;
pub use timestamp::*;

/// Timeline sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48000;

/// Interleaved channel count.
pub const CHANNELS: usize = 2;

/// Samples per channel in one 20 ms frame.
pub const FRAME_SAMPLES: u32 = 960;

/// Duration of one frame.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Bytes in one full 16-bit stereo PCM frame.
pub const PCM_FRAME_BYTES: usize = FRAME_SAMPLES as usize * CHANNELS * 2;

/// A 20 ms Opus frame that decodes to silence (CELT-only, fullband).
pub const OPUS_SILENCE_20MS: [u8; 3] = [0xf8, 0xff, 0xfe];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(PCM_FRAME_BYTES, 3840);
        assert_eq!(
            u128::from(FRAME_SAMPLES) * 1000 / u128::from(SAMPLE_RATE),
            FRAME_DURATION.as_millis()
        );
        // TOC: config 31 (CELT FB 20ms), mono, one frame
        assert_eq!(OPUS_SILENCE_20MS[0] >> 3, 31);
        assert_eq!(OPUS_SILENCE_20MS[0] & 0x07, 0);
    }
}
