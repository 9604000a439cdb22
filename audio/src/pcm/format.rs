//! PCM audio format.

use std::time::Duration;

/// Describes 16-bit signed little-endian PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
    /// True for stereo (2 channels), false for mono (1 channel).
    pub stereo: bool,
}

impl Format {
    /// Creates a mono format with the given sample rate.
    pub const fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            stereo: false,
        }
    }

    /// Creates a stereo format with the given sample rate.
    pub const fn stereo(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            stereo: true,
        }
    }

    /// 48kHz stereo, the only layout the playback pipeline emits.
    pub const STEREO_48K: Format = Format::stereo(48000);

    /// Returns the number of channels (1 for mono, 2 for stereo).
    pub fn channels(&self) -> usize {
        if self.stereo { 2 } else { 1 }
    }

    /// Returns the number of bytes per sample frame.
    pub fn sample_bytes(&self) -> usize {
        self.channels() * 2
    }

    /// Bytes covering `duration` of audio.
    pub fn bytes_in_duration(&self, duration: Duration) -> usize {
        let samples = u128::from(self.sample_rate) * duration.as_micros() / 1_000_000;
        samples as usize * self.sample_bytes()
    }

    /// Playback time of `bytes` of audio.
    pub fn duration(&self, bytes: usize) -> Duration {
        let samples = (bytes / self.sample_bytes()) as u64;
        Duration::from_micros(samples * 1_000_000 / u64::from(self.sample_rate))
    }
}
