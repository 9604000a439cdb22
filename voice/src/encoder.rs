//! Gap-aware Ogg/Opus container encoder.
//!
//! Frames arrive with their position on the 48 kHz sample timeline. When
//! the distance to the previous frame leaves whole 20 ms slots empty, the
//! encoder fills each slot with the silence sentinel so the container's
//! timeline has no unexplained jumps.
//!
//! Granules count from the first frame: a frame starting `p` samples after
//! the first one ends at granule `p + 960`. Pre-skip is 0 because the
//! payloads are already-encoded live Opus.

use std::io::Write;
use std::time::Duration;

use voicegate_audio::codec::ogg::{OpusHead, OpusWriter};
use voicegate_audio::opusrt::{
    CompressedFrame, FRAME_SAMPLES, OPUS_SILENCE_20MS, SAMPLE_RATE, sample_delta,
};

use crate::error::EncodeError;

/// Observable state of a [`GapEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    AwaitingFirstFrame,
    Streaming,
}

/// Running counters of a [`GapEncoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    /// Real frames written.
    pub frames_written: u64,
    /// Synthetic silence frames written.
    pub silence_frames: u64,
    /// Frames refused because they did not advance the timeline.
    pub rejected_frames: u64,
}

/// Writes compressed frames into an Ogg/Opus container, filling gaps.
pub struct GapEncoder<W: Write> {
    writer: OpusWriter<W>,
    state: EncoderState,
    last_sample_index: u32,
    // start of the last real frame, relative to the first frame
    position: i64,
    stats: EncoderStats,
    failed: bool,
}

impl<W: Write> GapEncoder<W> {
    /// Creates the encoder and writes the stream headers.
    pub fn new(writer: W, serial: u32) -> Result<Self, EncodeError> {
        let writer = OpusWriter::new(writer, serial, OpusHead::stereo_48k(0))?;
        Ok(Self {
            writer,
            state: EncoderState::AwaitingFirstFrame,
            last_sample_index: 0,
            position: 0,
            stats: EncoderStats::default(),
            failed: false,
        })
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    /// Sample index of the most recent real frame, if any.
    pub fn last_sample_index(&self) -> Option<u32> {
        match self.state {
            EncoderState::AwaitingFirstFrame => None,
            EncoderState::Streaming => Some(self.last_sample_index),
        }
    }

    /// Granule position reached so far.
    pub fn granule(&self) -> i64 {
        self.writer.granule()
    }

    /// Decodable duration of the container so far.
    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.granule().max(0) as u64 * 1_000_000 / u64::from(SAMPLE_RATE))
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }

    /// Writes one real frame, preceded by any silence needed to cover a gap.
    ///
    /// Returns the number of silence frames inserted. A frame whose sample
    /// index does not move past the previous one is refused with
    /// [`EncodeError::Stale`] and leaves the encoder unchanged.
    pub fn write_frame(&mut self, frame: &CompressedFrame) -> Result<u64, EncodeError> {
        if self.failed || self.writer.is_closed() {
            return Err(EncodeError::Closed);
        }

        let frame_samples = i64::from(FRAME_SAMPLES);
        let (start, silence) = match self.state {
            EncoderState::AwaitingFirstFrame => (0, 0),
            EncoderState::Streaming => {
                let delta = sample_delta(self.last_sample_index, frame.sample_index);
                if delta <= 0 {
                    self.stats.rejected_frames += 1;
                    return Err(EncodeError::Stale {
                        sample_index: frame.sample_index,
                        last: self.last_sample_index,
                    });
                }
                let silence = if delta > frame_samples {
                    (delta - 1) / frame_samples
                } else {
                    0
                };
                (self.position + delta, silence)
            }
        };

        for k in 1..=silence {
            let slot = self.position + k * frame_samples;
            self.put(&OPUS_SILENCE_20MS, slot + frame_samples)?;
        }
        self.put(&frame.payload, start + frame_samples)?;

        self.state = EncoderState::Streaming;
        self.last_sample_index = frame.sample_index;
        self.position = start;
        self.stats.silence_frames += silence as u64;
        self.stats.frames_written += 1;
        Ok(silence as u64)
    }

    fn put(&mut self, payload: &[u8], granule: i64) -> Result<(), EncodeError> {
        self.writer.write_packet(payload, granule).map_err(|e| {
            self.failed = true;
            EncodeError::Io(e)
        })
    }

    /// Finalises the container. A second call is a no-op.
    pub fn close(&mut self) -> Result<(), EncodeError> {
        if self.failed {
            return Err(EncodeError::Closed);
        }
        self.writer.close().map_err(|e| {
            self.failed = true;
            EncodeError::Io(e)
        })
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Returns the underlying writer. Call [`close`](Self::close) first.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    use voicegate_audio::codec::ogg::{OpusPacket, read_opus_packets};

    fn frame(sample_index: u32, payload: &[u8]) -> CompressedFrame {
        CompressedFrame::new(0, sample_index, payload.to_vec())
    }

    fn packets(data: &[u8]) -> Vec<OpusPacket> {
        read_opus_packets(Cursor::new(data))
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    /// (frame start, payload) pairs decoded back from a container.
    fn timeline(data: &[u8]) -> Vec<(i64, Vec<u8>)> {
        packets(data)
            .into_iter()
            .map(|p| (p.granule - i64::from(FRAME_SAMPLES), p.data))
            .collect()
    }

    fn silence() -> Vec<u8> {
        OPUS_SILENCE_20MS.to_vec()
    }

    #[test]
    fn test_gap_scenario() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        for (idx, p) in [(0, b"A"), (960, b"B"), (1920, b"C"), (5760, b"D")] {
            enc.write_frame(&frame(idx, p)).unwrap();
        }
        enc.close().unwrap();

        let got = timeline(&enc.into_inner());
        let want = vec![
            (0, b"A".to_vec()),
            (960, b"B".to_vec()),
            (1920, b"C".to_vec()),
            (2880, silence()),
            (3840, silence()),
            (4800, silence()),
            (5760, b"D".to_vec()),
        ];
        assert_eq!(got, want);
    }

    #[test]
    fn test_gap_3020_inserts_three_silences() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        enc.write_frame(&frame(10_000, b"X")).unwrap();
        assert_eq!(enc.write_frame(&frame(13_020, b"Y")).unwrap(), 3);
        enc.close().unwrap();

        let got = timeline(&enc.into_inner());
        assert_eq!(got.len(), 5);
        assert_eq!(got[0], (0, b"X".to_vec()));
        assert_eq!(got[1], (960, silence()));
        assert_eq!(got[2], (1920, silence()));
        assert_eq!(got[3], (2880, silence()));
        assert_eq!(got[4], (3020, b"Y".to_vec()));
    }

    #[test]
    fn test_small_gaps_insert_nothing() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        enc.write_frame(&frame(0, b"a")).unwrap();
        assert_eq!(enc.write_frame(&frame(960, b"b")).unwrap(), 0);
        assert_eq!(enc.write_frame(&frame(1500, b"c")).unwrap(), 0);
        assert_eq!(enc.write_frame(&frame(2460, b"d")).unwrap(), 0);
        assert_eq!(enc.stats().silence_frames, 0);
        enc.close().unwrap();
        assert_eq!(packets(&enc.into_inner()).len(), 4);
    }

    #[test]
    fn test_gap_boundaries() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        enc.write_frame(&frame(0, b"a")).unwrap();
        assert_eq!(enc.write_frame(&frame(961, b"b")).unwrap(), 1);
        // exact multiple: the last slot is the real frame itself
        assert_eq!(enc.write_frame(&frame(961 + 1920, b"c")).unwrap(), 1);
        assert_eq!(enc.write_frame(&frame(961 + 1920 + 1921, b"d")).unwrap(), 2);
        assert_eq!(enc.stats().silence_frames, 4);
        assert_eq!(enc.stats().frames_written, 4);
    }

    #[test]
    fn test_contiguous_duration() {
        let n = 50u32;
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        for i in 0..n {
            enc.write_frame(&frame(i * 960, &[0xfc, i as u8])).unwrap();
        }
        enc.close().unwrap();
        assert_eq!(enc.duration(), Duration::from_millis(20 * u64::from(n)));

        let pk = packets(&enc.into_inner());
        assert_eq!(pk.len(), n as usize);
        assert_eq!(pk.last().unwrap().granule, i64::from(n) * 960);
    }

    #[test]
    fn test_duration_tracks_sparse_input() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        enc.write_frame(&frame(48_000, b"a")).unwrap();
        enc.write_frame(&frame(96_000, b"b")).unwrap();
        enc.close().unwrap();
        // one second between first and last start, plus the last frame
        assert_eq!(enc.duration(), Duration::from_millis(1020));
        assert_eq!(enc.stats().silence_frames, 49);
    }

    #[test]
    fn test_last_sample_index_follows_real_frames() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        assert_eq!(enc.state(), EncoderState::AwaitingFirstFrame);
        assert_eq!(enc.last_sample_index(), None);

        enc.write_frame(&frame(0, b"a")).unwrap();
        assert_eq!(enc.state(), EncoderState::Streaming);
        assert_eq!(enc.last_sample_index(), Some(0));

        enc.write_frame(&frame(9600, b"b")).unwrap();
        assert_eq!(enc.last_sample_index(), Some(9600));
    }

    #[test]
    fn test_first_frame_at_zero_then_gap() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        enc.write_frame(&frame(0, b"a")).unwrap();
        assert_eq!(enc.write_frame(&frame(2880, b"b")).unwrap(), 2);
    }

    #[test]
    fn test_stale_frames_rejected() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        enc.write_frame(&frame(1920, b"a")).unwrap();
        let len = enc.get_ref().len();

        let err = enc.write_frame(&frame(1920, b"dup")).unwrap_err();
        assert!(matches!(err, EncodeError::Stale { sample_index: 1920, last: 1920 }));
        assert!(matches!(
            enc.write_frame(&frame(960, b"old")),
            Err(EncodeError::Stale { .. })
        ));

        assert_eq!(enc.last_sample_index(), Some(1920));
        assert_eq!(enc.stats().rejected_frames, 2);
        assert_eq!(enc.get_ref().len(), len);

        enc.write_frame(&frame(2880, b"b")).unwrap();
        enc.close().unwrap();
        let got = timeline(&enc.into_inner());
        assert_eq!(got, vec![(0, b"a".to_vec()), (960, b"b".to_vec())]);
    }

    #[test]
    fn test_wraparound_is_forward() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        enc.write_frame(&frame(u32::MAX - 959, b"a")).unwrap();
        assert_eq!(enc.write_frame(&frame(0, b"b")).unwrap(), 0);
        assert_eq!(enc.write_frame(&frame(1920, b"c")).unwrap(), 1);
        enc.close().unwrap();

        let got = timeline(&enc.into_inner());
        let starts: Vec<i64> = got.iter().map(|(s, _)| *s).collect();
        assert_eq!(starts, vec![0, 960, 1920, 2880]);
    }

    #[test]
    fn test_close_idempotent_and_write_after_close() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        enc.write_frame(&frame(0, b"a")).unwrap();
        enc.close().unwrap();
        let len = enc.get_ref().len();
        enc.close().unwrap();
        assert_eq!(enc.get_ref().len(), len);
        assert!(enc.is_closed());
        assert!(matches!(
            enc.write_frame(&frame(960, b"b")),
            Err(EncodeError::Closed)
        ));
    }

    #[test]
    fn test_empty_stream_closes_cleanly() {
        let mut enc = GapEncoder::new(Vec::new(), 1).unwrap();
        enc.close().unwrap();
        let data = enc.into_inner();
        assert!(packets(&data).is_empty());
    }

    struct FailingWriter {
        budget: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > self.budget {
                return Err(io::Error::other("disk full"));
            }
            self.budget -= buf.len();
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_io_failure_poisons_encoder() {
        assert!(GapEncoder::new(FailingWriter { budget: 10 }, 1).is_err());

        // room for the two header pages and little else
        let mut enc = GapEncoder::new(FailingWriter { budget: 100 }, 1).unwrap();
        enc.write_frame(&frame(0, &[0u8; 200])).unwrap();
        assert!(matches!(
            enc.write_frame(&frame(960, b"b")),
            Err(EncodeError::Io(_))
        ));
        assert!(matches!(
            enc.write_frame(&frame(1920, b"c")),
            Err(EncodeError::Closed)
        ));
        assert!(enc.close().is_err());
    }
}
