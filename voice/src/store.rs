//! Persisted frames and the range query used to rebuild containers.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use voicegate_audio::opusrt::CompressedFrame;

use crate::encoder::GapEncoder;
use crate::error::StoreError;
use crate::stream_id::StreamId;

/// Persistence collaborator for compressed frames.
#[async_trait]
pub trait FrameStore: Send + Sync {
    async fn append(&self, stream: &StreamId, frame: &CompressedFrame) -> Result<(), StoreError>;

    /// Frames with `start <= sample_index <= end`, ascending.
    ///
    /// The range is read on raw 32-bit indices and does not wrap.
    async fn frames_in_range(
        &self,
        stream: &StreamId,
        start: u32,
        end: u32,
    ) -> Result<Vec<CompressedFrame>, StoreError>;
}

/// In-memory store. A frame with an index already stored replaces it.
#[derive(Default)]
pub struct MemoryFrameStore {
    streams: RwLock<HashMap<StreamId, BTreeMap<u32, CompressedFrame>>>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames held for `stream`.
    pub fn len(&self, stream: &StreamId) -> usize {
        self.streams.read().get(stream).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl FrameStore for MemoryFrameStore {
    async fn append(&self, stream: &StreamId, frame: &CompressedFrame) -> Result<(), StoreError> {
        self.streams
            .write()
            .entry(stream.clone())
            .or_default()
            .insert(frame.sample_index, frame.clone());
        Ok(())
    }

    async fn frames_in_range(
        &self,
        stream: &StreamId,
        start: u32,
        end: u32,
    ) -> Result<Vec<CompressedFrame>, StoreError> {
        if start > end {
            return Err(StoreError::InvalidRange { start, end });
        }
        let streams = self.streams.read();
        Ok(streams
            .get(stream)
            .map(|frames| frames.range(start..=end).map(|(_, f)| f.clone()).collect())
            .unwrap_or_default())
    }
}

/// Builds a complete container from the stored frames in `[start, end]`.
///
/// Either all bytes or an error; a partial container is never returned.
pub async fn build_container(
    store: &dyn FrameStore,
    stream: &StreamId,
    start: u32,
    end: u32,
    serial: u32,
) -> Result<Vec<u8>, StoreError> {
    let frames = store.frames_in_range(stream, start, end).await?;
    if frames.is_empty() {
        return Err(StoreError::NoFrames {
            stream: stream.clone(),
            start,
            end,
        });
    }

    let mut encoder = GapEncoder::new(Vec::new(), serial)?;
    for frame in &frames {
        encoder.write_frame(frame)?;
    }
    encoder.close()?;
    Ok(encoder.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    use voicegate_audio::codec::ogg::read_opus_packets;
    use voicegate_audio::opusrt::OPUS_SILENCE_20MS;

    async fn filled(id: &StreamId, indices: &[u32]) -> MemoryFrameStore {
        let store = MemoryFrameStore::new();
        // insert out of order on purpose
        for &i in indices.iter().rev() {
            store
                .append(id, &CompressedFrame::new(0, i, vec![(i / 960) as u8]))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_range_inclusive_ascending() {
        let id = StreamId::from("s");
        let store = filled(&id, &[0, 960, 1920, 2880, 3840]).await;

        let got: Vec<u32> = store
            .frames_in_range(&id, 960, 2880)
            .await
            .unwrap()
            .iter()
            .map(|f| f.sample_index)
            .collect();
        assert_eq!(got, vec![960, 1920, 2880]);

        let got = store.frames_in_range(&id, 961, 1919).await.unwrap();
        assert!(got.is_empty());

        let other = store
            .frames_in_range(&StreamId::from("other"), 0, u32::MAX)
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_index_replaces() {
        let id = StreamId::from("s");
        let store = MemoryFrameStore::new();
        store.append(&id, &CompressedFrame::new(1, 960, vec![1])).await.unwrap();
        store.append(&id, &CompressedFrame::new(2, 960, vec![2])).await.unwrap();
        assert_eq!(store.len(&id), 1);
        let got = store.frames_in_range(&id, 960, 960).await.unwrap();
        assert_eq!(got[0].payload, vec![2]);
    }

    #[tokio::test]
    async fn test_invalid_range() {
        let store = MemoryFrameStore::new();
        let err = store
            .frames_in_range(&StreamId::from("s"), 10, 9)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRange { start: 10, end: 9 }));
    }

    #[tokio::test]
    async fn test_build_container_fills_gaps() {
        let id = StreamId::from("s");
        let store = filled(&id, &[0, 960, 4800, 5760, 9600]).await;

        let data = build_container(&store, &id, 960, 5760, 3).await.unwrap();
        let packets = read_opus_packets(Cursor::new(&data))
            .collect::<io::Result<Vec<_>>>()
            .unwrap();

        let payloads: Vec<Vec<u8>> = packets.iter().map(|p| p.data.clone()).collect();
        let s = OPUS_SILENCE_20MS.to_vec();
        assert_eq!(
            payloads,
            vec![vec![1], s.clone(), s.clone(), s, vec![5], vec![6]]
        );
        assert!(packets.iter().all(|p| p.serial_no == 3));
        assert_eq!(packets.last().unwrap().granule, 5760);
    }

    #[tokio::test]
    async fn test_build_container_empty_range() {
        let id = StreamId::from("s");
        let store = filled(&id, &[0, 960]).await;
        let err = build_container(&store, &id, 5000, 6000, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::NoFrames { .. }));

        let err = build_container(&store, &id, 6000, 5000, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRange { .. }));
    }
}
