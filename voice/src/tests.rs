//! Scenario tests across router, encoder, sinks and store.

use super::*;
use crate::logger::NopLogger;
use std::io::{self, Cursor};
use std::sync::Arc;
use std::time::Duration;
use voicegate_audio::codec::ogg::{OpusPacket, read_opus_packets};
use voicegate_audio::opusrt::{CompressedFrame, OPUS_SILENCE_20MS, Packet};

const A: &[u8] = &[0xfc, 0xaa];
const B: &[u8] = &[0xfc, 0xbb];
const C: &[u8] = &[0xfc, 0xcc];
const D: &[u8] = &[0xfc, 0xdd];

fn read_packets(data: &[u8]) -> Vec<OpusPacket> {
    read_opus_packets(Cursor::new(data))
        .collect::<io::Result<Vec<_>>>()
        .unwrap()
}

/// Payloads with the start sample of each packet on the container timeline.
fn timeline(packets: &[OpusPacket]) -> Vec<(Vec<u8>, i64)> {
    packets
        .iter()
        .map(|p| (p.data.clone(), p.granule - 960))
        .collect()
}

fn expected_timeline() -> Vec<(Vec<u8>, i64)> {
    let s = OPUS_SILENCE_20MS.to_vec();
    vec![
        (A.to_vec(), 0),
        (B.to_vec(), 960),
        (C.to_vec(), 1920),
        (s.clone(), 2880),
        (s.clone(), 3840),
        (s, 4800),
        (D.to_vec(), 5760),
    ]
}

async fn feed_scenario(router: &Router) {
    for (seq, (idx, payload)) in [(0u32, A), (960, B), (1920, C), (5760, D)].into_iter().enumerate() {
        let wire = Packet::new(0x1234, seq as u16, idx, payload.to_vec()).marshal();
        router.ingest_raw("call-1", "main", &wire).await.unwrap();
    }
}

#[tokio::test]
async fn test_gap_scenario_through_router() {
    let sink = Arc::new(MemorySink::new());
    let router = Router::builder(sink.clone())
        .logger(Arc::new(NopLogger))
        .build();

    feed_scenario(&router).await;
    let reports = router.leave_call("call-1").await;
    assert_eq!(reports.len(), 1);

    let report = &reports[0];
    assert!(report.committed);
    assert_eq!(report.stats.frames_written, 4);
    assert_eq!(report.stats.silence_frames, 3);
    assert_eq!(report.duration, Duration::from_millis(140));
    assert_eq!(report.stream.key.ssrc, 0x1234);

    let data = sink.get(&report.stream.id).unwrap();
    let packets = read_packets(&data);
    assert_eq!(timeline(&packets), expected_timeline());
}

#[tokio::test]
async fn test_gap_scenario_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(FileSink::new(dir.path()).unwrap());
    let router = Router::builder(sink.clone())
        .logger(Arc::new(NopLogger))
        .build();

    feed_scenario(&router).await;
    let reports = router.shutdown().await;
    let path = sink.path_for(&reports[0].stream.id);

    let data = std::fs::read(&path).unwrap();
    assert_eq!(timeline(&read_packets(&data)), expected_timeline());
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);
}

#[tokio::test]
async fn test_rebuild_from_store_matches_live_container() {
    let sink = Arc::new(MemorySink::new());
    let store = Arc::new(MemoryFrameStore::new());
    let router = Router::builder(sink.clone())
        .store(store.clone())
        .logger(Arc::new(NopLogger))
        .build();

    feed_scenario(&router).await;
    let reports = router.leave_call("call-1").await;
    let id = &reports[0].stream.id;
    assert_eq!(store.len(id), 4);

    let rebuilt = build_container(store.as_ref(), id, 0, 5760, 1).await.unwrap();
    assert_eq!(timeline(&read_packets(&rebuilt)), expected_timeline());

    // a narrower range starts its own timeline at the first frame in range
    let tail = build_container(store.as_ref(), id, 1920, u32::MAX, 1).await.unwrap();
    let packets = read_packets(&tail);
    assert_eq!(packets.len(), 5);
    assert_eq!(packets.first().unwrap().data, C);
    assert_eq!(packets.last().unwrap().data, D);
    assert_eq!(packets.last().unwrap().granule, 3840 + 960);
}

#[tokio::test]
async fn test_streams_do_not_interfere() {
    let sink = Arc::new(MemorySink::new());
    let router = Router::builder(sink.clone())
        .logger(Arc::new(NopLogger))
        .build();

    let mut tasks = Vec::new();
    for ssrc in 1..=4u32 {
        let router = router.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..25u32 {
                let frame = CompressedFrame::new(i as u16, i * 960, vec![ssrc as u8]);
                router.ingest(ssrc, "call", "main", frame).await.unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    let reports = router.leave_call("call").await;
    assert_eq!(reports.len(), 4);
    for report in reports {
        assert_eq!(report.stats.frames_written, 25);
        assert_eq!(report.duration, Duration::from_millis(500));
        let packets = read_packets(&sink.get(&report.stream.id).unwrap());
        assert!(packets.iter().all(|p| p.data == vec![report.stream.key.ssrc as u8]));
    }
}

#[test]
fn test_config_round_trip_through_yaml() {
    let cfg = VoiceConfig::from_yaml_str(
        "queue_capacity: 8\nlocales: [en-US]\nplayback:\n  trailing_silence_frames: 2\n",
    )
    .unwrap();
    assert_eq!(cfg.queue_capacity, 8);
    assert_eq!(cfg.playback.trailing_silence_frames, 2);
    assert_eq!(cfg.decoder, DecoderConfig::default());

    let again = VoiceConfig::from_yaml_str(&cfg.to_yaml().unwrap()).unwrap();
    assert_eq!(again, cfg);
}
