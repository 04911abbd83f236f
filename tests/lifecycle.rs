//! End-to-end lifecycle of a source against an in-memory transport.

mod common;

use std::{sync::atomic::Ordering, sync::Arc, time::Duration};

use common::*;
use ndi_source::{
    frames::fourcc, Bandwidth, MetadataFrameRef, NdiSource, PixelFormat, RawCapture, Settings,
    SourceOptions, SpeakerLayout, Tally, VideoFormat, WorkerState, PROP_BANDWIDTH, PROP_HW_ACCEL,
    PROP_SOURCE, PROP_SYNC,
};

fn options() -> SourceOptions {
    SourceOptions::builder()
        .capture_timeout(Duration::from_millis(20))
        .build()
}

fn named(name: &str) -> Settings {
    let mut settings = Settings::new();
    settings.set_string(PROP_SOURCE, name);
    settings
}

#[test]
fn test_empty_name_never_connects() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());

    let source = NdiSource::create(transport, host, options(), &Settings::new());

    assert!(!source.is_running());
    assert!(!source.is_connected());
    assert_eq!(source.worker_state(), WorkerState::Stopped);
    assert_eq!(network.created(), 0);
    source.destroy();
}

#[test]
fn test_name_with_nul_byte_is_refused() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());

    let mut source = NdiSource::create(transport, host, options(), &named("CAM\0X"));
    assert!(!source.is_running());
    assert!(!source.is_connected());
    assert_eq!(source.worker_state(), WorkerState::Stopped);
    assert_eq!(network.created(), 0);

    // A later valid name still connects.
    source.update(&named("CAM1"));
    assert!(wait_until(|| source.is_connected()));
    source.destroy();
    assert_eq!(network.created(), 1);
}

#[test]
fn test_sender_timestamps_reach_the_host() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());

    let mut settings = named("CAM1");
    settings.set_int(PROP_BANDWIDTH, 1).set_int(PROP_SYNC, 1);
    network.push(video_frame(PixelFormat::BGRA.into(), 12345));

    let source = NdiSource::create(transport, Arc::clone(&host), options(), &settings);
    assert!(source.is_running());
    assert!(wait_until(|| !host.video().is_empty()));

    assert_eq!(
        host.video()[0],
        VideoOut {
            format: VideoFormat::BGRA,
            timestamp: 1_234_500,
            width: 4,
            height: 4,
        }
    );
    assert_eq!(source.worker_state(), WorkerState::Running);
    assert!(host.unbuffered.load(Ordering::SeqCst));

    let descriptors = network.descriptors.lock().unwrap().clone();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].source_name, "CAM1");
    assert_eq!(descriptors[0].bandwidth, Bandwidth::Lowest);

    source.destroy();
    assert_eq!(network.open(), 0);
}

#[test]
fn test_rapid_updates_keep_one_receiver() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());

    let mut source = NdiSource::create(transport, host, options(), &named("CAM0"));
    for i in 1..=20 {
        source.update(&named(&format!("CAM{}", i % 3)));
        assert!(network.open() <= 1);
    }
    assert!(wait_until(|| source.is_connected()));
    assert_eq!(source.settings().source_name, "CAM2");

    source.destroy();
    assert_eq!(network.max_open(), 1);
    assert_eq!(network.open(), 0);
}

#[test]
fn test_destroy_waits_for_the_worker() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());

    let source = NdiSource::create(transport, host, options(), &named("CAM1"));
    assert!(wait_until(|| network.open() == 1));

    source.destroy();
    assert_eq!(network.open(), 0);
    assert_eq!(network.created(), network.destroyed());
}

#[test]
fn test_update_to_empty_name_disconnects() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());

    let mut source = NdiSource::create(transport, host, options(), &named("CAM1"));
    assert!(wait_until(|| source.is_connected()));

    source.update(&Settings::new());
    assert!(!source.is_running());
    assert!(!source.is_connected());
    assert_eq!(source.worker_state(), WorkerState::Stopped);
    assert_eq!(network.open(), 0);
}

#[test]
fn test_tally_is_cached_until_connected() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());

    let mut source = NdiSource::create(transport, host, options(), &Settings::new());
    source.show();
    source.hide();
    source.show();

    assert_eq!(source.tally(), Tally::new(false, true));
    assert!(network.tallies().is_empty());

    source.update(&named("CAM1"));
    assert!(wait_until(|| source.is_connected()));
    assert_eq!(network.tallies(), vec![Tally::new(false, true)]);

    source.activate();
    assert_eq!(network.tallies().last(), Some(&Tally::new(true, true)));
    source.deactivate();
    source.hide();
    assert_eq!(network.tallies().last(), Some(&Tally::new(false, false)));
}

#[test]
fn test_tally_seeded_from_host_visibility() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());
    host.showing.store(true, Ordering::SeqCst);
    host.active.store(true, Ordering::SeqCst);

    let source = NdiSource::create(transport, host, options(), &named("CAM1"));
    assert_eq!(source.tally(), Tally::new(true, true));
    assert!(wait_until(|| !network.tallies().is_empty()));
    assert_eq!(network.tallies()[0], Tally::new(true, true));
}

#[test]
fn test_every_frame_released_exactly_once() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());

    network.push(video_frame(PixelFormat::UYVY.into(), 1));
    network.push(audio_frame(2, 8, 2));
    network.push(RawCapture::Metadata(MetadataFrameRef::default()));
    network.push(RawCapture::StatusChange);
    network.push(video_frame(fourcc(b'H', b'2', b'6', b'4'), 3));
    network.push(RawCapture::Error);

    let source = NdiSource::create(transport, Arc::clone(&host), options(), &named("CAM1"));
    assert!(wait_until(|| network.pending() == 0 && network.freed() == (2, 1, 1)));
    source.destroy();

    assert_eq!(network.freed(), (2, 1, 1));
    // The unknown tag reuses the format of the frame before it.
    let formats: Vec<_> = host.video().iter().map(|v| v.format).collect();
    assert_eq!(formats, vec![VideoFormat::UYVY, VideoFormat::UYVY]);
}

#[test]
fn test_audio_follows_the_option() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());
    network.push(audio_frame(2, 8, 0));

    let source = NdiSource::create(transport, Arc::clone(&host), options(), &named("CAM1"));
    assert!(wait_until(|| network.freed().1 == 1));
    source.destroy();
    assert!(host.audio().is_empty());

    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());
    network.push(audio_frame(4, 8, 100));

    let mut settings = named("CAM1");
    settings.set_int(PROP_SYNC, 1);
    let options = SourceOptions::builder()
        .capture_timeout(Duration::from_millis(20))
        .emit_audio(true)
        .build();
    let source = NdiSource::create(transport, Arc::clone(&host), options, &settings);
    assert!(wait_until(|| !host.audio().is_empty()));
    source.destroy();

    assert_eq!(
        host.audio(),
        vec![AudioOut {
            speakers: SpeakerLayout::FourPointZero,
            frames: 8,
            timestamp: 10_000,
        }]
    );
}

#[test]
fn test_hardware_acceleration_request() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    let host = Arc::new(RecordingHost::default());

    let mut settings = named("CAM1");
    settings.set_bool(PROP_HW_ACCEL, true);
    let source = NdiSource::create(transport, host, options(), &settings);
    assert!(wait_until(|| source.is_connected()));
    source.destroy();

    assert_eq!(
        *network.metadata.lock().unwrap(),
        vec![ndi_source::transport::HW_ACCEL_METADATA.to_owned()]
    );
}

#[test]
fn test_connection_failure_leaves_source_disconnected() {
    init_tracing();
    let (transport, network) = MockTransport::new();
    network.fail_connect.store(true, Ordering::SeqCst);
    let host = Arc::new(RecordingHost::default());

    let source = NdiSource::create(transport, host, options(), &named("GONE"));
    assert!(wait_until(|| source.worker_state() == WorkerState::Stopped));
    assert!(!source.is_connected());
    assert_eq!(network.created(), 0);

    // Still reachable: show/hide only touch the cache.
    source.show();
    assert!(network.tallies().is_empty());
    source.destroy();
}
