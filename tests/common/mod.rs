//! In-memory transport and host shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use ndi_source::{
    host::{ColorSpace, VideoRange},
    AudioFrameRef, ColorParams, ConnectionDescriptor, DiscoveryProvider, Error, MetadataFrameRef,
    RawCapture, ReceiverHandle, Result, SourceAudioFrame, SourceHost, SourceVideoFrame,
    SpeakerLayout, Tally, Transport, VideoFormat, VideoFrameRef,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[derive(Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub open: AtomicUsize,
    pub max_open: AtomicUsize,
    pub freed_video: AtomicUsize,
    pub freed_audio: AtomicUsize,
    pub freed_metadata: AtomicUsize,
}

/// State shared between a [`MockTransport`] and every receiver it creates.
#[derive(Default)]
pub struct MockNetwork {
    pub counters: Counters,
    pub frames: Mutex<VecDeque<RawCapture>>,
    pub descriptors: Mutex<Vec<ConnectionDescriptor>>,
    pub tallies: Mutex<Vec<Tally>>,
    pub metadata: Mutex<Vec<String>>,
    pub fail_connect: AtomicBool,
}

// Queued frames only point at 'static test buffers.
unsafe impl Send for MockNetwork {}
unsafe impl Sync for MockNetwork {}

impl MockNetwork {
    pub fn push(&self, capture: RawCapture) {
        self.frames.lock().unwrap().push_back(capture);
    }

    pub fn pending(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn open(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.counters.destroyed.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.counters.max_open.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> (usize, usize, usize) {
        (
            self.counters.freed_video.load(Ordering::SeqCst),
            self.counters.freed_audio.load(Ordering::SeqCst),
            self.counters.freed_metadata.load(Ordering::SeqCst),
        )
    }

    pub fn tallies(&self) -> Vec<Tally> {
        self.tallies.lock().unwrap().clone()
    }
}

pub struct MockReceiver {
    network: Arc<MockNetwork>,
}

impl ReceiverHandle for MockReceiver {
    fn send_metadata(&self, metadata: &str) -> bool {
        self.network.metadata.lock().unwrap().push(metadata.to_owned());
        true
    }

    fn set_tally(&self, tally: &Tally) -> bool {
        self.network.tallies.lock().unwrap().push(*tally);
        true
    }

    fn capture(&self, timeout: Duration) -> RawCapture {
        let next = self.network.frames.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            thread::sleep(timeout.min(Duration::from_millis(5)));
            RawCapture::None
        })
    }

    unsafe fn free_video(&self, _frame: &VideoFrameRef) {
        self.network.counters.freed_video.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn free_audio(&self, _frame: &AudioFrameRef) {
        self.network.counters.freed_audio.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn free_metadata(&self, _frame: &MetadataFrameRef) {
        self.network
            .counters
            .freed_metadata
            .fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MockReceiver {
    fn drop(&mut self) {
        let counters = &self.network.counters;
        counters.open.fetch_sub(1, Ordering::SeqCst);
        counters.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockTransport {
    pub network: Arc<MockNetwork>,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, Arc<MockNetwork>) {
        let network = Arc::new(MockNetwork::default());
        let transport = Arc::new(Self {
            network: Arc::clone(&network),
        });
        (transport, network)
    }
}

impl Transport for MockTransport {
    type Receiver = MockReceiver;

    fn create_receiver(&self, descriptor: &ConnectionDescriptor) -> Result<MockReceiver> {
        if self.network.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::InitializationFailed(format!(
                "cannot reach '{}'",
                descriptor.source_name
            )));
        }
        let counters = &self.network.counters;
        let open = counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_open.fetch_max(open, Ordering::SeqCst);
        counters.created.fetch_add(1, Ordering::SeqCst);
        self.network
            .descriptors
            .lock()
            .unwrap()
            .push(descriptor.clone());
        Ok(MockReceiver {
            network: Arc::clone(&self.network),
        })
    }
}

pub struct MockDiscovery(pub Vec<String>);

impl DiscoveryProvider for MockDiscovery {
    fn list_current_sources(&self) -> Vec<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoOut {
    pub format: VideoFormat,
    pub timestamp: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioOut {
    pub speakers: SpeakerLayout,
    pub frames: u32,
    pub timestamp: u64,
}

#[derive(Default)]
pub struct RecordingHost {
    pub video: Mutex<Vec<VideoOut>>,
    pub audio: Mutex<Vec<AudioOut>>,
    pub showing: AtomicBool,
    pub active: AtomicBool,
    pub unbuffered: AtomicBool,
}

impl RecordingHost {
    pub fn video(&self) -> Vec<VideoOut> {
        self.video.lock().unwrap().clone()
    }

    pub fn audio(&self) -> Vec<AudioOut> {
        self.audio.lock().unwrap().clone()
    }
}

impl SourceHost for RecordingHost {
    fn name(&self) -> String {
        "NDI Source".into()
    }

    fn output_video(&self, frame: &SourceVideoFrame) {
        self.video.lock().unwrap().push(VideoOut {
            format: frame.format,
            timestamp: frame.timestamp,
            width: frame.width,
            height: frame.height,
        });
    }

    fn output_audio(&self, frame: &SourceAudioFrame) {
        self.audio.lock().unwrap().push(AudioOut {
            speakers: frame.speakers,
            frames: frame.frames,
            timestamp: frame.timestamp,
        });
    }

    fn showing(&self) -> bool {
        self.showing.load(Ordering::SeqCst)
    }

    fn active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn set_async_unbuffered(&self, unbuffered: bool) {
        self.unbuffered.store(unbuffered, Ordering::SeqCst);
    }

    fn video_format_parameters(&self, _space: ColorSpace, _range: VideoRange) -> ColorParams {
        ColorParams::default()
    }
}

pub static PIXELS: [u8; 64] = [0; 64];
pub static SAMPLES: [f32; 16] = [0.0; 16];

pub fn video_frame(fourcc: u32, timestamp: i64) -> RawCapture {
    RawCapture::Video(VideoFrameRef {
        fourcc,
        width: 4,
        height: 4,
        line_stride: 16,
        frame_rate_n: 30,
        frame_rate_d: 1,
        data: PIXELS.as_ptr(),
        timestamp,
        ..Default::default()
    })
}

pub fn audio_frame(channels: i32, samples: i32, timestamp: i64) -> RawCapture {
    RawCapture::Audio(AudioFrameRef {
        sample_rate: 48_000,
        channels,
        samples,
        channel_stride: samples * 4,
        data: SAMPLES.as_ptr(),
        timestamp,
        ..Default::default()
    })
}
