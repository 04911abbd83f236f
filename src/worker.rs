//! The per-source receive loop.
//!
//! One worker thread runs per active source. It opens a
//! [`ReceiverSession`], polls it with a bounded capture until the shared
//! running flag goes false, and closes the session on the way out. The
//! capture timeout is the only cancellation mechanism, so shutdown takes at
//! most one timeout.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use tracing::{debug, error, info, trace, warn};

use crate::{
    capture::Captured,
    host::{
        ColorSpace, HostClock, SourceAudioFrame, SourceHost, SourceVideoFrame, SpeakerLayout,
        VideoFormat, VideoRange,
    },
    session::{ReceiverSession, TallyLink},
    settings::{SourceOptions, SourceSettings},
    translate::{translate_audio, translate_video},
    transport::{ConnectionDescriptor, Transport},
    Result,
};

/// Lifecycle of one worker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum WorkerState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

/// Atomic holder for a [`WorkerState`], written by the worker and read anywhere.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Stopped.into()))
    }

    pub(crate) fn get(&self) -> WorkerState {
        WorkerState::try_from(self.0.load(Ordering::Acquire)).unwrap_or(WorkerState::Stopped)
    }

    pub(crate) fn set(&self, state: WorkerState) {
        self.0.store(state.into(), Ordering::Release);
    }
}

/// Frame counters for one worker run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoopStats {
    pub(crate) video_emitted: u64,
    /// Video frames released without emission (no format known yet).
    pub(crate) video_skipped: u64,
    pub(crate) audio_received: u64,
    pub(crate) audio_emitted: u64,
    pub(crate) metadata_received: u64,
}

/// Worker thread name; thread names cannot carry NUL bytes.
fn thread_name(source_name: &str) -> String {
    format!("ndi-recv {}", source_name.replace('\0', ""))
}

/// Everything one worker run needs, moved into the thread at spawn.
pub(crate) struct Worker<T: Transport, H: SourceHost> {
    pub(crate) transport: Arc<T>,
    pub(crate) host: Arc<H>,
    pub(crate) settings: SourceSettings,
    pub(crate) options: SourceOptions,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) link: Arc<TallyLink<T::Receiver>>,
}

impl<T: Transport, H: SourceHost> Worker<T, H> {
    /// Starts the worker on its own thread.
    pub(crate) fn spawn(self) -> Result<JoinHandle<()>> {
        let state = Arc::clone(&self.state);
        state.set(WorkerState::Starting);
        thread::Builder::new()
            .name(thread_name(&self.settings.source_name))
            .spawn(move || self.run())
            .map_err(|e| {
                state.set(WorkerState::Stopped);
                e.into()
            })
    }

    /// Runs Starting → Running → Stopping → Stopped on the current thread.
    pub(crate) fn run(self) {
        self.state.set(WorkerState::Starting);

        let descriptor = match ConnectionDescriptor::from_settings(&self.settings, &self.options) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!(error = %e, "not starting receiver");
                self.state.set(WorkerState::Stopped);
                return;
            }
        };

        let session =
            match ReceiverSession::open(&*self.transport, &descriptor, Arc::clone(&self.link)) {
                Ok(session) => session,
                Err(e) => {
                    error!(
                        source = %descriptor.source_name,
                        error = %e,
                        "unable to create receiver"
                    );
                    self.state.set(WorkerState::Stopped);
                    return;
                }
            };

        session.configure_hardware_accel(self.settings.hw_accel);
        // Important for low latency receiving
        self.host.set_async_unbuffered(true);

        info!(source = %descriptor.source_name, "started A/V thread");
        self.state.set(WorkerState::Running);

        let stats = self.receive_loop(&session);

        self.state.set(WorkerState::Stopping);
        session.close();
        info!(
            source = %self.host.name(),
            video = stats.video_emitted,
            audio = stats.audio_received,
            "A/V thread completed"
        );
        self.state.set(WorkerState::Stopped);
    }

    fn receive_loop(&self, session: &ReceiverSession<T::Receiver>) -> LoopStats {
        let clock = HostClock(&*self.host);
        let mut video_out = SourceVideoFrame::default();
        let mut audio_out = SourceAudioFrame::default();
        let mut unknown_tags = HashSet::new();
        let mut stats = LoopStats::default();

        while self.running.load(Ordering::Acquire) {
            match session.capture(self.options.capture_timeout) {
                Captured::None => trace!("no data received"),

                Captured::Video(guard) => {
                    let frame = *guard.frame();
                    trace!(width = frame.width, height = frame.height, "video data received");

                    let color = self
                        .host
                        .video_format_parameters(ColorSpace::Default, VideoRange::Default);
                    let recognized =
                        translate_video(&frame, self.settings.sync, &clock, &color, &mut video_out);
                    if recognized.is_none() && unknown_tags.insert(frame.fourcc) {
                        warn!(
                            fourcc = frame.fourcc,
                            format = ?video_out.format,
                            "unrecognized pixel format"
                        );
                    }

                    if video_out.format == VideoFormat::None {
                        stats.video_skipped += 1;
                    } else {
                        self.host.output_video(&video_out);
                        stats.video_emitted += 1;
                    }
                    guard.release();
                }

                Captured::Audio(guard) => {
                    let frame = *guard.frame();
                    trace!(samples = frame.samples, "audio data received");
                    stats.audio_received += 1;

                    if self.options.emit_audio {
                        let layout = translate_audio(
                            &frame,
                            self.settings.sync,
                            &clock,
                            self.host.api_version(),
                            &mut audio_out,
                        );
                        if layout == SpeakerLayout::Unknown {
                            debug!(channels = frame.channels, "unknown speaker layout");
                        }
                        self.host.output_audio(&audio_out);
                        stats.audio_emitted += 1;
                    }
                    guard.release();
                }

                Captured::Metadata(guard) => {
                    trace!(length = guard.frame().length, "metadata received");
                    stats.metadata_received += 1;
                    guard.release();
                }

                Captured::StatusChange => debug!("receiver connection status changed"),

                Captured::Error => {
                    warn!(source = %session.source_name(), "transport reported an error frame")
                }

                Captured::Other(kind) => debug!(kind, "unknown frame type received"),
            }
        }

        stats
    }
}
