//! Host collaborator surface.
//!
//! The media-production host supplies the source object: frame output
//! callbacks, visibility queries and a couple of utility helpers. Frame
//! structs here mirror the host's async frame model closely enough that a
//! binding layer can copy them field by field.

use once_cell::sync::Lazy;

use std::{fmt, ptr, time::Instant};

/// Maximum number of planes in a host video or audio frame.
pub const MAX_AV_PLANES: usize = 8;

/// Packs a host API version the way the host encodes it.
pub const fn make_semantic_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 24) | (minor << 16) | patch
}

/// First host API version that names the 4-channel layout "4.0" instead of "quad".
pub const LAYOUT_4POINT0_MIN_VERSION: u32 = make_semantic_version(21, 0, 0);

/// Host pixel formats this crate can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum VideoFormat {
    /// No format decided yet; the host must not be handed such a frame.
    #[default]
    None,
    UYVY,
    RGBA,
    BGRA,
    BGRX,
}

/// Host speaker layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SpeakerLayout {
    #[default]
    Unknown,
    Mono,
    Stereo,
    TwoPointOne,
    /// Pre-21.0 hosts' name for four channels.
    Quad,
    FourPointZero,
    FourPointOne,
    FivePointOne,
    SevenPointOne,
}

/// Host audio sample formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum AudioFormat {
    #[default]
    Unknown,
    Float,
    FloatPlanar,
}

/// Colorspace selector for [`SourceHost::video_format_parameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Host decides (BT.601 or BT.709 depending on resolution and version).
    #[default]
    Default,
    Rec601,
    Rec709,
}

/// Range selector for [`SourceHost::video_format_parameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoRange {
    #[default]
    Default,
    Partial,
    Full,
}

/// Color conversion parameters attached to every video frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorParams {
    pub matrix: [f32; 16],
    pub range_min: [f32; 3],
    pub range_max: [f32; 3],
}

impl Default for ColorParams {
    fn default() -> Self {
        #[rustfmt::skip]
        let identity = [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        Self {
            matrix: identity,
            range_min: [0.0; 3],
            range_max: [1.0; 3],
        }
    }
}

/// A video frame handed to the host.
///
/// Plane pointers borrow transport memory; the host must copy what it keeps
/// before the output call returns.
#[derive(Clone, Copy)]
pub struct SourceVideoFrame {
    pub data: [*const u8; MAX_AV_PLANES],
    pub linesize: [u32; MAX_AV_PLANES],
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in nanoseconds.
    pub timestamp: u64,
    pub format: VideoFormat,
    pub color_matrix: [f32; 16],
    pub color_range_min: [f32; 3],
    pub color_range_max: [f32; 3],
}

impl Default for SourceVideoFrame {
    fn default() -> Self {
        let color = ColorParams::default();
        Self {
            data: [ptr::null(); MAX_AV_PLANES],
            linesize: [0; MAX_AV_PLANES],
            width: 0,
            height: 0,
            timestamp: 0,
            format: VideoFormat::None,
            color_matrix: color.matrix,
            color_range_min: color.range_min,
            color_range_max: color.range_max,
        }
    }
}

impl fmt::Debug for SourceVideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceVideoFrame")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("linesize[0]", &self.linesize[0])
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// An audio frame handed to the host.
#[derive(Clone, Copy)]
pub struct SourceAudioFrame {
    pub data: [*const u8; MAX_AV_PLANES],
    /// Samples per channel.
    pub frames: u32,
    pub speakers: SpeakerLayout,
    pub format: AudioFormat,
    pub samples_per_sec: u32,
    /// Timestamp in nanoseconds.
    pub timestamp: u64,
}

impl Default for SourceAudioFrame {
    fn default() -> Self {
        Self {
            data: [ptr::null(); MAX_AV_PLANES],
            frames: 0,
            speakers: SpeakerLayout::Unknown,
            format: AudioFormat::Unknown,
            samples_per_sec: 0,
            timestamp: 0,
        }
    }
}

impl fmt::Debug for SourceAudioFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAudioFrame")
            .field("speakers", &self.speakers)
            .field("format", &self.format)
            .field("frames", &self.frames)
            .field("samples_per_sec", &self.samples_per_sec)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Source of "now" in nanoseconds for internally clocked timestamps.
pub trait Clock {
    fn now_ns(&self) -> u64;
}

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic clock counting from the first use in this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        u64::try_from(EPOCH.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// The host's source object as seen from one NDI source instance.
///
/// Output calls arrive on the worker thread; every other method may be
/// called from either the worker or the host's own thread.
pub trait SourceHost: Send + Sync + 'static {
    /// Display name of the source, for logs.
    fn name(&self) -> String;

    /// Pushes one video frame into the host pipeline.
    fn output_video(&self, frame: &SourceVideoFrame);

    /// Pushes one audio frame into the host pipeline.
    fn output_audio(&self, frame: &SourceAudioFrame);

    /// Whether the source is currently shown anywhere (preview).
    fn showing(&self) -> bool;

    /// Whether the source is currently live in program output.
    fn active(&self) -> bool;

    /// Asks the host to present frames as soon as they arrive.
    fn set_async_unbuffered(&self, unbuffered: bool);

    /// Default color matrix and range for the given selectors.
    fn video_format_parameters(&self, space: ColorSpace, range: VideoRange) -> ColorParams;

    /// Host API version, see [`make_semantic_version`].
    fn api_version(&self) -> u32 {
        LAYOUT_4POINT0_MIN_VERSION
    }

    /// The host's notion of "now" in nanoseconds.
    fn now_ns(&self) -> u64 {
        MonotonicClock.now_ns()
    }
}

/// Adapts a host's clock to [`Clock`].
pub(crate) struct HostClock<'a, H: ?Sized>(pub(crate) &'a H);

impl<H: SourceHost + ?Sized> Clock for HostClock<'_, H> {
    fn now_ns(&self) -> u64 {
        self.0.now_ns()
    }
}
