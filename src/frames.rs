//! Incoming frame descriptors as delivered by the transport.
//!
//! These are borrowed views: every pointer inside is owned by the transport
//! until the matching release call (see [`crate::capture`]). Nothing here
//! copies pixel or sample data.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use std::{os::raw::c_char, ptr};

/// Transport timestamps and timecodes count in 100 ns units.
pub const TRANSPORT_TICK_NS: u64 = 100;

/// Builds a FourCC code the way the NDI headers do (first byte lowest).
pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

const FOURCC_UYVY: u32 = fourcc(b'U', b'Y', b'V', b'Y');
const FOURCC_UYVA: u32 = fourcc(b'U', b'Y', b'V', b'A');
const FOURCC_P216: u32 = fourcc(b'P', b'2', b'1', b'6');
const FOURCC_PA16: u32 = fourcc(b'P', b'A', b'1', b'6');
const FOURCC_YV12: u32 = fourcc(b'Y', b'V', b'1', b'2');
const FOURCC_I420: u32 = fourcc(b'I', b'4', b'2', b'0');
const FOURCC_NV12: u32 = fourcc(b'N', b'V', b'1', b'2');
const FOURCC_BGRA: u32 = fourcc(b'B', b'G', b'R', b'A');
const FOURCC_BGRX: u32 = fourcc(b'B', b'G', b'R', b'X');
const FOURCC_RGBA: u32 = fourcc(b'R', b'G', b'B', b'A');
const FOURCC_RGBX: u32 = fourcc(b'R', b'G', b'B', b'X');

/// Video pixel encoding tags (FourCC codes) a transport may deliver.
///
/// Only a subset maps onto a host pixel format; see
/// [`crate::translate::host_video_format`]. Matching should always carry a
/// wildcard arm since senders may add encodings.
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u32)]
pub enum PixelFormat {
    /// YCbCr 4:2:2 (16 bits per pixel).
    UYVY = FOURCC_UYVY,
    /// YCbCr 4:2:2 followed by an alpha plane.
    UYVA = FOURCC_UYVA,
    /// 16-bit YCbCr 4:2:2.
    P216 = FOURCC_P216,
    /// 16-bit YCbCr 4:2:2 with alpha.
    PA16 = FOURCC_PA16,
    /// Planar YCbCr 4:2:0.
    YV12 = FOURCC_YV12,
    /// Planar YCbCr 4:2:0.
    I420 = FOURCC_I420,
    /// Semi-planar YCbCr 4:2:0.
    NV12 = FOURCC_NV12,
    /// Blue-Green-Red-Alpha (32 bits per pixel).
    BGRA = FOURCC_BGRA,
    /// Blue-Green-Red with padding (32 bits per pixel).
    BGRX = FOURCC_BGRX,
    /// Red-Green-Blue-Alpha (32 bits per pixel).
    RGBA = FOURCC_RGBA,
    /// Red-Green-Blue with padding (32 bits per pixel).
    RGBX = FOURCC_RGBX,
}

/// Discriminator returned by a single transport poll.
///
/// Values match the transport's `frame_type` enumeration.
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FrameKind {
    None = 0,
    Video = 1,
    Audio = 2,
    Metadata = 3,
    Error = 4,
    StatusChange = 100,
    SourceChange = 101,
}

/// Borrowed view of a received video frame.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrameRef {
    /// Raw FourCC tag; may be a value [`PixelFormat`] does not know.
    pub fourcc: u32,
    pub width: i32,
    pub height: i32,
    /// Bytes per row of the first plane.
    pub line_stride: i32,
    pub frame_rate_n: i32,
    pub frame_rate_d: i32,
    pub data: *const u8,
    /// Per-frame XML metadata, or null.
    pub metadata: *const c_char,
    pub timecode: i64,
    /// Sender timestamp in 100 ns units.
    pub timestamp: i64,
}

impl VideoFrameRef {
    /// The decoded pixel encoding, or `None` for an unknown tag.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        PixelFormat::try_from(self.fourcc).ok()
    }
}

impl Default for VideoFrameRef {
    fn default() -> Self {
        Self {
            fourcc: 0,
            width: 0,
            height: 0,
            line_stride: 0,
            frame_rate_n: 0,
            frame_rate_d: 0,
            data: ptr::null(),
            metadata: ptr::null(),
            timecode: 0,
            timestamp: 0,
        }
    }
}

/// Borrowed view of a received audio frame.
///
/// Samples are planar 32-bit float: `channels` contiguous runs of `samples`
/// values each.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrameRef {
    pub sample_rate: i32,
    pub channels: i32,
    pub samples: i32,
    /// Bytes between the starts of consecutive channels.
    pub channel_stride: i32,
    pub data: *const f32,
    pub metadata: *const c_char,
    pub timecode: i64,
    /// Sender timestamp in 100 ns units.
    pub timestamp: i64,
}

impl Default for AudioFrameRef {
    fn default() -> Self {
        Self {
            sample_rate: 0,
            channels: 0,
            samples: 0,
            channel_stride: 0,
            data: ptr::null(),
            metadata: ptr::null(),
            timecode: 0,
            timestamp: 0,
        }
    }
}

/// Borrowed view of a received metadata frame (an XML string).
#[derive(Debug, Clone, Copy)]
pub struct MetadataFrameRef {
    pub data: *const c_char,
    /// Length in bytes including the terminator, or 0 if unknown.
    pub length: i32,
    pub timecode: i64,
}

impl Default for MetadataFrameRef {
    fn default() -> Self {
        Self {
            data: ptr::null(),
            length: 0,
            timecode: 0,
        }
    }
}

/// The outcome of one bounded capture call.
#[derive(Debug, Clone, Copy)]
pub enum RawCapture {
    /// Timeout elapsed with nothing to deliver.
    None,
    Video(VideoFrameRef),
    Audio(AudioFrameRef),
    Metadata(MetadataFrameRef),
    /// The connection state of the receiver changed.
    StatusChange,
    /// The transport reported an error frame (usually a lost connection).
    Error,
    /// Any frame type this crate does not handle; nothing to release.
    Other(u32),
}

impl RawCapture {
    /// Frame kind of this capture; `Other` has no known kind.
    pub fn kind(&self) -> Option<FrameKind> {
        match self {
            RawCapture::None => Some(FrameKind::None),
            RawCapture::Video(_) => Some(FrameKind::Video),
            RawCapture::Audio(_) => Some(FrameKind::Audio),
            RawCapture::Metadata(_) => Some(FrameKind::Metadata),
            RawCapture::StatusChange => Some(FrameKind::StatusChange),
            RawCapture::Error => Some(FrameKind::Error),
            RawCapture::Other(kind) => FrameKind::try_from(*kind).ok(),
        }
    }
}
