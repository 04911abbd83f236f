//! Frame translation from transport descriptors into host frames.
//!
//! Both functions are pure apart from reading the clock: they write into a
//! caller-owned output frame, never allocate, never block and cannot fail.
//! Pixel and sample pointers are passed through untouched.

use crate::{
    frames::{AudioFrameRef, PixelFormat, VideoFrameRef, TRANSPORT_TICK_NS},
    host::{
        AudioFormat, Clock, ColorParams, SourceAudioFrame, SourceVideoFrame, SpeakerLayout,
        VideoFormat, LAYOUT_4POINT0_MIN_VERSION, MAX_AV_PLANES,
    },
    settings::SyncMode,
};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Host pixel format for a transport pixel encoding, if there is one.
pub fn host_video_format(format: PixelFormat) -> Option<VideoFormat> {
    match format {
        PixelFormat::BGRA => Some(VideoFormat::BGRA),
        PixelFormat::BGRX => Some(VideoFormat::BGRX),
        PixelFormat::RGBA | PixelFormat::RGBX => Some(VideoFormat::RGBA),
        PixelFormat::UYVY | PixelFormat::UYVA => Some(VideoFormat::UYVY),
        _ => None,
    }
}

/// Speaker layout for a channel count. Four channels depend on the host version.
pub fn speaker_layout(channels: i32, host_version: u32) -> SpeakerLayout {
    match channels {
        1 => SpeakerLayout::Mono,
        2 => SpeakerLayout::Stereo,
        3 => SpeakerLayout::TwoPointOne,
        4 if host_version >= LAYOUT_4POINT0_MIN_VERSION => SpeakerLayout::FourPointZero,
        4 => SpeakerLayout::Quad,
        5 => SpeakerLayout::FourPointOne,
        6 => SpeakerLayout::FivePointOne,
        8 => SpeakerLayout::SevenPointOne,
        _ => SpeakerLayout::Unknown,
    }
}

/// Converts a transport timestamp (100 ns ticks) to host nanoseconds.
///
/// Negative values clamp to zero and the product saturates.
pub fn transport_to_ns(timestamp: i64) -> u64 {
    u64::try_from(timestamp)
        .unwrap_or(0)
        .saturating_mul(TRANSPORT_TICK_NS)
}

/// Duration of `samples` at `sample_rate`, in nanoseconds.
fn audio_duration_ns(samples: i32, sample_rate: i32) -> u64 {
    match (u64::try_from(samples), u64::try_from(sample_rate)) {
        (Ok(samples), Ok(rate)) if rate > 0 => samples.saturating_mul(NANOS_PER_SEC) / rate,
        _ => 0,
    }
}

/// Fills `out` from `frame`.
///
/// Returns the recognized pixel encoding. For an unrecognized tag `out.format`
/// keeps whatever value it held before, so a reused output frame carries the
/// last known format forward.
pub fn translate_video<C: Clock + ?Sized>(
    frame: &VideoFrameRef,
    sync: SyncMode,
    clock: &C,
    color: &ColorParams,
    out: &mut SourceVideoFrame,
) -> Option<PixelFormat> {
    let pixel_format = frame.pixel_format();
    if let Some(format) = pixel_format.and_then(host_video_format) {
        out.format = format;
    }

    out.timestamp = match sync {
        SyncMode::Internal => clock.now_ns(),
        SyncMode::SenderTimestamp => transport_to_ns(frame.timestamp),
    };

    out.width = frame.width.max(0) as u32;
    out.height = frame.height.max(0) as u32;
    out.linesize[0] = frame.line_stride.max(0) as u32;
    out.data[0] = frame.data;

    out.color_matrix = color.matrix;
    out.color_range_min = color.range_min;
    out.color_range_max = color.range_max;

    pixel_format.filter(|f| host_video_format(*f).is_some())
}

/// Fills `out` from `frame`.
///
/// In internal sync mode the stamp is "now" plus the frame's own duration,
/// so it marks the end of playback. Channel `i` points `i * samples` floats
/// into the source buffer. Returns the chosen layout; `Unknown` is not an
/// error and the frame is still usable.
pub fn translate_audio<C: Clock + ?Sized>(
    frame: &AudioFrameRef,
    sync: SyncMode,
    clock: &C,
    host_version: u32,
    out: &mut SourceAudioFrame,
) -> SpeakerLayout {
    out.speakers = speaker_layout(frame.channels, host_version);

    out.timestamp = match sync {
        SyncMode::Internal => clock
            .now_ns()
            .saturating_add(audio_duration_ns(frame.samples, frame.sample_rate)),
        SyncMode::SenderTimestamp => transport_to_ns(frame.timestamp),
    };

    out.samples_per_sec = frame.sample_rate.max(0) as u32;
    out.format = AudioFormat::FloatPlanar;
    out.frames = frame.samples.max(0) as u32;

    let samples = frame.samples.max(0) as usize;
    let planes = (frame.channels.max(0) as usize).min(MAX_AV_PLANES);
    for (i, plane) in out.data.iter_mut().enumerate() {
        *plane = if i < planes {
            frame.data.wrapping_add(i * samples) as *const u8
        } else {
            std::ptr::null()
        };
    }

    out.speakers
}
