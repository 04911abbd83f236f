//! One NDI receiver instance.

use std::{
    ffi::{c_char, CString},
    ptr,
    time::Duration,
};

use tracing::trace;

use super::{runtime::NdiRuntime, sys::*};
use crate::{
    frames::{AudioFrameRef, FrameKind, MetadataFrameRef, RawCapture, VideoFrameRef},
    settings::Bandwidth,
    transport::{ConnectionDescriptor, ReceiverHandle, RecvColorFormat, Tally},
    Error, Result,
};

/// Timecode value asking the SDK to synthesize one.
const TIMECODE_SYNTHESIZE: i64 = i64::MAX;

impl From<RecvColorFormat> for NDIlib_recv_color_format_e {
    fn from(format: RecvColorFormat) -> Self {
        match format {
            RecvColorFormat::BGRX_BGRA => {
                NDIlib_recv_color_format_e_NDIlib_recv_color_format_BGRX_BGRA
            }
            RecvColorFormat::UYVY_BGRA => {
                NDIlib_recv_color_format_e_NDIlib_recv_color_format_UYVY_BGRA
            }
            RecvColorFormat::RGBX_RGBA => {
                NDIlib_recv_color_format_e_NDIlib_recv_color_format_RGBX_RGBA
            }
            RecvColorFormat::UYVY_RGBA => {
                NDIlib_recv_color_format_e_NDIlib_recv_color_format_UYVY_RGBA
            }
            RecvColorFormat::Fastest => NDIlib_recv_color_format_e_NDIlib_recv_color_format_fastest,
            RecvColorFormat::Best => NDIlib_recv_color_format_e_NDIlib_recv_color_format_best,
        }
    }
}

impl From<Bandwidth> for NDIlib_recv_bandwidth_e {
    fn from(bandwidth: Bandwidth) -> Self {
        match bandwidth {
            Bandwidth::Highest => NDIlib_recv_bandwidth_e_NDIlib_recv_bandwidth_highest,
            Bandwidth::Lowest => NDIlib_recv_bandwidth_e_NDIlib_recv_bandwidth_lowest,
            Bandwidth::AudioOnly => NDIlib_recv_bandwidth_e_NDIlib_recv_bandwidth_audio_only,
        }
    }
}

/// An open connection to one named NDI source.
pub struct NdiReceiver {
    instance: NDIlib_recv_instance_t,
    _runtime: NdiRuntime,
}

impl NdiReceiver {
    /// Creates the receiver; the SDK starts connecting in the background.
    pub(crate) fn connect(runtime: &NdiRuntime, descriptor: &ConnectionDescriptor) -> Result<Self> {
        let source_name = CString::new(descriptor.source_name.as_str())?;
        let receiver_name = descriptor
            .receiver_name
            .as_deref()
            .map(CString::new)
            .transpose()?;

        let create = NDIlib_recv_create_v3_t {
            source_to_connect_to: NDIlib_source_t {
                p_ndi_name: source_name.as_ptr(),
                __bindgen_anon_1: NDIlib_source_t__bindgen_ty_1 {
                    p_url_address: ptr::null(),
                },
            },
            color_format: descriptor.color_format.into(),
            bandwidth: descriptor.bandwidth.into(),
            allow_video_fields: descriptor.allow_video_fields,
            p_ndi_recv_name: receiver_name.as_ref().map_or(ptr::null(), |n| n.as_ptr()),
        };

        // The SDK copies every string during create.
        let instance = unsafe { NDIlib_recv_create_v3(&create) };
        if instance.is_null() {
            return Err(Error::InitializationFailed(format!(
                "NDIlib_recv_create_v3 failed for '{}'",
                descriptor.source_name
            )));
        }
        Ok(Self {
            instance,
            _runtime: runtime.clone(),
        })
    }
}

impl ReceiverHandle for NdiReceiver {
    fn send_metadata(&self, metadata: &str) -> bool {
        let Ok(data) = CString::new(metadata) else {
            return false;
        };
        let frame = NDIlib_metadata_frame_t {
            length: (metadata.len() + 1) as i32,
            timecode: TIMECODE_SYNTHESIZE,
            p_data: data.as_ptr() as *mut c_char,
        };
        unsafe { NDIlib_recv_send_metadata(self.instance, &frame) }
    }

    fn set_tally(&self, tally: &Tally) -> bool {
        let raw = NDIlib_tally_t {
            on_program: tally.on_program,
            on_preview: tally.on_preview,
        };
        unsafe { NDIlib_recv_set_tally(self.instance, &raw) }
    }

    fn capture(&self, timeout: Duration) -> RawCapture {
        let mut video = NDIlib_video_frame_v2_t::default();
        let mut audio = NDIlib_audio_frame_v3_t::default();
        let mut metadata = NDIlib_metadata_frame_t::default();
        let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);

        // SAFETY: recv_capture_v3 is thread-safe and fills at most one of the
        // three frames, matching the returned type.
        let frame_type = unsafe {
            NDIlib_recv_capture_v3(
                self.instance,
                &mut video,
                &mut audio,
                &mut metadata,
                timeout_ms,
            )
        };

        // frame_type is i32 on Windows and u32 elsewhere
        #[allow(clippy::unnecessary_cast)]
        let kind = frame_type as u32;
        match FrameKind::try_from(kind) {
            Ok(FrameKind::None) => RawCapture::None,
            Ok(FrameKind::Video) => RawCapture::Video(VideoFrameRef {
                fourcc: video.FourCC as u32,
                width: video.xres,
                height: video.yres,
                line_stride: unsafe { video.__bindgen_anon_1.line_stride_in_bytes },
                frame_rate_n: video.frame_rate_N,
                frame_rate_d: video.frame_rate_D,
                data: video.p_data,
                metadata: video.p_metadata,
                timecode: video.timecode,
                timestamp: video.timestamp,
            }),
            Ok(FrameKind::Audio) => RawCapture::Audio(AudioFrameRef {
                sample_rate: audio.sample_rate,
                channels: audio.no_channels,
                samples: audio.no_samples,
                channel_stride: unsafe { audio.__bindgen_anon_1.channel_stride_in_bytes },
                data: audio.p_data as *const f32,
                metadata: audio.p_metadata,
                timecode: audio.timecode,
                timestamp: audio.timestamp,
            }),
            Ok(FrameKind::Metadata) => RawCapture::Metadata(MetadataFrameRef {
                data: metadata.p_data,
                length: metadata.length,
                timecode: metadata.timecode,
            }),
            Ok(FrameKind::StatusChange) => RawCapture::StatusChange,
            Ok(FrameKind::Error) => RawCapture::Error,
            Ok(FrameKind::SourceChange) | Err(_) => {
                trace!(kind, "unhandled frame type");
                RawCapture::Other(kind)
            }
        }
    }

    unsafe fn free_video(&self, frame: &VideoFrameRef) {
        // The SDK releases by buffer pointers; the rest is carried for completeness.
        let mut raw = NDIlib_video_frame_v2_t {
            xres: frame.width,
            yres: frame.height,
            FourCC: frame.fourcc as _,
            frame_rate_N: frame.frame_rate_n,
            frame_rate_D: frame.frame_rate_d,
            timecode: frame.timecode,
            p_data: frame.data as *mut u8,
            p_metadata: frame.metadata,
            timestamp: frame.timestamp,
            ..Default::default()
        };
        raw.__bindgen_anon_1.line_stride_in_bytes = frame.line_stride;
        NDIlib_recv_free_video_v2(self.instance, &raw);
    }

    unsafe fn free_audio(&self, frame: &AudioFrameRef) {
        let mut raw = NDIlib_audio_frame_v3_t {
            sample_rate: frame.sample_rate,
            no_channels: frame.channels,
            no_samples: frame.samples,
            timecode: frame.timecode,
            p_data: frame.data as *mut u8,
            p_metadata: frame.metadata,
            timestamp: frame.timestamp,
            ..Default::default()
        };
        raw.__bindgen_anon_1.channel_stride_in_bytes = frame.channel_stride;
        NDIlib_recv_free_audio_v3(self.instance, &raw);
    }

    unsafe fn free_metadata(&self, frame: &MetadataFrameRef) {
        let raw = NDIlib_metadata_frame_t {
            length: frame.length,
            timecode: frame.timecode,
            p_data: frame.data as *mut c_char,
        };
        NDIlib_recv_free_metadata(self.instance, &raw);
    }
}

impl Drop for NdiReceiver {
    fn drop(&mut self) {
        unsafe { NDIlib_recv_destroy(self.instance) };
    }
}

/// # Safety
///
/// The receiver only holds the opaque handle returned by the SDK, which may
/// be moved between threads.
unsafe impl Send for NdiReceiver {}

/// # Safety
///
/// The SDK documents `NDIlib_recv_capture_v3`, `NDIlib_recv_set_tally` and
/// `NDIlib_recv_send_metadata` as internally synchronized, so tally pushes
/// from the host thread may overlap a capture on the worker thread.
unsafe impl Sync for NdiReceiver {}
