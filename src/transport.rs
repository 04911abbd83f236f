//! Transport collaborator surface.
//!
//! The network video library is a black box behind three traits:
//! [`Transport`] creates receivers, [`ReceiverHandle`] is one open
//! connection, and [`DiscoveryProvider`] lists the sources currently visible
//! on the network. The `ndi` feature provides the NDI SDK implementation.

use std::time::Duration;

use crate::{
    frames::{AudioFrameRef, MetadataFrameRef, RawCapture, VideoFrameRef},
    settings::{Bandwidth, SourceOptions, SourceSettings},
    Error, Result,
};

/// Metadata message asking the sender side for hardware-accelerated decoding.
pub const HW_ACCEL_METADATA: &str = "<ndi_hwaccel enabled=\"true\"/>";

/// Pixel layouts the receiver asks the transport to deliver.
#[allow(non_camel_case_types)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RecvColorFormat {
    BGRX_BGRA,
    /// UYVY when there is no alpha, BGRA otherwise.
    #[default]
    UYVY_BGRA,
    RGBX_RGBA,
    UYVY_RGBA,
    Fastest,
    Best,
}

/// Preview/program state signaled back to the sender.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub on_program: bool,
    pub on_preview: bool,
}

impl Tally {
    pub fn new(on_program: bool, on_preview: bool) -> Self {
        Tally {
            on_program,
            on_preview,
        }
    }
}

/// Everything needed to open one receiver.
///
/// Built fresh from the settings snapshot on every (re)start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub source_name: String,
    pub bandwidth: Bandwidth,
    pub allow_video_fields: bool,
    pub color_format: RecvColorFormat,
    pub receiver_name: Option<String>,
}

impl ConnectionDescriptor {
    /// Create a builder for the given source name
    pub fn builder<S: Into<String>>(source_name: S) -> ConnectionDescriptorBuilder {
        ConnectionDescriptorBuilder::new(source_name)
    }

    /// Derives the descriptor for a settings snapshot.
    pub fn from_settings(settings: &SourceSettings, options: &SourceOptions) -> Result<Self> {
        let mut builder = Self::builder(settings.source_name.clone())
            .bandwidth(settings.bandwidth)
            .color(options.color_format)
            .allow_video_fields(true);
        if let Some(name) = &options.receiver_name {
            builder = builder.receiver_name(name.clone());
        }
        builder.build()
    }
}

/// Builder for [`ConnectionDescriptor`].
#[derive(Debug, Clone)]
pub struct ConnectionDescriptorBuilder {
    source_name: String,
    bandwidth: Option<Bandwidth>,
    allow_video_fields: Option<bool>,
    color_format: Option<RecvColorFormat>,
    receiver_name: Option<String>,
}

impl ConnectionDescriptorBuilder {
    pub fn new<S: Into<String>>(source_name: S) -> Self {
        Self {
            source_name: source_name.into(),
            bandwidth: None,
            allow_video_fields: None,
            color_format: None,
            receiver_name: None,
        }
    }

    #[must_use]
    pub fn bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    #[must_use]
    pub fn allow_video_fields(mut self, allow: bool) -> Self {
        self.allow_video_fields = Some(allow);
        self
    }

    #[must_use]
    pub fn color(mut self, format: RecvColorFormat) -> Self {
        self.color_format = Some(format);
        self
    }

    #[must_use]
    pub fn receiver_name<S: Into<String>>(mut self, name: S) -> Self {
        self.receiver_name = Some(name.into());
        self
    }

    /// Build the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the source name is empty,
    /// or if either name contains a NUL byte.
    pub fn build(self) -> Result<ConnectionDescriptor> {
        if self.source_name.is_empty() {
            return Err(Error::InvalidConfiguration(
                "refusing to create a receiver for an empty source name".into(),
            ));
        }
        if self.source_name.contains('\0') {
            return Err(Error::InvalidConfiguration(format!(
                "source name {:?} contains a NUL byte",
                self.source_name
            )));
        }
        if let Some(name) = self.receiver_name.as_deref().filter(|n| n.contains('\0')) {
            return Err(Error::InvalidConfiguration(format!(
                "receiver name {name:?} contains a NUL byte"
            )));
        }
        Ok(ConnectionDescriptor {
            source_name: self.source_name,
            bandwidth: self.bandwidth.unwrap_or_default(),
            allow_video_fields: self.allow_video_fields.unwrap_or(true),
            color_format: self.color_format.unwrap_or_default(),
            receiver_name: self.receiver_name,
        })
    }
}

/// One open connection to a named sender.
///
/// Dropping the handle destroys the connection. The controller thread only
/// ever calls [`ReceiverHandle::set_tally`]; everything else happens on the
/// worker thread that owns the session.
pub trait ReceiverHandle: Send + Sync + 'static {
    /// Sends a metadata message upstream. Returns whether it was accepted.
    fn send_metadata(&self, metadata: &str) -> bool;

    /// Pushes preview/program state to the sender.
    fn set_tally(&self, tally: &Tally) -> bool;

    /// Waits up to `timeout` for the next frame or event.
    fn capture(&self, timeout: Duration) -> RawCapture;

    /// Returns a video frame's buffers to the transport.
    ///
    /// # Safety
    ///
    /// `frame` must come from a `capture` call on this handle and must not
    /// have been freed already.
    unsafe fn free_video(&self, frame: &VideoFrameRef);

    /// Returns an audio frame's buffers to the transport.
    ///
    /// # Safety
    ///
    /// Same contract as [`ReceiverHandle::free_video`].
    unsafe fn free_audio(&self, frame: &AudioFrameRef);

    /// Returns a metadata frame's buffer to the transport.
    ///
    /// # Safety
    ///
    /// Same contract as [`ReceiverHandle::free_video`].
    unsafe fn free_metadata(&self, frame: &MetadataFrameRef);
}

/// Factory for receivers.
pub trait Transport: Send + Sync + 'static {
    type Receiver: ReceiverHandle;

    /// Opens a receiver for `descriptor`.
    ///
    /// # Errors
    ///
    /// Fails if the library cannot create the handle. No retry is attempted.
    fn create_receiver(&self, descriptor: &ConnectionDescriptor) -> Result<Self::Receiver>;
}

/// Process-wide source discovery.
pub trait DiscoveryProvider: Send + Sync + 'static {
    /// Names of the sources currently visible, without waiting.
    fn list_current_sources(&self) -> Vec<String>;
}
