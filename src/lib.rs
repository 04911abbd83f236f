//! An NDI® network video input for a live-production host.
//!
//! Each host source instance connects to one named NDI sender, receives its
//! video (and optionally audio) on a dedicated worker thread, and hands the
//! frames to the host's asynchronous output. The host's preview/program
//! visibility is reported back to the sender as tally.
//!
//! # Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "ndi")]
//! # fn demo<H: ndi_source::SourceHost>(host: std::sync::Arc<H>) -> ndi_source::Result<()> {
//! use ndi_source::{Plugin, Settings, SourceOptions, PROP_SOURCE};
//!
//! let plugin = Plugin::load(SourceOptions::default())?;
//! for name in plugin.source_names() {
//!     println!("Found: {name}");
//! }
//!
//! let mut settings = Settings::new();
//! settings.set_string(PROP_SOURCE, "STUDIO (Camera 1)");
//! let source = plugin.create_source(host, &settings);
//! source.activate();
//! # Ok(())
//! # }
//! ```
//!
//! # Core Concepts
//!
//! ## Collaborators
//!
//! The host is reached through [`SourceHost`] and the network library
//! through [`Transport`], [`ReceiverHandle`] and [`DiscoveryProvider`]. The
//! `ndi` feature implements the transport side on top of the NDI SDK; tests
//! and other embeddings can provide their own.
//!
//! ## Lifecycle
//!
//! [`NdiSource`] maps the host's create/update/show/hide/activate/deactivate
//! and destroy callbacks onto one worker thread. An update always joins the
//! previous worker before starting the next, so a source never has two open
//! receivers.
//!
//! ## Frames
//!
//! Captured frames are borrowed from the transport and released through
//! RAII guards (see [`capture`]). [`translate`] rewrites their descriptors
//! into host frames without copying pixel or sample data.
//!
//! # Thread Safety
//!
//! Lifecycle callbacks run on the host's thread and never overlap for one
//! instance. The worker shares only the running flag, the tally link and
//! the state cell with it.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

// Internal modules
mod error;

// Public modules
pub mod capture;
pub mod frames;
pub mod host;
#[cfg(feature = "ndi")]
pub mod ndi;
pub mod plugin;
pub mod session;
pub mod settings;
pub mod source;
pub mod translate;
pub mod transport;
pub mod worker;

// Re-exports
pub use {
    error::*,
    frames::{AudioFrameRef, MetadataFrameRef, PixelFormat, RawCapture, VideoFrameRef},
    host::{
        AudioFormat, Clock, ColorParams, SourceAudioFrame, SourceHost, SourceVideoFrame,
        SpeakerLayout, VideoFormat,
    },
    plugin::{Plugin, SOURCE_ID, SOURCE_OUTPUT_FLAGS},
    settings::{
        Bandwidth, Settings, SettingsData, SourceOptions, SourceOptionsBuilder, SourceSettings,
        SyncMode, PROP_BANDWIDTH, PROP_FIX_ALPHA, PROP_HW_ACCEL, PROP_SOURCE, PROP_SYNC,
    },
    source::NdiSource,
    transport::{
        ConnectionDescriptor, DiscoveryProvider, ReceiverHandle, RecvColorFormat, Tally, Transport,
    },
    worker::WorkerState,
};

/// Alias for Result with our Error type
pub type Result<T> = std::result::Result<T, crate::error::Error>;
