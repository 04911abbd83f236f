//! Module-level state: the process-wide transport and discovery handle.
//!
//! The host loads the module once and unloads it once; everything created
//! per source borrows from the [`Plugin`] through shared handles.

use std::{fmt, sync::Arc};

use tracing::info;

use crate::{
    host::SourceHost,
    settings::{SettingsData, SourceOptions},
    source::NdiSource,
    transport::{DiscoveryProvider, Transport},
};

/// Identifier the source type is registered under.
pub const SOURCE_ID: &str = "ndi_source";

/// Host source capability bits.
pub mod output_flags {
    pub const VIDEO: u32 = 1 << 0;
    pub const AUDIO: u32 = 1 << 1;
    pub const ASYNC: u32 = 1 << 2;
    pub const ASYNC_VIDEO: u32 = ASYNC | VIDEO;
    pub const DO_NOT_DUPLICATE: u32 = 1 << 7;
}

/// Capabilities of the registered source type.
pub const SOURCE_OUTPUT_FLAGS: u32 =
    output_flags::ASYNC_VIDEO | output_flags::AUDIO | output_flags::DO_NOT_DUPLICATE;

/// The loaded module.
pub struct Plugin<T: Transport> {
    transport: Arc<T>,
    discovery: Arc<dyn DiscoveryProvider>,
    options: SourceOptions,
}

impl<T: Transport> Plugin<T> {
    /// Wraps an initialized transport and discovery handle.
    pub fn new(
        transport: Arc<T>,
        discovery: Arc<dyn DiscoveryProvider>,
        options: SourceOptions,
    ) -> Self {
        info!(version = env!("CARGO_PKG_VERSION"), "NDI source module loaded");
        Self {
            transport,
            discovery,
            options,
        }
    }

    /// Names of the sources currently visible on the network.
    pub fn source_names(&self) -> Vec<String> {
        self.discovery.list_current_sources()
    }

    /// Handles the host's "create" event for a new source instance.
    pub fn create_source<H, D>(&self, host: Arc<H>, settings: &D) -> NdiSource<T, H>
    where
        H: SourceHost,
        D: SettingsData + ?Sized,
    {
        NdiSource::create(
            Arc::clone(&self.transport),
            host,
            self.options.clone(),
            settings,
        )
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }
}

impl<T: Transport> Drop for Plugin<T> {
    fn drop(&mut self) {
        info!("NDI source module unloading");
    }
}

impl<T: Transport> fmt::Debug for Plugin<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(feature = "ndi")]
impl Plugin<crate::ndi::NdiTransport> {
    /// Initializes the NDI runtime and the shared finder.
    ///
    /// # Errors
    ///
    /// Fails if the CPU is unsupported, the runtime cannot initialize, or the
    /// finder cannot be created.
    pub fn load(options: SourceOptions) -> crate::Result<Self> {
        let transport = crate::ndi::NdiTransport::new()?;
        let discovery = crate::ndi::NdiDiscovery::new(transport.runtime())?;
        Ok(Self::new(Arc::new(transport), Arc::new(discovery), options))
    }
}
