//! NDI SDK implementation of the transport traits.
//!
//! Enabled by the `ndi` feature. The build script locates the SDK through
//! `NDI_SDK_DIR` (or the platform's default install path), links it, and
//! generates the raw bindings in [`sys`].

mod finder;
mod receiver;
mod runtime;
pub(crate) mod sys;

pub use {finder::NdiDiscovery, receiver::NdiReceiver, runtime::NdiRuntime};

use crate::{
    transport::{ConnectionDescriptor, Transport},
    Result,
};

/// Creates [`NdiReceiver`]s; holds the runtime alive while it exists.
#[derive(Debug, Clone)]
pub struct NdiTransport {
    runtime: NdiRuntime,
}

impl NdiTransport {
    /// Initializes the NDI runtime.
    ///
    /// # Errors
    ///
    /// Fails if the CPU is unsupported or the SDK cannot start.
    pub fn new() -> Result<Self> {
        Ok(Self {
            runtime: NdiRuntime::acquire()?,
        })
    }

    pub fn runtime(&self) -> &NdiRuntime {
        &self.runtime
    }
}

impl Transport for NdiTransport {
    type Receiver = NdiReceiver;

    fn create_receiver(&self, descriptor: &ConnectionDescriptor) -> Result<NdiReceiver> {
        NdiReceiver::connect(&self.runtime, descriptor)
    }
}
