//! Network source discovery through the NDI finder.

use std::{ffi::CStr, ptr};

use tracing::warn;

use super::{runtime::NdiRuntime, sys::*};
use crate::{transport::DiscoveryProvider, Error, Result};

/// A finder that also reports sources on the local machine.
///
/// The plugin keeps exactly one for its whole lifetime so the source list
/// is warm by the time the user opens the property dialog.
pub struct NdiDiscovery {
    instance: NDIlib_find_instance_t,
    _runtime: NdiRuntime,
}

impl NdiDiscovery {
    pub fn new(runtime: &NdiRuntime) -> Result<Self> {
        let create_settings = NDIlib_find_create_t {
            show_local_sources: true,
            p_groups: ptr::null(),
            p_extra_ips: ptr::null(),
        };

        let instance = unsafe { NDIlib_find_create_v2(&create_settings) };
        if instance.is_null() {
            return Err(Error::InitializationFailed(
                "NDIlib_find_create_v2 failed".into(),
            ));
        }
        Ok(Self {
            instance,
            _runtime: runtime.clone(),
        })
    }
}

impl DiscoveryProvider for NdiDiscovery {
    fn list_current_sources(&self) -> Vec<String> {
        let mut num_sources = 0;
        let sources_ptr =
            unsafe { NDIlib_find_get_current_sources(self.instance, &mut num_sources) };
        if sources_ptr.is_null() {
            return vec![];
        }

        (0..num_sources as usize)
            .filter_map(|i| {
                let source = unsafe { &*sources_ptr.add(i) };
                if source.p_ndi_name.is_null() {
                    return None;
                }
                match unsafe { CStr::from_ptr(source.p_ndi_name) }.to_str() {
                    Ok(name) => Some(name.to_owned()),
                    Err(e) => {
                        warn!(error = %e, "skipping source with a non UTF-8 name");
                        None
                    }
                }
            })
            .collect()
    }
}

impl Drop for NdiDiscovery {
    fn drop(&mut self) {
        unsafe { NDIlib_find_destroy(self.instance) };
    }
}

/// # Safety
///
/// The finder instance is an opaque SDK handle; the SDK documents the find
/// API as callable from any thread.
unsafe impl Send for NdiDiscovery {}

/// # Safety
///
/// `NDIlib_find_get_current_sources` is internally synchronized.
unsafe impl Sync for NdiDiscovery {}
