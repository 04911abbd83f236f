//! Process-wide NDI runtime lifetime.
//!
//! The SDK is initialized by the first [`NdiRuntime`] and torn down when the
//! last one drops. Initialization and teardown never overlap: a thread that
//! arrives mid-transition waits on the condvar.

use once_cell::sync::Lazy;

use std::{
    ffi::CStr,
    sync::{Condvar, Mutex, MutexGuard},
};

use tracing::{debug, error, info};

use super::sys::*;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initializing,
    Initialized { refcount: usize },
    Destroying,
}

struct RuntimeManager {
    state: Mutex<State>,
    cv: Condvar,
}

impl RuntimeManager {
    const fn new() -> Self {
        Self {
            state: Mutex::new(State::Uninitialized),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn acquire(&self) -> Result<()> {
        let mut state = self.lock();

        loop {
            match *state {
                State::Uninitialized => {
                    *state = State::Initializing;
                    drop(state); // no lock across FFI

                    let supported = unsafe { NDIlib_is_supported_CPU() };
                    let initialized = supported && unsafe { NDIlib_initialize() };

                    state = self.lock();
                    if initialized {
                        *state = State::Initialized { refcount: 1 };
                        self.cv.notify_all();
                        info!(version = %version().unwrap_or_default(), "NDI runtime initialized");
                        return Ok(());
                    }

                    *state = State::Uninitialized;
                    self.cv.notify_all();
                    return Err(Error::InitializationFailed(if supported {
                        "NDIlib_initialize failed".into()
                    } else {
                        "CPU is not supported by the NDI runtime".into()
                    }));
                }
                State::Initializing | State::Destroying => {
                    state = self.cv.wait(state).unwrap_or_else(|p| p.into_inner());
                }
                State::Initialized { refcount } => {
                    *state = State::Initialized {
                        refcount: refcount + 1,
                    };
                    return Ok(());
                }
            }
        }
    }

    /// Adds a reference to a runtime that is already initialized.
    ///
    /// Only reachable through an existing [`NdiRuntime`], so the state is
    /// always `Initialized` and no SDK call is made.
    fn retain(&self) {
        let mut state = self.lock();
        match *state {
            State::Initialized { refcount } => {
                *state = State::Initialized {
                    refcount: refcount + 1,
                };
            }
            other => {
                debug_assert!(false, "retain() called in invalid state: {other:?}");
                error!(state = ?other, "NDI runtime cloned while not initialized");
            }
        }
    }

    fn release(&self) {
        let mut state = self.lock();

        match *state {
            State::Initialized { refcount: 1 } => {
                *state = State::Destroying;
                drop(state);

                unsafe { NDIlib_destroy() };
                debug!("NDI runtime destroyed");

                state = self.lock();
                *state = State::Uninitialized;
                self.cv.notify_all();
            }
            State::Initialized { refcount } => {
                *state = State::Initialized {
                    refcount: refcount - 1,
                };
            }
            other => {
                debug_assert!(false, "release() called in invalid state: {other:?}");
            }
        }
    }

    fn is_running(&self) -> bool {
        matches!(*self.lock(), State::Initialized { .. })
    }
}

static RUNTIME: Lazy<RuntimeManager> = Lazy::new(RuntimeManager::new);

/// A counted reference to the initialized NDI runtime.
#[derive(Debug)]
pub struct NdiRuntime(());

impl NdiRuntime {
    /// Initializes the runtime on first use.
    ///
    /// # Errors
    ///
    /// [`Error::InitializationFailed`] if the CPU is unsupported or the SDK
    /// refuses to start.
    pub fn acquire() -> Result<Self> {
        RUNTIME.acquire()?;
        Ok(Self(()))
    }

    pub fn is_running() -> bool {
        RUNTIME.is_running()
    }

    pub fn version() -> Result<String> {
        version()
    }
}

impl Clone for NdiRuntime {
    fn clone(&self) -> Self {
        RUNTIME.retain();
        Self(())
    }
}

impl Drop for NdiRuntime {
    fn drop(&mut self) {
        RUNTIME.release();
    }
}

fn version() -> Result<String> {
    let version = unsafe { NDIlib_version() };
    if version.is_null() {
        return Err(Error::NullPointer("NDIlib_version".into()));
    }
    unsafe { CStr::from_ptr(version) }
        .to_str()
        .map(str::to_owned)
        .map_err(|e| Error::InvalidUtf8(e.to_string()))
}
