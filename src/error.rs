//! Error types for the ndi-source crate.

use std::ffi::NulError;
use std::io;
use thiserror::Error;

/// The main error type for NDI source operations.
///
/// None of these ever reach the host through a lifecycle callback. The
/// controller logs them and leaves the source disconnected; they surface as
/// return values only from the fallible building blocks (descriptor builder,
/// session open, plugin load).
#[derive(Debug, Error)]
pub enum Error {
    /// Transport runtime initialization failed.
    ///
    /// This typically occurs when the NDI runtime is not installed, cannot be
    /// loaded, or the CPU lacks the required instruction set.
    #[error("Failed to initialize the NDI runtime: {0}")]
    InitializationFailed(String),

    /// A null handle was returned by the transport library.
    #[error("Encountered a null pointer in function: {0}")]
    NullPointer(String),

    /// Invalid UTF-8 data in a string from the transport library.
    #[error("Invalid UTF-8 string in data: {0}")]
    InvalidUtf8(String),

    /// Failed to create a C string due to interior null bytes.
    #[error("Invalid CString: {0}")]
    InvalidCString(#[from] NulError),

    /// Configuration parameters are invalid.
    ///
    /// Raised for an empty target source name, which is the only setting
    /// that prevents a connection attempt.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O operation failed (worker thread spawn).
    #[error(transparent)]
    Io(#[from] io::Error),
}
