//! Error types for the Galaxy3D buffer system
//!
//! This module defines the error type shared by stores, requests, the
//! buffer manager and the device collaborator.

use std::fmt;

/// Result type for Galaxy3D buffer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D buffer errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error raised by the graphics device
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (descriptor, range, buffer handle)
    InvalidResource(String),

    /// A store was requested with an element type it does not hold
    TypeMismatch {
        /// Index of the store in the manager
        store_index: usize,
        /// Element type the caller asked for
        expected: &'static str,
        /// Element type the store actually holds
        found: &'static str,
    },

    /// No store registered at this index
    StoreNotFound(usize),

    /// The request worker could not be started or has shut down
    WorkerUnavailable(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::TypeMismatch { store_index, expected, found } => write!(
                f,
                "Type mismatch: store {} holds '{}', requested '{}'",
                store_index, found, expected
            ),
            Error::StoreNotFound(index) => write!(f, "Store not found: {}", index),
            Error::WorkerUnavailable(msg) => write!(f, "Worker unavailable: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an error through a logger and evaluate to the error value
///
/// # Example
///
/// ```ignore
/// return Err(engine_err!(logger, "galaxy3d::BufferManager", Error::StoreNotFound(index)));
/// ```
#[macro_export]
macro_rules! engine_err {
    ($logger:expr, $source:expr, $error:expr) => {{
        let error: $crate::galaxy3d::Error = $error;
        $crate::engine_error!($logger, $source, "{}", error);
        error
    }};
}

/// Log an error through a logger and return it from the current function
///
/// # Example
///
/// ```ignore
/// engine_bail!(logger, "galaxy3d::BufferStore", Error::InvalidResource("empty".to_string()));
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($logger:expr, $source:expr, $error:expr) => {
        return Err($crate::engine_err!($logger, $source, $error))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
