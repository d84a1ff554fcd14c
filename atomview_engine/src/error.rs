//! Error types for the AtomView engine
//!
//! This module defines the error types used throughout the engine,
//! including device calls, render graph mutation and frame pacing.

use std::fmt;

/// Result type for AtomView engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// AtomView engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock device, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (buffer, pipeline, mesh collection, ...)
    InvalidResource(String),

    /// Initialization failed (engine, device, swapchain)
    InitializationFailed(String),

    /// More elements requested than a region, item or queue can hold
    CapacityExceeded {
        what: String,
        requested: usize,
        capacity: usize,
    },

    /// A render graph handle that does not resolve to a node
    InvalidHandle(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::CapacityExceeded { what, requested, capacity } => write!(
                f,
                "Capacity exceeded: {} requested {} but capacity is {}",
                what, requested, capacity
            ),
            Error::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
