//! Error taxonomy for the kernel.
//!
//! Only two things can fail: configuration validation at construction time,
//! and starting a cell whose actor is already running. Actor-internal exits
//! (suspension, supersession) are normal paths and never surface as errors.

use thiserror::Error;

/// Errors reported to callers of the kernel's public operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A configuration constraint was violated. Raised synchronously from
    /// validation, never after construction.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter {
        /// Name of the offending configuration field.
        field: &'static str,
        /// Human-readable constraint description.
        reason: String,
    },

    /// `start` was called on a cell whose actor is already running.
    ///
    /// This indicates a logic error upstream (e.g. duplicate toggle
    /// dispatch), so it is reported rather than silently ignored.
    #[error("cell {x}x{y} already has a running actor")]
    DoubleStart { x: u32, y: u32 },
}

impl KernelError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}
