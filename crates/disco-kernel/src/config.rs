//! Grid configuration and validation.

use serde::Deserialize;

use crate::error::KernelError;

/// Simulation parameters, fixed for the lifetime of a grid.
///
/// Loaded from TOML/JSON by embedders or assembled from CLI arguments by the
/// harness; either way [`GridConfig::validate`] runs before any cell is
/// allocated.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// Number of columns (must be positive).
    pub width: u32,

    /// Number of rows (must be positive).
    pub height: u32,

    /// Baseline scheduling interval in milliseconds (must be positive).
    ///
    /// Each actor sleeps for a uniform draw from `[delay/2, 3*delay/2)`
    /// between updates, so cells drift out of phase with each other.
    pub delay_ms: u64,

    /// Chance per update step of a random recolor instead of a neighbor
    /// average (must lie in `[0, 1]`).
    pub probability: f64,
}

impl GridConfig {
    /// Check all parameter constraints, reporting the first violation.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.width == 0 {
            return Err(KernelError::invalid("width", "must be positive"));
        }
        if self.height == 0 {
            return Err(KernelError::invalid("height", "must be positive"));
        }
        if self.delay_ms == 0 {
            return Err(KernelError::invalid("delay_ms", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(KernelError::invalid(
                "probability",
                format!("must lie in [0, 1], got {}", self.probability),
            ));
        }
        Ok(())
    }

    /// Total number of cells in a grid built from this configuration.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 8,
            height: 8,
            delay_ms: 250,
            probability: 0.1,
        }
    }
}
