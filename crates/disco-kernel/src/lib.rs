//! Disco kernel: a toroidal grid of autonomous color cells.
//!
//! Each running cell owns an independent actor task that sleeps for a
//! randomized interval, then performs one update step: with the configured
//! probability it adopts a uniformly random color, otherwise it blends
//! toward the average color of its currently-active neighbors. Update steps
//! execute under a grid-wide lock so a cell reading its neighborhood always
//! observes fully-settled colors.
//!
//! ## Usage
//!
//! ```ignore
//! use disco_kernel::{Grid, GridConfig};
//!
//! // Inside a tokio runtime: validate, allocate, and start every cell actor.
//! let grid = Grid::launch(GridConfig {
//!     width: 16,
//!     height: 16,
//!     delay_ms: 250,
//!     probability: 0.1,
//! })?;
//!
//! // The interaction layer maps a pointer event to coordinates.
//! grid.toggle(3, 7)?;
//!
//! // The rendering layer reads a consistent frame at its own cadence.
//! let frame = grid.snapshot();
//!
//! // Teardown: advisory, actors exit at their next wake.
//! grid.stop_all();
//! ```

mod actor;
pub mod cell;
pub mod color;
pub mod config;
pub mod error;
pub mod grid;

pub use cell::Cell;
pub use color::Color;
pub use config::GridConfig;
pub use error::KernelError;
pub use grid::{CellSnapshot, Grid, GridSnapshot, Position};
