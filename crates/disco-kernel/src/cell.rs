//! Cell state: a color slot, a suspension flag, and an actor generation.
//!
//! Cells are owned by their grid and shared across actor tasks, so every
//! field sits behind interior mutability. While running, a cell's own actor
//! is the sole writer of its color; neighbor actors only read it. The
//! suspension flag is written only from the external lifecycle entry points
//! (`start`/`stop`/`toggle` on the grid), never from inside an actor.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::color::Color;
use crate::grid::Position;

/// One square of the grid.
pub struct Cell {
    position: Position,
    /// Whole-struct lock: a reader can never observe a half-written triple.
    color: RwLock<Color>,
    suspended: AtomicBool,
    /// Incremented on every `start`. An actor carries the value current at
    /// its spawn and exits once the counter has moved past it, so a stale
    /// actor never writes after being superseded.
    generation: AtomicU64,
}

impl Cell {
    pub(crate) fn new(position: Position, color: Color) -> Self {
        Self {
            position,
            color: RwLock::new(color),
            suspended: AtomicBool::new(true),
            generation: AtomicU64::new(0),
        }
    }

    /// Fixed position of this cell within its grid.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Current color, readable by any task at any time.
    pub fn color(&self) -> Color {
        *self.color.read()
    }

    /// Overwrite the cell's color as a single atomic value.
    ///
    /// Seeding hook for embedders painting an initial pattern; during
    /// simulation only the cell's own actor calls this, from inside the
    /// grid-wide update lock.
    pub fn set_color(&self, color: Color) {
        *self.color.write() = color;
    }

    /// Whether the cell's actor has been asked to stop (or never started).
    ///
    /// A suspended cell keeps its color but is excluded from its neighbors'
    /// averages.
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Atomically flip suspended -> running. Returns false if the cell was
    /// already running, which the caller reports as a double start.
    pub(crate) fn try_resume(&self) -> bool {
        self.suspended
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    /// Advance the generation counter, returning the new token for the actor
    /// about to be spawned.
    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("position", &self.position)
            .field("color", &self.color())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}
