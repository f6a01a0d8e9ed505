//! The grid: toroidal topology, cell lifecycle entry points, and the locked
//! update step.
//!
//! A grid owns a fixed `width * height` array of cells for its whole
//! lifetime. Cell actors run independently, but every update step executes
//! under a single grid-wide lock: only one recolor computation is in flight
//! at any instant, so a cell averaging its neighborhood always observes
//! fully-settled neighbor colors. Sleeps stay fully concurrent; only the
//! brief update serializes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::actor;
use crate::cell::Cell;
use crate::color::Color;
use crate::config::GridConfig;
use crate::error::KernelError;

/// Normalized cell coordinates within a grid.
///
/// Always in range after construction: lookups wrap raw coordinates with the
/// Euclidean remainder, which is what makes the grid toroidal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// A consistent frame of the whole grid, taken under the update lock.
///
/// This is the read surface for rendering layers: colors and suspension
/// flags from a single instant, never mid-update.
#[derive(Debug, Clone, Serialize)]
pub struct GridSnapshot {
    pub width: u32,
    pub height: u32,
    /// Row-major: index `y * width + x`.
    pub cells: Vec<CellSnapshot>,
}

/// One cell's state within a [`GridSnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct CellSnapshot {
    pub x: u32,
    pub y: u32,
    pub color: Color,
    pub suspended: bool,
}

/// A toroidal grid of autonomous color cells.
pub struct Grid {
    config: GridConfig,
    /// Row-major cell storage: index `y * width + x`. Fixed at construction.
    cells: Vec<Cell>,
    /// Grid-wide mutual exclusion for update steps. Deliberately global
    /// rather than per-cell: a per-cell lock would let a neighbor average
    /// read one channel before and one after a concurrent recolor.
    update_lock: Mutex<()>,
}

impl Grid {
    /// Validate the configuration and allocate every cell with an
    /// independently-drawn uniform random color.
    ///
    /// Cells start suspended; call [`Grid::start_all`] (or [`Grid::launch`]
    /// in one shot) to spawn their actors. Useful on its own for embedders
    /// and tests that drive updates manually via [`Grid::step`].
    pub fn new(config: GridConfig) -> Result<Arc<Self>, KernelError> {
        config.validate()?;

        let mut rng = rand::thread_rng();
        let mut cells = Vec::with_capacity(config.cell_count());
        for y in 0..config.height {
            for x in 0..config.width {
                let color = Color::new(
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..1.0),
                );
                cells.push(Cell::new(Position { x, y }, color));
            }
        }

        info!(
            width = config.width,
            height = config.height,
            delay_ms = config.delay_ms,
            probability = config.probability,
            "grid allocated"
        );

        Ok(Arc::new(Self {
            config,
            cells,
            update_lock: Mutex::new(()),
        }))
    }

    /// Construct the grid and start every cell's actor.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`KernelError::InvalidParameter`] before any cell is allocated if the
    /// configuration is out of range.
    pub fn launch(config: GridConfig) -> Result<Arc<Self>, KernelError> {
        let grid = Self::new(config)?;
        grid.start_all()?;
        Ok(grid)
    }

    /// Start the actor of every currently-suspended cell.
    ///
    /// Fails with [`KernelError::DoubleStart`] if any cell already runs.
    pub fn start_all(self: &Arc<Self>) -> Result<(), KernelError> {
        for y in 0..self.config.height {
            for x in 0..self.config.width {
                self.start(x, y)?;
            }
        }
        Ok(())
    }

    /// Request every cell's actor to stop.
    ///
    /// Advisory and non-blocking: each actor observes its flag at the next
    /// wake, up to one `random_delay()` later, and exits without a join.
    pub fn stop_all(&self) {
        for cell in &self.cells {
            cell.suspend();
        }
        info!("stop requested for all cells");
    }

    /// Clear the cell's suspended flag and spawn a fresh actor for it.
    ///
    /// The flag flip is atomic, so calling this on a running cell fails
    /// deterministically with [`KernelError::DoubleStart`] instead of ever
    /// producing two concurrent writers for one cell. The new actor carries
    /// a bumped generation token; an outgoing actor from a recent `stop`
    /// that is still mid-sleep sees the moved counter and exits without
    /// writing.
    pub fn start(self: &Arc<Self>, x: u32, y: u32) -> Result<(), KernelError> {
        let position = self.wrap(x as i64, y as i64);
        let cell = &self.cells[self.index(position)];
        if !cell.try_resume() {
            return Err(KernelError::DoubleStart {
                x: position.x,
                y: position.y,
            });
        }
        // Bump under the update lock: any stale actor already inside an
        // update finishes first, and afterwards its token can never pass
        // the in-lock check again.
        let generation = {
            let _guard = self.update_lock.lock();
            cell.next_generation()
        };
        actor::spawn(Arc::clone(self), position, generation);
        Ok(())
    }

    /// Set the cell's suspended flag. Idempotent; the actor exits at its
    /// next wake (cooperative cancellation, no forced termination).
    pub fn stop(&self, x: u32, y: u32) {
        let position = self.wrap(x as i64, y as i64);
        self.cells[self.index(position)].suspend();
        debug!(%position, "cell suspension requested");
    }

    /// External entry point for the interaction layer: start the cell if it
    /// is suspended, stop it otherwise. Returns whether the cell is running
    /// after the call.
    pub fn toggle(self: &Arc<Self>, x: u32, y: u32) -> Result<bool, KernelError> {
        let position = self.wrap(x as i64, y as i64);
        if self.cell(position.x, position.y).is_suspended() {
            self.start(position.x, position.y)?;
            Ok(true)
        } else {
            self.stop(position.x, position.y);
            Ok(false)
        }
    }

    /// The cell at the given coordinates, wrapped toroidally.
    pub fn cell(&self, x: u32, y: u32) -> &Cell {
        let position = self.wrap(x as i64, y as i64);
        &self.cells[self.index(position)]
    }

    /// The four toroidally-adjacent positions of `(x, y)`.
    ///
    /// Pure lookup; on degenerate grids (width or height of 1) entries wrap
    /// back onto the cell itself.
    pub fn neighbors_of(&self, x: u32, y: u32) -> [Position; 4] {
        let (x, y) = (x as i64, y as i64);
        [
            self.wrap(x, y + 1),
            self.wrap(x + 1, y),
            self.wrap(x, y - 1),
            self.wrap(x - 1, y),
        ]
    }

    /// Configured chance of a random recolor per update step.
    pub fn probability(&self) -> f64 {
        self.config.probability
    }

    /// Uniform draw from `[0, 1)`, compared against `probability()` once per
    /// update step.
    pub fn random_probability(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }

    /// A color with each channel drawn uniformly from `[0, 1)`.
    pub fn random_color(&self) -> Color {
        let mut rng = rand::thread_rng();
        Color::new(
            rng.gen_range(0.0..1.0),
            rng.gen_range(0.0..1.0),
            rng.gen_range(0.0..1.0),
        )
    }

    /// Sleep interval for one actor iteration: a uniform draw from
    /// `[delay/2, 3*delay/2)`.
    ///
    /// Real-valued scaling of the configured delay, so the bounds hold for
    /// every delay and the mean stays at `delay_ms`. Randomizing per
    /// iteration drifts the actors out of phase instead of updating in
    /// lockstep.
    pub fn random_delay(&self) -> Duration {
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_millis(self.config.delay_ms).mul_f64(factor)
    }

    /// Perform one update step for the cell at `(x, y)` under the grid-wide
    /// lock, independent of the cell's suspension flag. For embedders and
    /// tests driving updates manually; actors go through the
    /// generation-gated path instead. Returns whether the color was
    /// rewritten.
    pub fn step(&self, x: u32, y: u32) -> bool {
        let position = self.wrap(x as i64, y as i64);
        let neighbors = self.neighbors_of(position.x, position.y);
        let _guard = self.update_lock.lock();
        self.recolor(position, &neighbors)
    }

    /// One update step on behalf of the actor holding `generation`.
    ///
    /// The suspension flag and generation counter are re-checked after
    /// acquiring the update lock: an actor that passed its wake-time checks
    /// but lost the CPU to a stop/start pair finds the moved counter here
    /// and backs out before touching the cell. Returns `None` when the
    /// actor is no longer the cell's writer, `Some(updated)` otherwise.
    pub(crate) fn update_as(
        &self,
        position: Position,
        neighbors: &[Position; 4],
        generation: u64,
    ) -> Option<bool> {
        let _guard = self.update_lock.lock();
        let cell = &self.cells[self.index(position)];
        if cell.is_suspended() || cell.generation() != generation {
            trace!(%position, generation, "stale update skipped");
            return None;
        }
        Some(self.recolor(position, neighbors))
    }

    /// The update step proper: noise mode with the configured probability,
    /// diffusion mode otherwise. Caller holds the update lock for the whole
    /// read-neighbors-then-write-self computation and never across an await.
    fn recolor(&self, position: Position, neighbors: &[Position; 4]) -> bool {
        trace!(%position, "update start");

        let updated = if self.probability() > self.random_probability() {
            self.cells[self.index(position)].set_color(self.random_color());
            true
        } else {
            let active = neighbors
                .iter()
                .map(|p| &self.cells[self.index(*p)])
                .filter(|cell| !cell.is_suspended())
                .map(|cell| cell.color());
            match Color::average(active) {
                Some(mean) => {
                    self.cells[self.index(position)].set_color(mean);
                    true
                }
                // Every neighbor suspended: leave the color unchanged.
                None => false,
            }
        };

        trace!(%position, updated, "update end");
        updated
    }

    /// A consistent frame of every cell, taken under the update lock so no
    /// update is mid-flight while the frame is read.
    pub fn snapshot(&self) -> GridSnapshot {
        let _guard = self.update_lock.lock();
        GridSnapshot {
            width: self.config.width,
            height: self.config.height,
            cells: self
                .cells
                .iter()
                .map(|cell| {
                    let position = cell.position();
                    CellSnapshot {
                        x: position.x,
                        y: position.y,
                        color: cell.color(),
                        suspended: cell.is_suspended(),
                    }
                })
                .collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    fn wrap(&self, x: i64, y: i64) -> Position {
        Position {
            x: x.rem_euclid(self.config.width as i64) as u32,
            y: y.rem_euclid(self.config.height as i64) as u32,
        }
    }

    fn index(&self, position: Position) -> usize {
        position.y as usize * self.config.width as usize + position.x as usize
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("config", &self.config)
            .field("cells", &self.cells.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_grid(width: u32, height: u32, probability: f64) -> Arc<Grid> {
        Grid::new(GridConfig {
            width,
            height,
            delay_ms: 100,
            probability,
        })
        .unwrap()
    }

    #[test]
    fn grid_allocates_unique_positions() {
        let grid = test_grid(4, 3, 0.1);
        let mut positions = HashSet::new();
        for y in 0..3 {
            for x in 0..4 {
                positions.insert(grid.cell(x, y).position());
            }
        }
        assert_eq!(positions.len(), 12);
    }

    #[test]
    fn every_cell_has_four_neighbors() {
        let grid = test_grid(4, 3, 0.1);
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(grid.neighbors_of(x, y).len(), 4);
            }
        }
    }

    #[test]
    fn neighbor_adjacency_is_symmetric() {
        let grid = test_grid(4, 3, 0.1);
        for y in 0..3u32 {
            for x in 0..4u32 {
                let here = Position { x, y };
                for neighbor in grid.neighbors_of(x, y) {
                    let back = grid.neighbors_of(neighbor.x, neighbor.y);
                    assert!(
                        back.contains(&here),
                        "{neighbor} does not list {here} as a neighbor"
                    );
                }
            }
        }
    }

    #[test]
    fn columns_wrap_toroidally() {
        let grid = test_grid(5, 4, 0.1);
        assert!(grid.neighbors_of(0, 1).contains(&Position { x: 4, y: 1 }));
        assert!(grid.neighbors_of(4, 1).contains(&Position { x: 0, y: 1 }));
    }

    #[test]
    fn rows_wrap_toroidally() {
        let grid = test_grid(5, 4, 0.1);
        assert!(grid.neighbors_of(2, 0).contains(&Position { x: 2, y: 3 }));
        assert!(grid.neighbors_of(2, 3).contains(&Position { x: 2, y: 0 }));
    }

    #[test]
    fn degenerate_grid_neighbors_wrap_onto_self() {
        let grid = test_grid(1, 1, 0.1);
        assert_eq!(grid.neighbors_of(0, 0), [Position { x: 0, y: 0 }; 4]);
    }

    #[test]
    fn lookup_wraps_negative_and_oversized_coordinates() {
        let grid = test_grid(5, 4, 0.1);
        assert_eq!(grid.cell(7, 9).position(), Position { x: 2, y: 1 });
        assert_eq!(grid.neighbors_of(0, 0)[3], Position { x: 4, y: 0 });
    }

    #[test]
    fn step_with_all_neighbors_suspended_is_a_no_op() {
        // Cells from Grid::new start suspended, so the whole neighborhood
        // of (1, 1) is inactive.
        let grid = test_grid(3, 3, 0.0);
        let before = grid.cell(1, 1).color();
        assert!(!grid.step(1, 1));
        assert_eq!(grid.cell(1, 1).color(), before);
    }

    #[test]
    fn step_with_probability_zero_averages_active_neighbors() {
        let grid = test_grid(3, 3, 0.0);
        let white = Color::new(1.0, 1.0, 1.0);
        // Activate exactly one neighbor of (1, 1) and pin its color.
        assert!(grid.cell(1, 2).try_resume());
        grid.cell(1, 2).set_color(white);

        assert!(grid.step(1, 1));
        assert_eq!(grid.cell(1, 1).color(), white);
    }

    #[test]
    fn step_with_probability_zero_averages_all_active_neighbors() {
        let grid = test_grid(3, 3, 0.0);
        for (position, value) in [((1, 2), 0.0), ((2, 1), 0.5), ((1, 0), 1.0), ((0, 1), 0.5)] {
            let cell = grid.cell(position.0, position.1);
            assert!(cell.try_resume());
            cell.set_color(Color::new(value, value, value));
        }

        assert!(grid.step(1, 1));
        let color = grid.cell(1, 1).color();
        assert!((color.r - 0.5).abs() < 1e-12);
        assert!((color.g - 0.5).abs() < 1e-12);
        assert!((color.b - 0.5).abs() < 1e-12);
    }

    #[test]
    fn step_with_probability_one_always_recolors() {
        let grid = test_grid(3, 3, 1.0);
        // Noise mode ignores the neighborhood entirely, even an all-
        // suspended one.
        for _ in 0..50 {
            assert!(grid.step(1, 1));
            let color = grid.cell(1, 1).color();
            for channel in [color.r, color.g, color.b] {
                assert!((0.0..1.0).contains(&channel));
            }
        }
    }

    #[test]
    fn stale_generation_never_writes() {
        let grid = test_grid(3, 3, 1.0);
        let cell = grid.cell(1, 1);
        assert!(cell.try_resume());
        let stale = cell.next_generation();
        let current = cell.next_generation();
        let neighbors = grid.neighbors_of(1, 1);
        let before = cell.color();

        // An actor that passed its wake-time checks with the old token
        // backs out at the in-lock re-check instead of recoloring.
        let position = Position { x: 1, y: 1 };
        assert_eq!(grid.update_as(position, &neighbors, stale), None);
        assert_eq!(cell.color(), before);

        // The current token still updates (probability 1 always recolors).
        assert_eq!(grid.update_as(position, &neighbors, current), Some(true));
    }

    #[test]
    fn suspension_is_rechecked_under_the_update_lock() {
        let grid = test_grid(3, 3, 1.0);
        let cell = grid.cell(1, 1);
        assert!(cell.try_resume());
        let token = cell.next_generation();
        cell.suspend();

        let neighbors = grid.neighbors_of(1, 1);
        let before = cell.color();
        assert_eq!(grid.update_as(Position { x: 1, y: 1 }, &neighbors, token), None);
        assert_eq!(cell.color(), before);
    }

    #[tokio::test]
    async fn restart_invalidates_the_previous_token() {
        let grid = Grid::new(GridConfig {
            width: 2,
            height: 2,
            delay_ms: 3_600_000,
            probability: 1.0,
        })
        .unwrap();
        grid.start(0, 0).unwrap();
        let stale = grid.cell(0, 0).generation();
        grid.stop(0, 0);
        grid.start(0, 0).unwrap();

        // The outgoing actor's token is dead the moment start() returns:
        // even mid-update-attempt it can no longer write.
        let neighbors = grid.neighbors_of(0, 0);
        let before = grid.cell(0, 0).color();
        assert_eq!(grid.update_as(Position { x: 0, y: 0 }, &neighbors, stale), None);
        assert_eq!(grid.cell(0, 0).color(), before);
        grid.stop_all();
    }

    #[test]
    fn random_delay_stays_within_half_open_band() {
        let grid = test_grid(2, 2, 0.1);
        for _ in 0..1_000 {
            let delay = grid.random_delay();
            assert!(delay >= Duration::from_millis(50), "delay {delay:?} too short");
            assert!(delay < Duration::from_millis(150), "delay {delay:?} too long");
        }
    }

    #[test]
    fn random_probability_stays_in_unit_interval() {
        let grid = test_grid(2, 2, 0.1);
        for _ in 0..1_000 {
            let p = grid.random_probability();
            assert!((0.0..1.0).contains(&p));
        }
    }

    #[test]
    fn snapshot_covers_every_cell() {
        let grid = test_grid(4, 3, 0.1);
        let frame = grid.snapshot();
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.cells.len(), 12);
        assert!(frame.cells.iter().all(|cell| cell.suspended));
    }
}
