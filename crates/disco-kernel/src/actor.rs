//! The per-cell actor task: sleep, check, update, repeat.
//!
//! One tokio task per running cell, spawned by `Grid::start`. The only
//! suspension point is the randomized sleep; the update step itself is
//! synchronous and runs under the grid-wide lock. Cancellation is
//! cooperative: the task observes its cell's suspended flag (or a moved
//! generation counter) on wake and exits, never mid-update.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::debug;

use crate::grid::{Grid, Position};

/// Spawn the actor for one cell. `generation` is the token the actor was
/// issued at start; once the cell's counter moves past it the actor is
/// superseded and must not write.
pub(crate) fn spawn(grid: Arc<Grid>, position: Position, generation: u64) {
    tokio::spawn(run(grid, position, generation));
}

async fn run(grid: Arc<Grid>, position: Position, generation: u64) {
    debug!(%position, generation, "cell actor running");

    // Topology never changes, so the neighbor set is fixed at actor start.
    let neighbors = grid.neighbors_of(position.x, position.y);

    loop {
        sleep(grid.random_delay()).await;

        let cell = grid.cell(position.x, position.y);
        if cell.is_suspended() {
            debug!(%position, generation, "cell actor suspended");
            break;
        }
        if cell.generation() != generation {
            // A stop/start pair raced past this sleep; the replacement actor
            // owns the cell now.
            debug!(%position, generation, "cell actor superseded");
            break;
        }

        // The wake-time checks above are advisory; the authoritative ones
        // run again under the update lock, so losing the CPU right here
        // cannot let a superseded actor write.
        if grid.update_as(position, &neighbors, generation).is_none() {
            debug!(%position, generation, "cell actor superseded");
            break;
        }
    }
}
