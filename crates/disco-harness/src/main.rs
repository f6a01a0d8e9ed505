//! Headless driver for the disco kernel.
//!
//! Stands in for the rendering/interaction layer: validates parameters into
//! a `GridConfig`, launches the grid, samples aggregate state on a fixed
//! cadence, optionally toggles cells at the midpoint of the run (the way a
//! user click would), and stops every actor on shutdown. Can dump the final
//! frame as JSON for offline inspection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use tokio::time::{sleep, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use disco_kernel::{Color, Grid, GridConfig};

/// Generate a timestamped output path from the given path.
/// e.g., "frame.json" -> "frame-20260830-010530.json"
fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("frame");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

/// Parse a cell coordinate given as "XxY" (e.g. "3x7").
fn parse_coords(value: &str) -> Result<(u32, u32)> {
    let Some((x, y)) = value.split_once('x') else {
        bail!("expected XxY, got {value:?}");
    };
    let x = x.trim().parse().with_context(|| format!("bad x in {value:?}"))?;
    let y = y.trim().parse().with_context(|| format!("bad y in {value:?}"))?;
    Ok((x, y))
}

#[derive(Parser)]
#[command(name = "disco-harness")]
#[command(version)]
#[command(about = "Headless toroidal disco-grid simulation")]
struct Cli {
    /// Grid width in cells
    #[arg(long, default_value = "16")]
    width: u32,

    /// Grid height in cells
    #[arg(long, default_value = "16")]
    height: u32,

    /// Baseline delay between cell updates (milliseconds)
    #[arg(long, default_value = "250")]
    delay_ms: u64,

    /// Chance of a random recolor per update step (0 = pure diffusion,
    /// 1 = pure noise)
    #[arg(long, default_value = "0.1")]
    probability: f64,

    /// How long to run before stopping all cells (seconds)
    #[arg(long, default_value = "10")]
    run_secs: u64,

    /// Sampling interval for grid statistics (milliseconds)
    #[arg(long, default_value = "1000")]
    sample_ms: u64,

    /// Cells to toggle at the midpoint of the run, as XxY (repeatable)
    #[arg(long = "toggle", value_parser = parse_coords)]
    toggles: Vec<(u32, u32)>,

    /// Write a timestamped JSON snapshot of the final frame to this path
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// How long to let in-flight sleeps drain after `stop_all` before the final
/// sample. Saturates so pathological `--delay-ms` values cannot overflow.
fn drain_window(delay_ms: u64) -> Duration {
    Duration::from_millis(delay_ms.saturating_mul(2))
}

/// Log one sample of aggregate grid state.
fn sample(grid: &Grid) {
    let frame = grid.snapshot();
    let active = frame.cells.iter().filter(|cell| !cell.suspended).count();
    let mean = Color::average(frame.cells.iter().map(|cell| cell.color))
        .unwrap_or(Color::new(0.0, 0.0, 0.0));
    info!(
        active,
        total = frame.cells.len(),
        mean = %format!("({:.3}, {:.3}, {:.3})", mean.r, mean.g, mean.b),
        "grid sample"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let config = GridConfig {
        width: cli.width,
        height: cli.height,
        delay_ms: cli.delay_ms,
        probability: cli.probability,
    };
    let grid = Grid::launch(config).context("failed to launch grid")?;

    let run = Duration::from_secs(cli.run_secs);
    let deadline = Instant::now() + run;
    let midpoint = Instant::now() + run / 2;
    let mut toggles_pending = !cli.toggles.is_empty();

    while Instant::now() < deadline {
        sample(&grid);

        if toggles_pending && Instant::now() >= midpoint {
            for &(x, y) in &cli.toggles {
                let running = grid.toggle(x, y)?;
                info!(x, y, running, "cell toggled");
            }
            toggles_pending = false;
        }

        sleep(Duration::from_millis(cli.sample_ms)).await;
    }

    grid.stop_all();
    // Let in-flight sleeps drain so the final frame is settled.
    sleep(drain_window(cli.delay_ms)).await;
    sample(&grid);

    if let Some(path) = cli.snapshot {
        let path = timestamped_path(&path);
        let frame = grid.snapshot();
        let json = serde_json::to_string_pretty(&frame)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        info!(path = %path.display(), "final frame written");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_coords_accepts_xxy() {
        assert_eq!(parse_coords("3x7").unwrap(), (3, 7));
        assert_eq!(parse_coords("0x0").unwrap(), (0, 0));
    }

    #[test]
    fn parse_coords_rejects_garbage() {
        assert!(parse_coords("3,7").is_err());
        assert!(parse_coords("x").is_err());
        assert!(parse_coords("-1x2").is_err());
    }

    #[test]
    fn drain_window_saturates_on_huge_delays() {
        assert_eq!(drain_window(250), Duration::from_millis(500));
        assert_eq!(drain_window(u64::MAX), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn timestamped_path_keeps_stem_and_extension() {
        let path = timestamped_path(Path::new("out/frame.json"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("frame-"));
        assert!(name.ends_with(".json"));
        assert_eq!(path.parent().unwrap(), Path::new("out"));
    }
}
