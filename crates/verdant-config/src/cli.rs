//! Command-line argument parsing for the `verdant` driver.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Verdant command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "verdant", about = "Headless procedural terrain streamer")]
pub struct CliArgs {
    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Streaming radius in world units.
    #[arg(long)]
    pub render_distance: Option<f64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Number of fixed update ticks to run.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Build surfaces on a worker pool.
    #[arg(long)]
    pub threaded: bool,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.terrain.seed = seed;
        }
        if let Some(rd) = args.render_distance {
            self.chunks.render_distance = rd;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(ticks) = args.ticks {
            self.walk.ticks = ticks;
        }
        if args.threaded {
            self.streaming.threaded = true;
        }
    }
}
