//! Configuration for the Verdant terrain streamer.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! Supports CLI overrides via clap, hot-reload detection, and forward/backward
//! compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    ChunkConfig, Config, DebugConfig, ScatterConfig, StreamConfig, TerrainConfig, WalkConfig,
    WaterConfig,
};
pub use error::ConfigError;
