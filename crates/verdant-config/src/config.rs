//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the terrain streamer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Elevation field parameters.
    pub terrain: TerrainConfig,
    /// Quadtree geometry and refinement.
    pub chunks: ChunkConfig,
    /// Surface build budgets and transition damping.
    pub streaming: StreamConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
    /// Scripted focal point path for the headless driver.
    pub walk: WalkConfig,
    /// Prop placement on streamed chunks.
    pub scatter: ScatterConfig,
    /// Water fill for chunks that dip below sea level.
    pub water: WaterConfig,
}

/// Elevation field configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// World seed; drives the per-octave offsets and prop placement.
    pub seed: u64,
    /// Frequency of the first octave.
    pub base_frequency: f64,
    /// Amplitude of the first octave, in world units.
    pub base_amplitude: f64,
    /// Frequency multiplier per octave.
    pub lacunarity: f64,
    /// Amplitude multiplier per octave.
    pub persistence: f64,
    /// Exponent of the sign-preserving height shaping (1 = off).
    pub power: f64,
    /// Constant added to every elevation.
    pub elevation_offset: f64,
    /// Octaves in the full sum.
    pub max_iterations: u32,
    /// Explicit per-octave sample offsets. Empty derives them from `seed`.
    pub iterations_offsets: Vec<[f64; 2]>,
}

/// Chunk quadtree configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkConfig {
    /// Edge length of the smallest chunks, world units.
    pub min_size: f64,
    /// Depth of the smallest chunks below a root.
    pub max_depth: u8,
    /// Split distance as a multiple of chunk size.
    pub split_ratio: f64,
    /// Explicit split distance per depth. Empty derives them from `split_ratio`.
    pub split_thresholds: Vec<f64>,
    /// Roots within this distance of the focal point are streamed.
    pub render_distance: f64,
    /// Grid cells per chunk edge (even).
    pub subdivisions: u32,
}

/// Surface streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Elevation samples taken per tick in cooperative mode.
    pub samples_per_tick: usize,
    /// Surface builds in flight at once.
    pub max_concurrent_builds: usize,
    /// Ticks before a split or merge may be reversed.
    pub min_dwell_ticks: u64,
    /// Extra fraction of the split distance before a split merges back.
    pub merge_hysteresis: f64,
    /// Released parent surfaces kept for fast merges.
    pub surface_cache_capacity: usize,
    /// Build surfaces on worker threads instead of the update thread.
    pub threaded: bool,
    /// Worker threads when `threaded` (0 = based on CPU count).
    pub worker_threads: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Also write JSON logs to a file in the log directory (debug builds).
    pub json_log_file: bool,
    /// Log tree statistics every this many ticks (0 = only at the end).
    pub stats_interval_ticks: u64,
}

/// Headless walk configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WalkConfig {
    /// Fixed update ticks to run.
    pub ticks: u64,
    /// Update rate in Hz.
    pub tick_rate: u32,
    /// Walking speed in world units per second.
    pub speed: f64,
    /// Player eye height above the ground.
    pub eye_height: f64,
    /// XZ waypoints visited in order, looping back to the first.
    pub waypoints: Vec<[f64; 2]>,
    /// Sleep between ticks to run in real time instead of as fast as
    /// possible.
    pub real_time: bool,
}

/// Prop scattering configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScatterConfig {
    /// Placement attempts per chunk.
    pub attempts_per_chunk: u32,
    /// Largest height difference to the ±`slope_delta` neighbours accepted.
    pub max_slope: f64,
    /// Sample offset for the slope check.
    pub slope_delta: f64,
    /// Only scatter on chunks at this depth or deeper.
    pub min_depth: u8,
}

/// Water fill configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaterConfig {
    /// Chunks whose surface reaches below this height get a water plane.
    pub level: f64,
    /// Turn water fill off entirely.
    pub enabled: bool,
}

// --- Default implementations ---

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            base_frequency: 0.003,
            base_amplitude: 180.0,
            lacunarity: 2.05,
            persistence: 0.45,
            power: 2.0,
            elevation_offset: 1.0,
            max_iterations: 6,
            iterations_offsets: Vec::new(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_size: 64.0,
            max_depth: 4,
            split_ratio: 1.3,
            split_thresholds: Vec::new(),
            render_distance: 1500.0,
            subdivisions: 32,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            samples_per_tick: 8192,
            max_concurrent_builds: 4,
            min_dwell_ticks: 10,
            merge_hysteresis: 0.1,
            surface_cache_capacity: 32,
            threaded: false,
            worker_threads: 0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_log_file: false,
            stats_interval_ticks: 600,
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            ticks: 3600,
            tick_rate: 60,
            speed: 12.0,
            eye_height: 1.8,
            waypoints: vec![[0.0, 0.0], [400.0, 0.0], [400.0, 400.0], [0.0, 400.0]],
            real_time: false,
        }
    }
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            attempts_per_chunk: 24,
            max_slope: 2.5,
            slope_delta: 1.0,
            min_depth: 3,
        }
    }
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            level: -0.5,
            enabled: true,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let config_path = config_dir.join("config.ron");
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Encode)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let new_config = read_config(&config_path)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
