//! A headless streaming session: walk the focal point along the configured
//! path, stream terrain around it, keep the player on the ground and
//! scatter props over finished chunks.

use std::sync::Arc;
use std::time::Duration;

use glam::{DVec2, DVec3};
use tracing::{debug, info, warn};
use verdant_config::{Config, TerrainConfig};
use verdant_lod::{BuildMode, ChunkEvent, ChunkTree, StreamingConfig};
use verdant_terrain::{ElevationConfig, ElevationField};

use crate::error::AppError;
use crate::game_loop::GameLoop;
use crate::scatter::{PropScatterer, ScatterSettings};
use crate::walk::Walker;
use crate::water::WaterPlanner;

pub fn elevation_config(terrain: &TerrainConfig) -> ElevationConfig {
    ElevationConfig {
        seed: terrain.seed,
        base_frequency: terrain.base_frequency,
        base_amplitude: terrain.base_amplitude,
        lacunarity: terrain.lacunarity,
        persistence: terrain.persistence,
        power: terrain.power,
        elevation_offset: terrain.elevation_offset,
        max_iterations: terrain.max_iterations,
        iterations_offsets: terrain.iterations_offsets.clone(),
    }
}

pub fn streaming_config(config: &Config) -> StreamingConfig {
    let chunks = &config.chunks;
    let streaming = &config.streaming;
    StreamingConfig {
        min_size: chunks.min_size,
        max_depth: chunks.max_depth,
        split_ratio: chunks.split_ratio,
        split_thresholds: (!chunks.split_thresholds.is_empty())
            .then(|| chunks.split_thresholds.clone()),
        render_distance: chunks.render_distance,
        subdivisions: chunks.subdivisions,
        iterations: None,
        samples_per_tick: streaming.samples_per_tick,
        max_concurrent_builds: streaming.max_concurrent_builds,
        min_dwell_ticks: streaming.min_dwell_ticks,
        merge_hysteresis: streaming.merge_hysteresis,
        surface_cache_capacity: streaming.surface_cache_capacity,
        build_mode: if streaming.threaded {
            BuildMode::Threaded {
                workers: streaming.worker_threads,
            }
        } else {
            BuildMode::Cooperative
        },
    }
}

/// What a finished run did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Summary {
    pub ticks: u64,
    pub distance: f64,
    pub created: u64,
    pub ready: u64,
    pub destroyed: u64,
    pub live_nodes: usize,
    pub final_nodes: usize,
    pub props: usize,
    /// Final chunks holding a water plane at the end of the run.
    pub flooded_chunks: usize,
    /// Ticks the player had no terrain under them.
    pub ungrounded_ticks: u64,
}

pub struct Session {
    tree: ChunkTree,
    walker: Walker,
    scatterer: PropScatterer,
    water: Option<WaterPlanner>,
    eye_height: f64,
    stats_interval: u64,
    player: DVec3,
    summary: Summary,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let field = Arc::new(ElevationField::new(elevation_config(&config.terrain))?);
        let tree = ChunkTree::new(field, streaming_config(config))?;
        let walker = Walker::new(&config.walk.waypoints, config.walk.speed);
        let scatterer = PropScatterer::new(ScatterSettings {
            seed: config.terrain.seed,
            attempts_per_chunk: config.scatter.attempts_per_chunk,
            max_slope: config.scatter.max_slope,
            slope_delta: config.scatter.slope_delta,
            min_depth: config.scatter.min_depth,
        });
        let water = config
            .water
            .enabled
            .then(|| WaterPlanner::new(config.water.level));
        let start = walker.position();
        Ok(Self {
            tree,
            walker,
            scatterer,
            water,
            eye_height: config.walk.eye_height,
            stats_interval: config.debug.stats_interval_ticks,
            player: DVec3::new(start.x, config.walk.eye_height, start.y),
            summary: Summary::default(),
        })
    }

    /// Advance the walk by `dt` seconds and run one tree update.
    pub fn step(&mut self, dt: f64) {
        let focal = self.walker.advance(dt);
        let events = self.tree.update(focal);
        self.scatterer.apply(&self.tree, &events);
        if let Some(water) = &mut self.water {
            water.apply(&self.tree, &events);
        }
        self.count(&events);
        self.ground(focal);

        let tick = self.tree.tick();
        if self.stats_interval > 0 && tick % self.stats_interval == 0 {
            let stats = self.tree.stats();
            info!(
                tick,
                x = focal.x,
                z = focal.y,
                roots = stats.roots,
                live = stats.live_nodes,
                finals = stats.final_nodes,
                queued = stats.queued_builds,
                active = stats.active_builds,
                cached = stats.cached_surfaces,
                props = self.scatterer.prop_count(),
                flooded = self.flooded_chunks(),
                "streaming stats"
            );
        }
    }

    fn count(&mut self, events: &[ChunkEvent]) {
        for event in events {
            match event {
                ChunkEvent::Created(_) => self.summary.created += 1,
                ChunkEvent::Ready(_) => self.summary.ready += 1,
                ChunkEvent::Destroyed(_) => self.summary.destroyed += 1,
            }
        }
    }

    fn ground(&mut self, focal: DVec2) {
        let height = match self.tree.elevation_for_position(focal.x, focal.y) {
            Some(height) => height,
            None => {
                self.summary.ungrounded_ticks += 1;
                debug!(x = focal.x, z = focal.y, "no terrain under player");
                0.0
            }
        };
        self.player = DVec3::new(focal.x, height + self.eye_height, focal.y);
    }

    pub fn player(&self) -> DVec3 {
        self.player
    }

    pub fn tree(&self) -> &ChunkTree {
        &self.tree
    }

    pub fn scatterer(&self) -> &PropScatterer {
        &self.scatterer
    }

    pub fn water(&self) -> Option<&WaterPlanner> {
        self.water.as_ref()
    }

    fn flooded_chunks(&self) -> usize {
        self.water.as_ref().map_or(0, WaterPlanner::flooded_count)
    }

    pub fn summary(&self) -> Summary {
        let stats = self.tree.stats();
        Summary {
            ticks: stats.tick,
            distance: self.walker.distance(),
            live_nodes: stats.live_nodes,
            final_nodes: stats.final_nodes,
            props: self.scatterer.prop_count(),
            flooded_chunks: self.flooded_chunks(),
            ..self.summary
        }
    }
}

/// Run a full session as configured, either paced by the wall clock or as
/// fast as the updates complete.
pub fn run(config: &Config) -> Result<Summary, AppError> {
    let mut session = Session::new(config)?;
    let mut game_loop = GameLoop::with_rate(config.walk.tick_rate);
    let ticks = config.walk.ticks;
    info!(
        ticks,
        seed = config.terrain.seed,
        render_distance = config.chunks.render_distance,
        threaded = config.streaming.threaded,
        "session started"
    );

    let step = game_loop.fixed_dt();
    while game_loop.update_count() < ticks {
        if config.walk.real_time {
            game_loop.tick(|dt, _| session.step(dt), |_| {});
            std::thread::sleep(Duration::from_secs_f64(step / 4.0));
        } else {
            game_loop.advance(step, |dt, _| session.step(dt), |_| {});
        }
    }

    let summary = session.summary();
    if summary.ungrounded_ticks > 0 {
        warn!(
            ticks = summary.ungrounded_ticks,
            "player was over unbuilt terrain"
        );
    }
    Ok(summary)
}
