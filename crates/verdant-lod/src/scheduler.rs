//! Drives surface builds for queued nodes.
//!
//! In cooperative mode builds run on the update thread and a tick's sample
//! budget is spent on the nearest builds first. In threaded mode whole
//! surfaces are sampled on a worker pool and collected here once per tick.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{trace, warn};
use verdant_terrain::{
    AsyncSurfaceBuilder, BuildProgress, ElevationField, HeightSurface, SurfaceBuilder,
    SurfaceError, SurfaceGrid, SurfaceTask,
};

use crate::config::BuildMode;
use crate::node::NodeId;
use crate::priority_queue::BuildQueue;

enum Backend {
    Cooperative {
        active: Vec<(NodeId, SurfaceBuilder)>,
    },
    Threaded {
        pool: AsyncSurfaceBuilder<NodeId>,
        submitted: FxHashSet<NodeId>,
    },
}

/// What happened during one [`BuildScheduler::step`].
#[derive(Default)]
pub(crate) struct StepOutcome {
    /// Nodes whose build began this tick.
    pub started: Vec<NodeId>,
    pub completed: Vec<(NodeId, HeightSurface)>,
    /// Builds that failed; the caller re-queues them.
    pub failed: Vec<NodeId>,
}

pub(crate) struct BuildScheduler {
    field: Arc<ElevationField>,
    queue: BuildQueue,
    backend: Backend,
    iterations: u32,
    samples_per_tick: usize,
    max_concurrent: usize,
}

impl BuildScheduler {
    pub(crate) fn new(
        field: Arc<ElevationField>,
        mode: BuildMode,
        iterations: u32,
        samples_per_tick: usize,
        max_concurrent: usize,
    ) -> Result<Self, SurfaceError> {
        let backend = match mode {
            BuildMode::Cooperative => Backend::Cooperative { active: Vec::new() },
            BuildMode::Threaded { workers } => {
                let workers = if workers == 0 {
                    AsyncSurfaceBuilder::<NodeId>::default_thread_count()
                } else {
                    workers
                };
                Backend::Threaded {
                    pool: AsyncSurfaceBuilder::new(
                        Arc::clone(&field),
                        workers,
                        max_concurrent,
                        max_concurrent * 2,
                    )?,
                    submitted: FxHashSet::default(),
                }
            }
        };
        Ok(Self {
            field,
            queue: BuildQueue::new(),
            backend,
            iterations,
            samples_per_tick,
            max_concurrent,
        })
    }

    /// Queue `id` for a build (or update its priority).
    pub(crate) fn enqueue(&mut self, id: NodeId, distance_sq: f64) {
        self.queue.push(id, distance_sq);
    }

    /// Forget `id`: dequeue it and abandon any build in progress.
    pub(crate) fn cancel(&mut self, id: NodeId) {
        self.queue.remove(&id);
        match &mut self.backend {
            Backend::Cooperative { active } => active.retain(|(active_id, _)| *active_id != id),
            Backend::Threaded { pool, submitted } => {
                if submitted.remove(&id) {
                    pool.cancel(&id);
                }
            }
        }
    }

    pub(crate) fn reprioritize(&mut self, distance_sq: impl FnMut(NodeId) -> f64) {
        self.queue.reprioritize(distance_sq);
    }

    /// Nodes queued but not started.
    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Builds started but not finished.
    pub(crate) fn in_progress(&self) -> usize {
        match &self.backend {
            Backend::Cooperative { active } => active.len(),
            Backend::Threaded { submitted, .. } => submitted.len(),
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_progress() == 0
    }

    /// Advance builds by one tick. `grid_of` resolves a queued id to its
    /// sample grid, or `None` if the node no longer exists.
    pub(crate) fn step(&mut self, grid_of: impl Fn(NodeId) -> Option<SurfaceGrid>) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        match &mut self.backend {
            Backend::Cooperative { active } => {
                while active.len() < self.max_concurrent {
                    let Some(id) = self.queue.pop() else { break };
                    let Some(grid) = grid_of(id) else { continue };
                    match SurfaceBuilder::new(grid, self.iterations) {
                        Ok(builder) => {
                            active.push((id, builder));
                            outcome.started.push(id);
                        }
                        Err(err) => {
                            warn!(node = %id, error = %err, "surface build could not start");
                            outcome.failed.push(id);
                        }
                    }
                }

                let mut budget = self.samples_per_tick;
                let mut index = 0;
                while index < active.len() && budget > 0 {
                    let (id, builder) = &mut active[index];
                    let id = *id;
                    match builder.step(&self.field, &mut budget) {
                        Ok(BuildProgress::Complete(surface)) => {
                            active.remove(index);
                            outcome.completed.push((id, surface));
                        }
                        Ok(BuildProgress::InProgress { done, total }) => {
                            trace!(node = %id, done, total, "surface build continues next tick");
                            index += 1;
                        }
                        Err(err) => {
                            warn!(node = %id, error = %err, "surface build failed, will retry");
                            active.remove(index);
                            outcome.failed.push(id);
                        }
                    }
                }
            }
            Backend::Threaded { pool, submitted } => {
                for built in pool.drain_results() {
                    if !submitted.remove(&built.key) {
                        continue;
                    }
                    match built.result {
                        Ok(surface) => {
                            trace!(node = %built.key, micros = built.build_time_us, "surface built");
                            outcome.completed.push((built.key, surface));
                        }
                        Err(err) => {
                            warn!(node = %built.key, error = %err, "surface build failed, will retry");
                            outcome.failed.push(built.key);
                        }
                    }
                }

                while submitted.len() < self.max_concurrent {
                    let Some(id) = self.queue.pop() else { break };
                    let Some(grid) = grid_of(id) else { continue };
                    let task = SurfaceTask {
                        key: id,
                        grid,
                        iterations: self.iterations,
                    };
                    if pool.submit(task).is_err() {
                        // The caller re-queues failed ids with a fresh priority.
                        outcome.failed.push(id);
                        break;
                    }
                    submitted.insert(id);
                    outcome.started.push(id);
                }
            }
        }
        outcome
    }
}
