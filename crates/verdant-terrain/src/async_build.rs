//! Background surface construction on a worker pool.
//!
//! Alternative to frame-sliced building: whole surfaces are sampled on
//! worker threads and collected on the update thread once per tick.
//! Supports cancellation, and drops results that were superseded by a
//! newer submission for the same key.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, bounded};
use dashmap::DashMap;
use tracing::warn;

use crate::builder::build_surface;
use crate::elevation::ElevationField;
use crate::error::SurfaceError;
use crate::surface::{HeightSurface, SurfaceGrid};

/// A request to build one surface.
#[derive(Clone, Debug)]
pub struct SurfaceTask<K> {
    /// Caller-chosen identity of the surface (e.g. a chunk id).
    pub key: K,
    /// Lattice placement of the samples.
    pub grid: SurfaceGrid,
    /// Octaves to sample.
    pub iterations: u32,
}

/// A finished (or failed) build.
#[derive(Debug)]
pub struct BuiltSurface<K> {
    pub key: K,
    pub result: Result<HeightSurface, SurfaceError>,
    /// Build time in microseconds (for profiling).
    pub build_time_us: u64,
}

struct TicketedTask<K> {
    task: SurfaceTask<K>,
    ticket: u64,
    cancelled: Arc<AtomicBool>,
}

struct TicketedResult<K> {
    built: BuiltSurface<K>,
    ticket: u64,
}

/// Worker pool that samples surfaces off the update thread.
pub struct AsyncSurfaceBuilder<K> {
    task_sender: Sender<TicketedTask<K>>,
    result_receiver: Receiver<TicketedResult<K>>,
    /// Current ticket and cancellation flag per key.
    active_tasks: Arc<DashMap<K, (u64, Arc<AtomicBool>)>>,
    in_flight: Arc<AtomicU64>,
    next_ticket: AtomicU64,
}

impl<K> AsyncSurfaceBuilder<K>
where
    K: Copy + Eq + Hash + Send + Sync + 'static,
{
    /// Spawn `thread_count` workers.
    ///
    /// - `max_concurrent`: queued tasks beyond this are rejected by [`submit`](Self::submit).
    /// - `result_capacity`: bounded capacity of the result channel.
    pub fn new(
        field: Arc<ElevationField>,
        thread_count: usize,
        max_concurrent: usize,
        result_capacity: usize,
    ) -> Result<Self, SurfaceError> {
        let (task_sender, task_receiver) = bounded::<TicketedTask<K>>(max_concurrent.max(1));
        let (result_sender, result_receiver) = bounded::<TicketedResult<K>>(result_capacity.max(1));
        let in_flight = Arc::new(AtomicU64::new(0));

        for index in 0..thread_count.max(1) {
            let receiver = task_receiver.clone();
            let sender = result_sender.clone();
            let in_flight = Arc::clone(&in_flight);
            let field = Arc::clone(&field);

            std::thread::Builder::new()
                .name(format!("surface-build-{index}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        if job.cancelled.load(Ordering::Relaxed) {
                            in_flight.fetch_sub(1, Ordering::Relaxed);
                            continue;
                        }

                        let start = Instant::now();
                        let result = build_surface(&field, job.task.grid, job.task.iterations);
                        let elapsed = start.elapsed().as_micros() as u64;

                        if !job.cancelled.load(Ordering::Relaxed) {
                            let _ = sender.send(TicketedResult {
                                built: BuiltSurface {
                                    key: job.task.key,
                                    result,
                                    build_time_us: elapsed,
                                },
                                ticket: job.ticket,
                            });
                        }

                        in_flight.fetch_sub(1, Ordering::Relaxed);
                    }
                })
                .map_err(SurfaceError::WorkerSpawn)?;
        }

        Ok(Self {
            task_sender,
            result_receiver,
            active_tasks: Arc::new(DashMap::new()),
            in_flight,
            next_ticket: AtomicU64::new(0),
        })
    }

    /// Worker count that leaves headroom for the update and render threads.
    pub fn default_thread_count() -> usize {
        let cpus = num_cpus::get().max(2);
        (cpus - 2).max(1)
    }

    /// Queue a build. Returns the task back if the queue is full.
    ///
    /// Submitting a key that is already pending supersedes the earlier task.
    #[allow(clippy::result_large_err)]
    pub fn submit(&self, task: SurfaceTask<K>) -> Result<(), SurfaceTask<K>> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        if let Some((_, (_, previous))) = self.active_tasks.remove(&task.key) {
            previous.store(true, Ordering::Relaxed);
        }
        self.active_tasks
            .insert(task.key, (ticket, Arc::clone(&cancelled)));
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        let job = TicketedTask {
            task,
            ticket,
            cancelled,
        };
        self.task_sender.try_send(job).map_err(|e| {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            let job = e.into_inner();
            self.active_tasks.remove(&job.task.key);
            warn!("surface build queue full, deferring task");
            job.task
        })
    }

    /// Cancel a pending or in-progress build. No-op if it already finished.
    pub fn cancel(&self, key: &K) {
        if let Some((_, (_, cancelled))) = self.active_tasks.remove(key) {
            cancelled.store(true, Ordering::Relaxed);
        }
    }

    /// Drain completed builds. Call once per tick on the update thread.
    pub fn drain_results(&self) -> Vec<BuiltSurface<K>> {
        let mut results = Vec::new();
        while let Ok(done) = self.result_receiver.try_recv() {
            let current = self
                .active_tasks
                .get(&done.built.key)
                .is_some_and(|entry| entry.0 == done.ticket);
            if current {
                self.active_tasks.remove(&done.built.key);
                results.push(done.built);
            }
        }
        results
    }

    /// Tasks queued or executing.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Returns `true` if a build for `key` is pending.
    pub fn is_pending(&self, key: &K) -> bool {
        self.active_tasks.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::elevation::ElevationConfig;

    fn field() -> Arc<ElevationField> {
        Arc::new(ElevationField::new(ElevationConfig::default()).unwrap())
    }

    fn task(key: u32) -> SurfaceTask<u32> {
        SurfaceTask {
            key,
            grid: SurfaceGrid {
                origin_x: key as i64 * 32,
                origin_z: 0,
                stride: 1,
                subdivisions: 32,
                spacing: 2.0,
            },
            iterations: 6,
        }
    }

    fn collect(builder: &AsyncSurfaceBuilder<u32>, expected: usize) -> Vec<BuiltSurface<u32>> {
        let mut results = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(30);
        while results.len() < expected && Instant::now() < deadline {
            results.extend(builder.drain_results());
            if results.len() < expected {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        results
    }

    #[test]
    fn test_all_submitted_surfaces_arrive() {
        let builder = AsyncSurfaceBuilder::new(field(), 4, 32, 64).unwrap();
        let mut submitted = 0;
        for key in 0..16 {
            if builder.submit(task(key)).is_ok() {
                submitted += 1;
            }
        }

        let results = collect(&builder, submitted);
        assert_eq!(results.len(), submitted);
        assert!(results.iter().all(|r| r.result.is_ok()));
    }

    #[test]
    fn test_threaded_result_matches_inline_build() {
        let f = field();
        let builder = AsyncSurfaceBuilder::new(Arc::clone(&f), 2, 8, 8).unwrap();
        builder.submit(task(3)).unwrap();
        let results = collect(&builder, 1);
        let threaded = results[0].result.as_ref().unwrap();
        let inline = build_surface(&f, task(3).grid, 6).unwrap();
        for j in 0..=32 {
            for i in 0..=32 {
                assert_eq!(threaded.sample(i, j).to_bits(), inline.sample(i, j).to_bits());
            }
        }
    }

    #[test]
    fn test_cancelled_task_is_not_delivered() {
        let builder = AsyncSurfaceBuilder::new(field(), 1, 8, 8).unwrap();
        builder.submit(task(9)).unwrap();
        builder.cancel(&9);
        assert!(!builder.is_pending(&9));

        std::thread::sleep(Duration::from_millis(200));
        let results = builder.drain_results();
        assert!(
            results.iter().all(|r| r.key != 9),
            "cancelled build must not be delivered"
        );
    }

    #[test]
    fn test_resubmission_supersedes_previous() {
        let builder = AsyncSurfaceBuilder::new(field(), 2, 8, 8).unwrap();
        builder.submit(task(5)).unwrap();
        builder.submit(task(5)).unwrap();
        let results = collect(&builder, 1);
        std::thread::sleep(Duration::from_millis(100));
        let late = builder.drain_results();
        assert_eq!(results.len() + late.len(), 1, "only the latest submission is delivered");
    }

    #[test]
    fn test_in_flight_count_drains() {
        let builder = AsyncSurfaceBuilder::new(field(), 1, 16, 16).unwrap();
        for key in 0..4 {
            let _ = builder.submit(task(key));
        }
        assert!(builder.in_flight_count() > 0);

        let deadline = Instant::now() + Duration::from_secs(10);
        while builder.in_flight_count() > 0 && Instant::now() < deadline {
            let _ = builder.drain_results();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(builder.in_flight_count(), 0);
    }

    #[test]
    fn test_default_thread_count_is_positive() {
        assert!(AsyncSurfaceBuilder::<u32>::default_thread_count() >= 1);
    }
}
