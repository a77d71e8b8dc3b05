//! Decode worker pool.
//!
//! Workers block on the shared [`DecodeQueue`] and hand each job to the
//! executor. The executor owns the cancellation checks; workers only loop
//! until the queue is closed and drained.

use crate::priority::{DecodeJob, DecodeQueue, Pop};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Callback invoked on a worker thread for every dequeued job.
///
/// Jobs whose token is already cancelled are still passed in so the
/// executor can release the tile claim and finish the batch.
pub type JobExecutor = Arc<dyn Fn(DecodeJob) + Send + Sync>;

/// Configuration for the decode pool.
#[derive(Debug, Clone)]
pub struct DecodePoolConfig {
    /// Number of decode threads (at least one is always spawned).
    /// Default: number of logical CPU cores.
    pub num_workers: usize,

    /// How long an idle worker waits before re-checking the queue.
    /// Default: 100ms.
    pub poll_interval: Duration,
}

impl Default for DecodePoolConfig {
    fn default() -> Self {
        Self { num_workers: num_cpus(), poll_interval: Duration::from_millis(100) }
    }
}

impl DecodePoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self { num_workers, ..Self::default() }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Fixed set of decode threads sharing one queue.
pub struct DecodePool {
    workers: Vec<Worker>,
    queue: Arc<DecodeQueue>,
}

impl DecodePool {
    /// Spawn the workers. If any spawn fails the already running workers are
    /// stopped before the error is returned.
    pub fn new(
        queue: Arc<DecodeQueue>,
        executor: JobExecutor,
        config: DecodePoolConfig,
    ) -> io::Result<Self> {
        let count = config.num_workers.max(1);
        let mut pool = Self { workers: Vec::with_capacity(count), queue };

        for id in 0..count {
            match Worker::spawn(id, Arc::clone(&pool.queue), Arc::clone(&executor), config.poll_interval)
            {
                Ok(worker) => pool.workers.push(worker),
                Err(err) => {
                    pool.shutdown();
                    return Err(err);
                }
            }
        }

        tracing::debug!(workers = count, "decode pool started");
        Ok(pool)
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.queue.is_closed()
    }

    /// Close the queue and join every worker.
    ///
    /// Jobs still queued are handed to the executor before workers exit, so
    /// callers should cancel outstanding work first.
    pub fn shutdown(mut self) {
        self.queue.close();
        for worker in self.workers.drain(..) {
            worker.join();
        }
        tracing::debug!("decode pool stopped");
    }
}

impl Drop for DecodePool {
    fn drop(&mut self) {
        self.queue.close();
        for worker in self.workers.drain(..) {
            worker.join();
        }
    }
}

struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(
        id: usize,
        queue: Arc<DecodeQueue>,
        executor: JobExecutor,
        poll_interval: Duration,
    ) -> io::Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("tessera-decode-{id}"))
            .spawn(move || Self::run(&queue, &executor, poll_interval))?;

        Ok(Self { id, thread: Some(thread) })
    }

    fn run(queue: &DecodeQueue, executor: &JobExecutor, poll_interval: Duration) {
        loop {
            match queue.pop_timeout(poll_interval) {
                Pop::Job(job) => executor(*job),
                Pop::Empty => continue,
                Pop::Closed => break,
            }
        }
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(worker = self.id, "decode worker panicked");
            }
        }
    }
}

fn num_cpus() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::LoadBatch;
    use crate::cancel::CancellationToken;
    use crate::priority::DecodePriority;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tessera_render::{Tile, TileId};
    use tessera_viewer_core::Rect;

    fn push_jobs(queue: &DecodeQueue, batch: &Arc<LoadBatch>, count: u32) {
        for i in 0..count {
            let tile = Arc::new(Tile::new(TileId::new(1, i, 0), Rect::new(0, 0, 1, 1), true));
            let ticket = tile.begin_loading().unwrap();
            let job = DecodeJob::new(
                u64::from(i),
                DecodePriority::Detail,
                tile,
                ticket,
                i as usize + 1,
                Arc::clone(batch),
                CancellationToken::new(),
            );
            queue.push(job).unwrap();
        }
    }

    #[test]
    fn test_decode_pool_config_default() {
        let config = DecodePoolConfig::default();
        assert!(config.num_workers > 0);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_decode_pool_config_builder() {
        let config = DecodePoolConfig::new(3).with_poll_interval(Duration::from_millis(10));
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_zero_workers_still_spawns_one() {
        let queue = Arc::new(DecodeQueue::new());
        let executor: JobExecutor = Arc::new(|_job| {});
        let pool = DecodePool::new(queue, executor, DecodePoolConfig::new(0)).unwrap();
        assert_eq!(pool.num_workers(), 1);
        pool.shutdown();
    }

    #[test]
    fn test_pool_executes_every_job() {
        let queue = Arc::new(DecodeQueue::new());
        let executed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&executed);
        let executor: JobExecutor = Arc::new(move |job: DecodeJob| {
            counter.fetch_add(1, Ordering::SeqCst);
            job.batch.finish_one();
        });

        let pool = DecodePool::new(
            Arc::clone(&queue),
            executor,
            DecodePoolConfig::new(2).with_poll_interval(Duration::from_millis(5)),
        )
        .unwrap();

        let batch = LoadBatch::new(5, None);
        push_jobs(&queue, &batch, 5);
        assert!(batch.wait_timeout(Duration::from_secs(5)));

        pool.shutdown();
        assert_eq!(executed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_shutdown_drains_queued_jobs() {
        let queue = Arc::new(DecodeQueue::new());
        let batch = LoadBatch::new(3, None);
        push_jobs(&queue, &batch, 3);

        let executor: JobExecutor = Arc::new(|job: DecodeJob| {
            job.batch.finish_one();
        });
        let pool = DecodePool::new(Arc::clone(&queue), executor, DecodePoolConfig::new(1)).unwrap();
        pool.shutdown();

        assert!(batch.is_finished());
        assert!(queue.is_empty());
    }
}
