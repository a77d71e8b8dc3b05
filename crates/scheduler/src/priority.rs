//! Priority queue feeding the decode pool.
//!
//! Base-layer tiles are decoded before detail tiles; within a priority jobs
//! run in submission order. Completion order is still up to the decoder.

use crate::batch::LoadBatch;
use crate::cancel::{CancellationToken, JobId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tessera_render::{LoadTicket, Tile};

/// Decode priority levels (higher value = decoded first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecodePriority {
    /// Tiles finer than the base layer
    Detail = 0,

    /// The always-visible fallback layer
    BaseLayer = 1,
}

/// A claimed tile waiting for (or undergoing) decode
#[derive(Debug, Clone)]
pub struct DecodeJob {
    pub id: JobId,
    pub priority: DecodePriority,
    pub tile: Arc<Tile>,
    /// Claim obtained from the tile's Unloaded -> Loading transition
    pub ticket: LoadTicket,
    /// 1-based position within its batch
    pub index: usize,
    pub batch: Arc<LoadBatch>,
    pub token: CancellationToken,
    insertion_order: u64,
}

impl DecodeJob {
    pub fn new(
        id: JobId,
        priority: DecodePriority,
        tile: Arc<Tile>,
        ticket: LoadTicket,
        index: usize,
        batch: Arc<LoadBatch>,
        token: CancellationToken,
    ) -> Self {
        Self { id, priority, tile, ticket, index, batch, token, insertion_order: 0 }
    }
}

impl PartialEq for DecodeJob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DecodeJob {}

impl PartialOrd for DecodeJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DecodeJob {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap, so earlier insertions compare greater
            Ordering::Equal => other.insertion_order.cmp(&self.insertion_order),
            other => other,
        }
    }
}

/// Result of waiting on the queue
#[derive(Debug)]
pub enum Pop {
    Job(Box<DecodeJob>),
    Empty,
    /// The queue was closed and fully drained
    Closed,
}

struct QueueState {
    heap: BinaryHeap<DecodeJob>,
    insertion_counter: u64,
    closed: bool,
}

/// Blocking priority queue shared by the scheduler and its workers
pub struct DecodeQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl DecodeQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                insertion_counter: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a job. Hands the job back if the queue is closed.
    pub fn push(&self, mut job: DecodeJob) -> Result<(), Box<DecodeJob>> {
        let mut state = self.state();
        if state.closed {
            return Err(Box::new(job));
        }

        job.insertion_order = state.insertion_counter;
        state.insertion_counter += 1;
        state.heap.push(job);
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Wait up to `timeout` for the highest-priority job
    ///
    /// After [`close`](Self::close) remaining jobs are still handed out so
    /// their batches can finish; `Closed` is returned once none are left.
    pub fn pop_timeout(&self, timeout: Duration) -> Pop {
        let mut state = self.state();

        if state.heap.is_empty() && !state.closed {
            state = self
                .available
                .wait_timeout(state, timeout)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }

        match state.heap.pop() {
            Some(job) => Pop::Job(Box::new(job)),
            None if state.closed => Pop::Closed,
            None => Pop::Empty,
        }
    }

    /// Stop accepting jobs and wake every waiting worker
    pub fn close(&self) {
        self.state().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn len(&self) -> usize {
        self.state().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().heap.is_empty()
    }
}

impl Default for DecodeQueue {
    fn default() -> Self {
        Self::new()
    }
}
