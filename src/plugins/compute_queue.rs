//! Background job queue drained on the main thread.
//!
//! Jobs run on bevy's `AsyncComputeTaskPool` (a bounded pool). Each finished job pushes
//! `(key, result)` into a mutex-guarded queue, so delivery order is completion order.
//! `drain` hands results to the caller on the calling thread.
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use bevy::tasks::{AsyncComputeTaskPool, Task, TaskPool};
use futures_lite::future::block_on;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job panicked: {0}")]
    Panicked(String),
}

pub type JobResult<T> = Result<T, JobError>;

type ResultQueue<K, T> = Arc<Mutex<VecDeque<(K, JobResult<T>)>>>;

pub struct ComputeQueue<K, T> {
    results: ResultQueue<K, T>,
    pending: HashSet<K>,
    tasks: Vec<Task<()>>,
}

impl<K, T> Default for ComputeQueue<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> ComputeQueue<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(VecDeque::new())),
            pending: HashSet::new(),
            tasks: Vec::new(),
        }
    }

    /// Run `produce` off-thread. Returns `false` (and does nothing) if `key` is already in flight.
    pub fn submit<F>(&mut self, key: K, produce: F) -> bool
    where
        F: FnOnce() -> T + Send + 'static,
    {
        if !self.pending.insert(key.clone()) {
            return false;
        }
        let results = Arc::clone(&self.results);
        let pool = AsyncComputeTaskPool::get_or_init(TaskPool::default);
        let task = pool.spawn(async move {
            let result = panic::catch_unwind(AssertUnwindSafe(produce))
                .map_err(|payload| JobError::Panicked(panic_message(payload.as_ref())));
            results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back((key, result));
        });
        self.tasks.push(task);
        true
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    /// Submitted jobs whose results have not been drained yet.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Results waiting for the next drain.
    pub fn ready(&self) -> usize {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Deliver every completed result in arrival order. Returns how many were delivered.
    pub fn drain(&mut self, mut on_result: impl FnMut(K, JobResult<T>)) -> usize {
        let completed = {
            let mut queue = self.results.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *queue)
        };
        self.tasks.retain(|t| !t.is_finished());
        let count = completed.len();
        for (key, result) in completed {
            self.pending.remove(&key);
            on_result(key, result);
        }
        count
    }

    /// Block until every submitted job has pushed its result. Does not drain.
    pub fn wait_idle(&mut self) {
        for task in self.tasks.drain(..) {
            block_on(task);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
