//! Bounded worker pool for batch fan-out.

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};

/// Fixed-size pool; every batch call joins all of its tasks before returning.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("chronoslot-worker-{i}"))
            .build()
            .map_err(|err| Error::InvalidConfig(format!("worker pool: {err}")))?;
        log::debug!("worker pool started with {threads} threads");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `task` once per item and returns the results in item order.
    ///
    /// A task that panics yields `Error::Worker` for its own item without
    /// disturbing the others. The panic payload is logged, never returned.
    pub fn run<T, R, F>(&self, items: Vec<T>, task: F) -> Vec<Result<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync + Send,
    {
        self.pool.install(|| {
            items
                .into_par_iter()
                .map(|item| {
                    panic::catch_unwind(AssertUnwindSafe(|| task(item))).unwrap_or_else(|payload| {
                        log::error!("worker task panicked: {}", panic_message(&*payload));
                        Err(Error::Worker)
                    })
                })
                .collect()
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string payload"
    }
}
