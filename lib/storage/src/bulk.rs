//! Buffered bulk writer.
//!
//! Ops are appended to an in-memory batch; once `bulk_actions` ops have
//! accumulated the batch is handed to a background worker that ships it to the
//! catalog. At most `concurrent_requests` full batches are queued or in flight
//! at once; [`BulkProcessor::add`] blocks past that. [`BulkProcessor::flush`]
//! blocks until every queued batch has been acknowledged, which is the only
//! synchronization the pipeline relies on.
//!
//! A failed batch is logged and counted, then dropped: later batches still go
//! out. Callers needing exactly-once persistence must inspect [`BulkStats`].

use featsim_core::{Error, Result};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};
use crate::gateway::{BulkOp, CatalogGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Ops per batch
    pub bulk_actions: usize,
    /// Number of worker threads shipping batches
    pub concurrent_requests: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            bulk_actions: 1000,
            concurrent_requests: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkStats {
    pub submitted: u64,
    pub written: u64,
    pub item_failures: u64,
    pub failed_batches: u64,
}

struct Queue {
    current: Vec<BulkOp>,
    batches: VecDeque<Vec<BulkOp>>,
    in_flight: usize,
    running: bool,
}

struct Shared {
    gateway: Arc<dyn CatalogGateway>,
    bulk_actions: usize,
    max_pending: usize,
    queue: Mutex<Queue>,
    work: Condvar,
    idle: Condvar,
    space: Condvar,
    submitted: AtomicU64,
    written: AtomicU64,
    item_failures: AtomicU64,
    failed_batches: AtomicU64,
}

impl Shared {
    fn execute(&self, batch: &[BulkOp]) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.gateway.bulk_write(batch)));
        match outcome {
            Ok(Ok(response)) => {
                self.written.fetch_add(response.written as u64, Ordering::Relaxed);
                if !response.failures.is_empty() {
                    self.item_failures
                        .fetch_add(response.failures.len() as u64, Ordering::Relaxed);
                    for failure in &response.failures {
                        warn!(
                            position = failure.position,
                            id = failure.id.as_deref().unwrap_or("-"),
                            reason = %failure.reason,
                            "bulk item rejected"
                        );
                    }
                }
                debug!(batch_size = batch.len(), written = response.written, "bulk batch acknowledged");
            }
            Ok(Err(e)) => {
                self.failed_batches.fetch_add(1, Ordering::Relaxed);
                error!(batch_size = batch.len(), error = %e, "bulk batch failed");
            }
            Err(_) => {
                self.failed_batches.fetch_add(1, Ordering::Relaxed);
                error!(batch_size = batch.len(), "bulk batch panicked");
            }
        }
    }

    fn stats(&self) -> BulkStats {
        BulkStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            item_failures: self.item_failures.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let batch = {
            let mut queue = shared.queue.lock();
            while queue.batches.is_empty() && queue.running {
                shared.work.wait(&mut queue);
            }
            match queue.batches.pop_front() {
                Some(batch) => {
                    queue.in_flight += 1;
                    batch
                }
                // stopped and drained
                None => break,
            }
        };

        shared.execute(&batch);

        let mut queue = shared.queue.lock();
        queue.in_flight -= 1;
        shared.space.notify_one();
        if queue.batches.is_empty() && queue.in_flight == 0 {
            shared.idle.notify_all();
        }
    }
}

pub struct BulkProcessor {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl BulkProcessor {
    pub fn new(gateway: Arc<dyn CatalogGateway>, config: BulkConfig) -> Result<Self> {
        if config.bulk_actions == 0 || config.concurrent_requests == 0 {
            return Err(Error::Configuration(format!(
                "bulk_actions and concurrent_requests must be positive, got {:?}",
                config
            )));
        }

        let shared = Arc::new(Shared {
            gateway,
            bulk_actions: config.bulk_actions,
            max_pending: config.concurrent_requests,
            queue: Mutex::new(Queue {
                current: Vec::with_capacity(config.bulk_actions),
                batches: VecDeque::new(),
                in_flight: 0,
                running: true,
            }),
            work: Condvar::new(),
            idle: Condvar::new(),
            space: Condvar::new(),
            submitted: AtomicU64::new(0),
            written: AtomicU64::new(0),
            item_failures: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
        });

        let mut processor = Self {
            shared,
            workers: Vec::with_capacity(config.concurrent_requests),
        };
        for worker_id in 0..config.concurrent_requests {
            let shared = processor.shared.clone();
            let handle = thread::Builder::new()
                .name(format!("bulk-worker-{}", worker_id))
                .spawn(move || worker_loop(shared))?;
            processor.workers.push(handle);
        }

        Ok(processor)
    }

    /// Buffer one op; ships the current batch once it is full, waiting while
    /// every worker slot is already taken.
    pub fn add(&self, op: BulkOp) {
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        let mut queue = self.shared.queue.lock();
        queue.current.push(op);
        if queue.current.len() >= self.shared.bulk_actions {
            let batch = std::mem::take(&mut queue.current);
            while queue.batches.len() + queue.in_flight >= self.shared.max_pending {
                self.shared.space.wait(&mut queue);
            }
            queue.batches.push_back(batch);
            self.shared.work.notify_one();
        }
    }

    /// Ship any partial batch and block until all batches are acknowledged.
    pub fn flush(&self) -> BulkStats {
        let mut queue = self.shared.queue.lock();
        if !queue.current.is_empty() {
            let batch = std::mem::take(&mut queue.current);
            queue.batches.push_back(batch);
            self.shared.work.notify_one();
        }
        while !queue.batches.is_empty() || queue.in_flight > 0 {
            self.shared.idle.wait(&mut queue);
        }
        drop(queue);
        self.stats()
    }

    pub fn stats(&self) -> BulkStats {
        self.shared.stats()
    }

    /// Flush, stop the workers and return the final counts.
    pub fn close(mut self) -> BulkStats {
        let stats = self.flush();
        self.shutdown();
        stats
    }

    fn shutdown(&mut self) {
        self.shared.queue.lock().running = false;
        self.shared.work.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("bulk worker thread panicked");
            }
        }
    }
}

impl Drop for BulkProcessor {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.flush();
            self.shutdown();
        }
    }
}
