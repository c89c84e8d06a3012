//! Bounded task queue and worker pool.
//!
//! Submissions land on a bounded channel; `dispatch` applies backpressure
//! by waiting for queue space instead of growing without bound. A fixed
//! pool of workers drains the channel, and each execution is processed by
//! exactly one worker at a time. Dropping the [`TaskQueue`] closes the
//! channel; workers finish what is queued and stop.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use common::ExecutionId;

use crate::engine::ExecutionRunner;
use crate::error::{OrchestratorError, Result};

/// Handle for enqueuing executions onto the worker pool.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<ExecutionId>,
}

impl TaskQueue {
    /// Enqueues an execution for a worker to pick up.
    ///
    /// Waits for queue space when the pool is saturated; fails only if
    /// the pool has shut down.
    pub async fn dispatch(&self, id: ExecutionId) -> Result<()> {
        self.tx
            .send(id)
            .await
            .map_err(|_| OrchestratorError::QueueClosed)
    }
}

/// A fixed set of worker tasks draining the queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `worker_count` workers over a queue of `queue_capacity`.
    ///
    /// Returns the submission handle and the pool. The pool stops once
    /// every clone of the [`TaskQueue`] is dropped and the queue drains.
    pub fn start<R>(runner: Arc<R>, worker_count: usize, queue_capacity: usize) -> (TaskQueue, Self)
    where
        R: ExecutionRunner + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..worker_count.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let runner = Arc::clone(&runner);
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only while receiving, so one slow
                        // execution never blocks the other workers.
                        let next = { rx.lock().await.recv().await };
                        match next {
                            Some(id) => {
                                tracing::debug!(worker, execution_id = %id, "worker picked up execution");
                                if let Err(error) = runner.run(id).await {
                                    tracing::error!(worker, execution_id = %id, %error, "execution run failed");
                                }
                            }
                            None => break,
                        }
                    }
                    tracing::debug!(worker, "worker drained and stopped");
                })
            })
            .collect();

        (TaskQueue { tx }, Self { handles })
    }

    /// Returns the number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every worker to drain and stop.
    ///
    /// Call after dropping all [`TaskQueue`] handles.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
