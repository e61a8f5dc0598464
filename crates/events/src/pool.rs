//! Bounded fire-and-forget task pool.
//!
//! Jobs go into a bounded queue drained by a fixed number of workers. A full
//! queue rejects the job instead of blocking the caller; the rejection and
//! every job failure are logged with the job's correlation id.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 256;

type Job = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

struct Task {
    name: &'static str,
    correlation_id: Uuid,
    job: Job,
}

#[derive(Clone)]
pub struct TaskPool {
    sender: mpsc::Sender<Task>,
}

impl TaskPool {
    /// Spawn `workers` workers on the current runtime. They exit once every
    /// clone of the pool has been dropped and the queue is drained.
    pub fn start(workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Task>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        for worker in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(task) = next else { break };
                    run(worker, task).await;
                }
                tracing::debug!(worker, "Task pool worker exited");
            });
        }
        Self { sender }
    }

    /// Queue a job. Returns its correlation id, or `None` when the queue is
    /// full or closed.
    pub fn submit<F>(&self, name: &'static str, job: F) -> Option<Uuid>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let correlation_id = Uuid::new_v4();
        let task = Task {
            name,
            correlation_id,
            job: Box::pin(job),
        };
        match self.sender.try_send(task) {
            Ok(()) => Some(correlation_id),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(task = name, %correlation_id, "Task pool queue full, dropping job");
                None
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(task = name, %correlation_id, "Task pool closed, dropping job");
                None
            }
        }
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::start(DEFAULT_WORKERS, DEFAULT_CAPACITY)
    }
}

async fn run(worker: usize, task: Task) {
    let Task {
        name,
        correlation_id,
        job,
    } = task;
    match job.await {
        Ok(()) => tracing::debug!(worker, task = name, %correlation_id, "Task finished"),
        Err(e) => tracing::error!(
            worker,
            task = name,
            %correlation_id,
            error = %e,
            "Background task failed"
        ),
    }
}
