// Query task execution and the serialized publish context

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A unit of work run on the publish context
type PublishJob = Box<dyn FnOnce() + Send>;

/// Runs named blocking query tasks on the runtime's blocking pool
#[derive(Clone)]
pub struct QueryExecutor {
    runtime: Handle,
    in_flight: Arc<AtomicUsize>,
}

impl QueryExecutor {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `job` on a blocking worker, inside a span named after the task
    pub fn execute<F>(&self, name: String, job: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(self.in_flight.clone());

        self.runtime.spawn_blocking(move || {
            let _guard = guard;
            let _span = tracing::debug_span!("query_task", task = %name).entered();
            tracing::trace!("Task started");
            job();
        })
    }

    /// Number of tasks started but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight count when a task ends, even by panic
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Single worker that applies published mutations one at a time, in order
pub struct Publisher {
    job_tx: mpsc::UnboundedSender<PublishJob>,
    worker_handle: Option<JoinHandle<()>>,
}

impl Publisher {
    /// Spawn the publish worker on `runtime`
    pub fn new(runtime: &Handle) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let worker_handle = Some(runtime.spawn(publish_worker(job_rx)));

        Self {
            job_tx,
            worker_handle,
        }
    }

    /// Handle for posting jobs from query tasks
    pub fn handle(&self) -> PublishHandle {
        PublishHandle {
            job_tx: self.job_tx.clone(),
        }
    }

    /// Stop accepting jobs from this publisher and wait for queued ones to run
    ///
    /// Outstanding [`PublishHandle`]s keep the worker alive until dropped.
    pub async fn shutdown(mut self) {
        drop(self.job_tx);

        if let Some(handle) = self.worker_handle.take() {
            tracing::debug!("Waiting for publisher to drain...");
            let _ = handle.await;
            tracing::debug!("Publisher drained");
        }
    }
}

/// Cloneable sender side of the publish context
#[derive(Clone)]
pub struct PublishHandle {
    job_tx: mpsc::UnboundedSender<PublishJob>,
}

impl PublishHandle {
    /// Queue `job` on the publish context
    ///
    /// If the worker is gone the job runs inline so completions are never lost.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(mpsc::error::SendError(job)) = self.job_tx.send(Box::new(job)) {
            tracing::debug!("Publisher stopped, running job inline");
            job();
        }
    }
}

async fn publish_worker(mut job_rx: mpsc::UnboundedReceiver<PublishJob>) {
    let mut stats = PublisherStats::default();

    while let Some(job) = job_rx.recv().await {
        job();
        stats.published += 1;
    }

    tracing::debug!("Publisher finished: {} jobs published", stats.published);
}

/// Statistics for the publish worker
#[derive(Default)]
struct PublisherStats {
    published: u64,
}
