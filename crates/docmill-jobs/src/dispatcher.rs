//! Job dispatcher and worker pool for processing extraction jobs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use docmill_core::defaults;
use docmill_core::{file_extension, Error, JobMetrics, JobRepository, Result};
use docmill_db::Database;

use crate::materializer::ResultMaterializer;
use crate::registry::ExtractorRegistry;

/// Configuration for the job dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of concurrently executing extraction jobs.
    pub max_concurrent_jobs: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
        }
    }
}

impl DispatcherConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent extraction jobs |
    pub fn from_env() -> Self {
        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        Self {
            max_concurrent_jobs,
        }
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }
}

/// Event emitted by the dispatcher.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job was picked up by a worker slot.
    JobStarted { job_id: Uuid },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid },
    /// A job failed.
    JobFailed { job_id: Uuid, error: String },
    /// Dispatcher started.
    DispatcherStarted,
    /// Dispatcher stopped.
    DispatcherStopped,
}

/// One unit of queued extraction work.
struct ExtractionTask {
    job_id: Uuid,
    input_file: PathBuf,
}

/// Handle for submitting work to and controlling a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    queue_tx: mpsc::UnboundedSender<ExtractionTask>,
    shutdown_tx: mpsc::Sender<()>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl DispatcherHandle {
    /// Enqueue extraction work for an already-created PENDING job.
    ///
    /// Submission is synchronous and fast: the work queues if all slots are
    /// busy instead of being rejected, and the extraction itself runs
    /// asynchronously.
    pub fn submit(&self, job_id: Uuid, input_file: impl Into<PathBuf>) -> Result<()> {
        self.queue_tx
            .send(ExtractionTask {
                job_id,
                input_file: input_file.into(),
            })
            .map_err(|_| Error::Job("dispatcher is not running".into()))
    }

    /// Signal the dispatcher to shut down, draining in-flight work.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Job("dispatcher is not running".into()))
    }

    /// Get a receiver for dispatcher events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }
}

/// Dispatcher owning the bounded worker pool.
///
/// Constructed once at startup; [`start`](JobDispatcher::start) moves it
/// onto the runtime and returns a [`DispatcherHandle`] for submission and
/// shutdown.
pub struct JobDispatcher {
    db: Database,
    registry: Arc<ExtractorRegistry>,
    materializer: Arc<ResultMaterializer>,
    config: DispatcherConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobDispatcher {
    /// Create a new dispatcher.
    pub fn new(
        db: Database,
        registry: Arc<ExtractorRegistry>,
        materializer: Arc<ResultMaterializer>,
        config: DispatcherConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            db,
            registry,
            materializer,
            config,
            event_tx,
        }
    }

    /// Get a receiver for dispatcher events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the dispatcher and return a handle for control.
    pub fn start(self) -> DispatcherHandle {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            self.run(queue_rx, shutdown_rx).await;
        });

        DispatcherHandle {
            queue_tx,
            shutdown_tx,
            event_tx,
        }
    }

    /// Run the dispatcher loop.
    ///
    /// A semaphore bounds concurrency to `max_concurrent_jobs` slots; when
    /// every slot is busy, intake pauses and submissions accumulate in the
    /// queue (backpressure via queuing, not shedding).
    #[instrument(skip(self, queue_rx, shutdown_rx))]
    async fn run(
        &self,
        mut queue_rx: mpsc::UnboundedReceiver<ExtractionTask>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!(
            max_concurrent = self.config.max_concurrent_jobs,
            "Job dispatcher started"
        );
        let _ = self.event_tx.send(WorkerEvent::DispatcherStarted);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs));
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Job dispatcher received shutdown signal");
                    break;
                }
                task = queue_rx.recv() => {
                    let Some(task) = task else { break };

                    // Reap finished slots without blocking intake.
                    while let Some(result) = tasks.try_join_next() {
                        if let Err(e) = result {
                            error!(error = ?e, "Job task panicked");
                        }
                    }

                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let worker = self.worker_refs();
                    tasks.spawn(async move {
                        let _permit = permit;
                        worker.execute(task).await;
                    });
                }
            }
        }

        // Stop intake and drain in-flight work before reporting stopped.
        queue_rx.close();
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = ?e, "Job task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::DispatcherStopped);
        info!("Job dispatcher stopped");
    }

    /// Clone references needed for a spawned worker task.
    fn worker_refs(&self) -> JobWorkerRef {
        JobWorkerRef {
            db: self.db.clone(),
            registry: self.registry.clone(),
            materializer: self.materializer.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

/// Outcome of one job execution, mapped at a single boundary.
enum JobOutcome {
    Success {
        metrics: JobMetrics,
        output_dir: String,
    },
    Failed(String),
    /// The store rejected the pickup; the record is left for cleanup's
    /// abandoned-job reclamation.
    Abandoned,
}

/// Lightweight reference bundle for executing a single job in a spawned task.
struct JobWorkerRef {
    db: Database,
    registry: Arc<ExtractorRegistry>,
    materializer: Arc<ResultMaterializer>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorkerRef {
    /// Execute a single queued job.
    async fn execute(self, task: ExtractionTask) {
        let start = Instant::now();
        let job_id = task.job_id;

        info!(%job_id, input = %task.input_file.display(), "Processing job");
        let _ = self.event_tx.send(WorkerEvent::JobStarted { job_id });

        let outcome = self.run_extraction(&task).await;

        match outcome {
            JobOutcome::Success {
                metrics,
                output_dir,
            } => {
                if let Err(e) = self.db.jobs.complete(job_id, metrics, &output_dir).await {
                    error!(error = ?e, %job_id, "Failed to mark job as completed");
                } else {
                    info!(
                        %job_id,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job completed successfully"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobCompleted { job_id });
                }
            }
            JobOutcome::Failed(error) => {
                if let Err(e) = self.db.jobs.fail(job_id, &error).await {
                    error!(error = ?e, %job_id, "Failed to mark job as failed");
                } else {
                    warn!(
                        %job_id,
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobFailed { job_id, error });
                }
            }
            JobOutcome::Abandoned => {}
        }

        // The job record, not the upload, is the durable artifact from here
        // on: the input file goes regardless of outcome.
        if let Err(e) = tokio::fs::remove_file(&task.input_file).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    %job_id,
                    input = %task.input_file.display(),
                    error = %e,
                    "Failed to remove uploaded input file"
                );
            }
        }
    }

    /// Run the extraction pipeline, mapping every fault into a [`JobOutcome`].
    ///
    /// Nothing raised below this boundary reaches the pool loop.
    async fn run_extraction(&self, task: &ExtractionTask) -> JobOutcome {
        let job_id = task.job_id;

        if let Err(e) = self.db.jobs.transition_to_processing(job_id).await {
            error!(error = ?e, %job_id, "Failed to transition job to processing");
            return JobOutcome::Abandoned;
        }

        let Some(extractor) = self.registry.resolve(&task.input_file) else {
            let ext = file_extension(&task.input_file)
                .unwrap_or_else(|| "<no extension>".to_string());
            return JobOutcome::Failed(Error::UnsupportedType(ext).to_string());
        };

        let output_dir = self.materializer.job_dir(job_id);
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            return JobOutcome::Failed(format!("failed to create output directory: {e}"));
        }

        // Spawn so a panicking capability surfaces as a JoinError here
        // instead of tearing down the worker slot.
        let input = task.input_file.clone();
        let extract_dir = output_dir.clone();
        let capability = extractor.clone();
        let extraction = match tokio::spawn(
            async move { capability.extract(&input, &extract_dir).await },
        )
        .await
        {
            Ok(Ok(extraction)) => extraction,
            Ok(Err(e)) => return JobOutcome::Failed(e.to_string()),
            Err(e) => return JobOutcome::Failed(format!("extractor panicked: {e}")),
        };

        let filename = match self.db.jobs.get(job_id).await {
            Ok(Some(job)) => job.filename,
            _ => task
                .input_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        match self
            .materializer
            .persist(job_id, &filename, extractor.name(), &extraction)
            .await
        {
            Ok(output) => JobOutcome::Success {
                metrics: JobMetrics {
                    text_length: output.text_length,
                    images_count: output.images_count,
                    extractor_used: extractor.name().to_string(),
                },
                output_dir: output.output_dir.to_string_lossy().into_owned(),
            },
            Err(e) => JobOutcome::Failed(format!("failed to write outputs: {e}")),
        }
    }
}
