//! Job processor: turns a batch into scheduled units and tracks each job.

use super::job::{Job, JobId, JobStatus, ProgressMode, UnitFailure, WorkUnit};
use super::scheduler::Scheduler;
use crate::config::QueueConfig;
use crate::error::{BenchError, Result};
use crate::evaluator::{Evaluate, Evaluation};
use crate::task::EvaluationTask;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Response to a batch submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub job_id: JobId,
    pub total_questions: usize,
}

/// Per-unit policy applied by the processor.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorSettings {
    pub unit_attempts: u32,
    pub failure_threshold: Option<usize>,
    pub progress: ProgressMode,
    /// Finished jobs kept for lookup; older ones are dropped. `None` keeps all.
    pub retain_finished: Option<usize>,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for ProcessorSettings {
    fn from(queue: &QueueConfig) -> Self {
        Self {
            unit_attempts: queue.unit_attempts,
            failure_threshold: queue.failure_threshold,
            progress: queue.progress,
            retain_finished: queue.retain_finished_jobs,
        }
    }
}

struct Shared {
    scheduler: Arc<Scheduler>,
    evaluator: Arc<dyn Evaluate>,
    settings: ProcessorSettings,
    jobs: RwLock<HashMap<JobId, Job>>,
    next_id: AtomicU64,
}

/// Accepts batches and runs them through an evaluator under a scheduler.
#[derive(Clone)]
pub struct JobProcessor {
    shared: Arc<Shared>,
}

impl JobProcessor {
    pub fn new(
        scheduler: Arc<Scheduler>,
        evaluator: Arc<dyn Evaluate>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                scheduler,
                evaluator,
                settings,
                jobs: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.shared.scheduler
    }

    /// Register a job for `tasks` and start dispatching it in the background.
    ///
    /// Returns as soon as the job exists; units run as the scheduler admits them.
    pub async fn submit(&self, tasks: Vec<EvaluationTask>) -> Result<Submission> {
        if tasks.is_empty() {
            return Err(BenchError::EmptyBatch);
        }
        if !self.shared.scheduler.is_running() {
            return Err(BenchError::SchedulerStopped);
        }

        let job_id = JobId::new(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        let total = tasks.len();
        let settings = self.shared.settings;

        self.shared.jobs.write().await.insert(
            job_id,
            Job::new(job_id, total, settings.progress, settings.failure_threshold),
        );

        info!(job_id = %job_id, total, "job submitted");

        let units = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| WorkUnit {
                job_id,
                index,
                total,
                task,
            })
            .collect();

        tokio::spawn(self.shared.clone().dispatch(job_id, units));

        Ok(Submission {
            job_id,
            total_questions: total,
        })
    }

    /// Current status of a job.
    pub async fn status(&self, job_id: JobId) -> Result<JobStatus> {
        self.shared
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(Job::snapshot)
            .ok_or(BenchError::JobNotFound(job_id))
    }

    /// Receiver that sees every status change of a job.
    pub async fn watch(&self, job_id: JobId) -> Result<watch::Receiver<JobStatus>> {
        self.shared
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(Job::subscribe)
            .ok_or(BenchError::JobNotFound(job_id))
    }

    /// Wait until a job reaches `completed` or `failed`.
    pub async fn wait(&self, job_id: JobId) -> Result<JobStatus> {
        let mut updates = self.watch(job_id).await?;
        loop {
            let current = updates.borrow_and_update().clone();
            if current.status.is_terminal() {
                return Ok(current);
            }
            if updates.changed().await.is_err() {
                // Jobs are only dropped once finished, so the last value is final.
                return Ok(updates.borrow().clone());
            }
        }
    }

    /// Snapshots of every known job, oldest first.
    pub async fn jobs(&self) -> Vec<JobStatus> {
        let mut all: Vec<JobStatus> = self
            .shared
            .jobs
            .read()
            .await
            .values()
            .map(Job::snapshot)
            .collect();
        all.sort_by_key(|status| status.id);
        all
    }

    /// Drop a finished job. A job that is still running is kept and `None` returned.
    pub async fn forget(&self, job_id: JobId) -> Result<Option<JobStatus>> {
        let mut jobs = self.shared.jobs.write().await;
        let status = jobs
            .get(&job_id)
            .map(Job::snapshot)
            .ok_or(BenchError::JobNotFound(job_id))?;

        if !status.status.is_terminal() {
            return Ok(None);
        }
        jobs.remove(&job_id);
        debug!(job_id = %job_id, "job forgotten");
        Ok(Some(status))
    }

    /// Units of a job that could not be evaluated.
    pub async fn failures(&self, job_id: JobId) -> Result<Vec<UnitFailure>> {
        self.shared
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(|job| job.failures().to_vec())
            .ok_or(BenchError::JobNotFound(job_id))
    }
}

impl Shared {
    /// Admit units in index order; each admitted unit runs on its own task.
    async fn dispatch(self: Arc<Self>, job_id: JobId, units: Vec<WorkUnit>) {
        let mut running = JoinSet::new();
        let mut dispatched = 0;

        for unit in units {
            let admission = match self.scheduler.admit().await {
                Ok(admission) => admission,
                Err(e) => {
                    warn!(job_id = %job_id, dispatched, error = %e, "stopping dispatch");
                    self.update(job_id, |job| job.abort(dispatched)).await;
                    break;
                }
            };

            if dispatched == 0 {
                self.update(job_id, Job::mark_active).await;
            }
            dispatched += 1;

            let shared = self.clone();
            running.spawn(async move {
                let _admission = admission;
                let index = unit.index;
                let failure = shared.run_unit(&unit).await.err().map(|e| e.to_string());
                shared.update(job_id, |job| job.settle(index, failure)).await;
            });
        }

        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                error!(job_id = %job_id, error = %e, "unit task aborted");
            }
        }

        if let Ok(status) = self.snapshot(job_id).await {
            info!(
                job_id = %job_id,
                status = %status.status,
                completed = status.completed,
                failed = status.failed,
                "job finished"
            );
        }

        if let Some(keep) = self.settings.retain_finished {
            self.prune_finished(keep).await;
        }
    }

    /// Keep only the `keep` most recent finished jobs.
    async fn prune_finished(&self, keep: usize) {
        let mut jobs = self.jobs.write().await;
        let mut finished: Vec<JobId> = jobs
            .values()
            .map(Job::snapshot)
            .filter(|status| status.status.is_terminal())
            .map(|status| status.id)
            .collect();

        if finished.len() <= keep {
            return;
        }
        finished.sort();
        let excess = finished.len() - keep;
        for id in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }
        debug!(removed = excess, "pruned finished jobs");
    }

    async fn run_unit(&self, unit: &WorkUnit) -> Result<Evaluation> {
        let attempts = self.settings.unit_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let outcome = AssertUnwindSafe(self.evaluator.evaluate(&unit.task))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(evaluation)) => {
                    debug!(job_id = %unit.job_id, index = unit.index, total = unit.total, "unit done");
                    return Ok(evaluation);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = "evaluation panicked".to_string(),
            }

            warn!(
                job_id = %unit.job_id,
                index = unit.index,
                attempt,
                attempts,
                error = %last_error,
                "unit failed"
            );
        }

        Err(BenchError::UnitFailed {
            index: unit.index,
            message: last_error,
        })
    }

    async fn update(&self, job_id: JobId, change: impl FnOnce(&mut Job)) {
        if let Some(job) = self.jobs.write().await.get_mut(&job_id) {
            change(job);
        }
    }

    async fn snapshot(&self, job_id: JobId) -> Result<JobStatus> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(Job::snapshot)
            .ok_or(BenchError::JobNotFound(job_id))
    }
}
