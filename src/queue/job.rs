//! Jobs: one batch submission and its aggregate progress.

use crate::task::EvaluationTask;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;

/// Identifier of a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(JobId)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a job's progress percentage is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressMode {
    /// `round(index / total * 100)` of the most advanced settled unit.
    ///
    /// Indices are 0-based, so this tracks dispatch position rather than
    /// completed work and stays below 100 for multi-task jobs.
    #[default]
    DispatchIndex,
    /// `round(settled / total * 100)`.
    Completion,
}

fn percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    /// 0 to 100.
    pub progress: u8,
    pub status: JobState,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

/// One queued unit of work.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub job_id: JobId,
    /// 0-based position in the submitted batch.
    pub index: usize,
    pub total: usize,
    pub task: EvaluationTask,
}

/// A unit that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub index: usize,
    pub message: String,
}

/// Mutable bookkeeping for a job, owned by the processor.
pub(crate) struct Job {
    id: JobId,
    total: usize,
    state: JobState,
    progress: u8,
    completed: usize,
    failures: Vec<UnitFailure>,
    /// Units that will ever run; lowered when admission stops early.
    expected: usize,
    mode: ProgressMode,
    failure_threshold: Option<usize>,
    updates: watch::Sender<JobStatus>,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        total: usize,
        mode: ProgressMode,
        failure_threshold: Option<usize>,
    ) -> Self {
        let initial = JobStatus {
            id,
            progress: 0,
            status: JobState::Waiting,
            total,
            completed: 0,
            failed: 0,
        };
        let (updates, _) = watch::channel(initial);

        Self {
            id,
            total,
            state: JobState::Waiting,
            progress: 0,
            completed: 0,
            failures: Vec::new(),
            expected: total,
            mode,
            failure_threshold,
            updates,
        }
    }

    pub(crate) fn snapshot(&self) -> JobStatus {
        JobStatus {
            id: self.id,
            progress: self.progress,
            status: self.state,
            total: self.total,
            completed: self.completed,
            failed: self.failures.len(),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.updates.subscribe()
    }

    pub(crate) fn failures(&self) -> &[UnitFailure] {
        &self.failures
    }

    fn settled(&self) -> usize {
        self.completed + self.failures.len()
    }

    fn broadcast(&self) {
        self.updates.send_replace(self.snapshot());
    }

    pub(crate) fn mark_active(&mut self) {
        if self.state == JobState::Waiting {
            self.state = JobState::Active;
            self.broadcast();
        }
    }

    /// Record that the unit at `index` finished, successfully or not.
    pub(crate) fn settle(&mut self, index: usize, failure: Option<String>) {
        match failure {
            Some(message) => self.failures.push(UnitFailure { index, message }),
            None => self.completed += 1,
        }

        let progress = match self.mode {
            ProgressMode::DispatchIndex => percent(index, self.total),
            ProgressMode::Completion => percent(self.settled(), self.total),
        };
        // Units settle out of order; never let the reported value go backwards.
        self.progress = self.progress.max(progress);

        self.finish_if_done();
        self.broadcast();
    }

    /// Stop expecting units past the first `dispatched`.
    pub(crate) fn abort(&mut self, dispatched: usize) {
        self.expected = dispatched;
        self.finish_if_done();
        self.broadcast();
    }

    fn finish_if_done(&mut self) {
        if self.state.is_terminal() || self.settled() < self.expected {
            return;
        }

        let over_threshold = self
            .failure_threshold
            .is_some_and(|threshold| self.failures.len() > threshold);

        self.state = if self.expected < self.total || over_threshold {
            JobState::Failed
        } else {
            JobState::Completed
        };
    }
}
