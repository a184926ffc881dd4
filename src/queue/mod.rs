//! Batch jobs, admission control and per-job progress.

mod job;
mod processor;
mod scheduler;

pub use job::{JobId, JobState, JobStatus, ProgressMode, UnitFailure, WorkUnit};
pub use processor::{JobProcessor, ProcessorSettings, Submission};
pub use scheduler::{Admission, Scheduler, SchedulerConfig};
