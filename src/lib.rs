//! LLM Judge Bench - side-by-side evaluation of two language models.
//!
//! Questions are answered by two candidate models and each answer is scored
//! by a third "judge" model for correctness and faithfulness against a
//! reference answer. Batches run through a rate-limited job queue, every
//! finished question is persisted as one record and broadcast to live
//! subscribers.
//!
//! # Quick Start
//!
//! ```no_run
//! use llm_judge_bench::{
//!     config::Config,
//!     dataset::Dataset,
//!     evaluator::QuestionEvaluator,
//!     llm::LlmClient,
//!     publisher::LivePublisher,
//!     queue::{JobProcessor, ProcessorSettings, Scheduler, SchedulerConfig},
//!     store::JsonlStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     let client = Arc::new(LlmClient::new(config.llm.clone())?);
//!     let store = Arc::new(JsonlStore::new(&config.storage.results_path));
//!     let publisher = LivePublisher::new(config.queue.publish_capacity);
//!     let evaluator = QuestionEvaluator::from_config(&config, client, store, publisher);
//!
//!     let scheduler = Scheduler::start(SchedulerConfig::from(&config.queue));
//!     let processor = JobProcessor::new(
//!         scheduler,
//!         Arc::new(evaluator),
//!         ProcessorSettings::from(&config.queue),
//!     );
//!
//!     let submission = processor.submit(Dataset::sample()?.tasks).await?;
//!     let status = processor.wait(submission.job_id).await?;
//!     println!("job {} is {}", status.id, status.status);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **LlmGateway**: retrying, rate-limit aware calls to a chat backend
//! - **Judge**: turns judge output into two bounded scores
//! - **QuestionEvaluator**: one task in, one persisted and published record out
//! - **JobProcessor**: batches, bounded concurrency and job progress
//! - **RecordStore**: where records live

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod judge;
pub mod llm;
pub mod outcome;
pub mod publisher;
pub mod queue;
pub mod record;
pub mod store;
pub mod summary;
pub mod task;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use dataset::Dataset;
pub use error::{BenchError, Result};
pub use evaluator::{Evaluate, Evaluation, QuestionEvaluator};
pub use judge::Judge;
pub use llm::{ChatBackend, LlmClient, LlmGateway};
pub use outcome::{Degradation, Outcome};
pub use publisher::LivePublisher;
pub use queue::{JobId, JobProcessor, JobState, JobStatus, Scheduler, Submission};
pub use record::{EvaluationRecord, JudgeScore, StoredRecord};
pub use store::{JsonlStore, MemoryStore, RecordStore};
pub use summary::Summary;
pub use task::EvaluationTask;
