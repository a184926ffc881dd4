//! Per-question orchestration: two candidate answers, two judge scores, one record.

use crate::config::{CandidateModel, Config};
use crate::error::Result;
use crate::judge::Judge;
use crate::llm::{ChatBackend, Completion, LlmGateway, Prompts, RetryPolicy};
use crate::outcome::{Degradation, Outcome};
use crate::publisher::LivePublisher;
use crate::record::{EvaluationRecord, JudgeScore, ModelVerdict, StoredRecord};
use crate::store::RecordStore;
use crate::task::EvaluationTask;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

/// Anything that can turn a task into a finished evaluation.
///
/// The job processor only depends on this trait, so failing or slow
/// evaluators can be substituted in tests.
#[async_trait]
pub trait Evaluate: Send + Sync {
    async fn evaluate(&self, task: &EvaluationTask) -> Result<Evaluation>;
}

/// How one candidate model fared on a task.
#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub model: CandidateModel,
    pub completion: Completion,
    pub score: JudgeScore,
    /// Set when the answer is the gateway sentinel.
    pub answer_degradation: Option<Degradation>,
    /// Set when the score is the zero default.
    pub score_degradation: Option<Degradation>,
}

/// Result of evaluating one task.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The record as published; storage fields are local if `persisted` is false.
    pub record: StoredRecord,
    pub persisted: bool,
    pub candidates: [CandidateReport; 2],
}

impl Evaluation {
    /// Whether any part of the record is a fallback value.
    pub fn is_degraded(&self) -> bool {
        self.candidates
            .iter()
            .any(|c| c.answer_degradation.is_some() || c.score_degradation.is_some())
    }
}

/// Answers a task with both candidate models and grades each answer.
pub struct QuestionEvaluator {
    gateway: LlmGateway,
    judge: Judge,
    candidates: [CandidateModel; 2],
    answer_attempts: u32,
    store: Arc<dyn RecordStore>,
    publisher: LivePublisher,
}

impl QuestionEvaluator {
    pub fn new(
        gateway: LlmGateway,
        judge: Judge,
        candidates: [CandidateModel; 2],
        store: Arc<dyn RecordStore>,
        publisher: LivePublisher,
    ) -> Self {
        Self {
            gateway,
            judge,
            candidates,
            answer_attempts: 3,
            store,
            publisher,
        }
    }

    /// Wire an evaluator from configuration around a chat backend.
    pub fn from_config(
        config: &Config,
        backend: Arc<dyn ChatBackend>,
        store: Arc<dyn RecordStore>,
        publisher: LivePublisher,
    ) -> Self {
        let gateway = LlmGateway::with_policy(backend, RetryPolicy::default());
        let judge = Judge::new(gateway.clone(), config.models.judge.clone())
            .with_attempts(config.llm.judge_attempts);

        Self::new(
            gateway,
            judge,
            config.models.candidates.clone(),
            store,
            publisher,
        )
        .with_answer_attempts(config.llm.max_attempts)
    }

    /// Attempt budget for each candidate call.
    pub fn with_answer_attempts(mut self, attempts: u32) -> Self {
        self.answer_attempts = attempts;
        self
    }

    pub fn candidates(&self) -> &[CandidateModel; 2] {
        &self.candidates
    }

    /// Evaluate one task. Always produces a record.
    pub async fn run(&self, task: &EvaluationTask) -> Evaluation {
        let prompt = Prompts::candidate_answer(task.question());
        let [first, second] = &self.candidates;

        let (answer1, answer2) = tokio::join!(
            self.gateway.complete(&first.id, &prompt, self.answer_attempts),
            self.gateway.complete(&second.id, &prompt, self.answer_attempts),
        );

        let (score1, score2) = tokio::join!(
            self.grade(task, &answer1),
            self.grade(task, &answer2),
        );

        let report1 = report(first, answer1, score1);
        let report2 = report(second, answer2, score2);

        let record = EvaluationRecord::assemble(task, verdict(&report1), verdict(&report2));

        let (record, persisted) = match self.store.create(record.clone()).await {
            Ok(stored) => (stored, true),
            Err(e) => {
                error!(question = %task.question(), error = %e, "failed to persist evaluation record");
                (StoredRecord::stamp(record), false)
            }
        };

        let delivered = self.publisher.publish(record.clone());
        debug!(id = %record.id, delivered, persisted, "evaluation published");

        Evaluation {
            record,
            persisted,
            candidates: [report1, report2],
        }
    }

    async fn grade(&self, task: &EvaluationTask, answer: &Outcome<Completion>) -> Outcome<JudgeScore> {
        // A failed candidate is graded on an empty answer, never on the sentinel text.
        let candidate_text = if answer.is_degraded() {
            ""
        } else {
            answer.value.text.as_str()
        };

        let score = self
            .judge
            .score(task.question(), candidate_text, task.reference_answer())
            .await;

        // A sentinel answer always records (0, 0), whatever the judge said.
        match &answer.degradation {
            Some(cause) => Outcome::degraded(JudgeScore::default(), cause.clone()),
            None => score,
        }
    }
}

fn report(
    model: &CandidateModel,
    answer: Outcome<Completion>,
    score: Outcome<JudgeScore>,
) -> CandidateReport {
    CandidateReport {
        model: model.clone(),
        completion: answer.value,
        score: score.value,
        answer_degradation: answer.degradation,
        score_degradation: score.degradation,
    }
}

fn verdict(report: &CandidateReport) -> ModelVerdict {
    ModelVerdict {
        model: report.model.label.clone(),
        response: report.completion.text.clone(),
        score: report.score,
    }
}

#[async_trait]
impl Evaluate for QuestionEvaluator {
    async fn evaluate(&self, task: &EvaluationTask) -> Result<Evaluation> {
        Ok(self.run(task).await)
    }
}
