//! Scores and the persisted evaluation record.

use crate::llm::API_ERROR;
use crate::task::{Difficulty, EvaluationTask};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound of both judge scores.
pub const MAX_SCORE: u8 = 10;

/// The judge's two ratings for one candidate answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeScore {
    pub correctness: u8,
    pub faithfulness: u8,
}

impl JudgeScore {
    /// Build a score, truncating each value into `0..=10`.
    pub fn clamped(correctness: u64, faithfulness: u64) -> Self {
        let clamp = |v: u64| v.min(MAX_SCORE as u64) as u8;
        Self {
            correctness: clamp(correctness),
            faithfulness: clamp(faithfulness),
        }
    }
}

/// What one candidate model contributed to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVerdict {
    /// Display label of the model.
    pub model: String,
    /// Response text, or the gateway sentinel.
    pub response: String,
    pub score: JudgeScore,
}

fn api_error() -> String {
    API_ERROR.to_string()
}

/// Outcome of one task for both tracked models.
///
/// Every per-model field has a default so a record can always be built and
/// read back, whatever failed upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub reference_answer: String,

    #[serde(default)]
    pub model1: String,
    #[serde(default = "api_error")]
    pub response1: String,
    #[serde(default)]
    pub correctness1: u8,
    #[serde(default)]
    pub faithfulness1: u8,

    #[serde(default)]
    pub model2: String,
    #[serde(default = "api_error")]
    pub response2: String,
    #[serde(default)]
    pub correctness2: u8,
    #[serde(default)]
    pub faithfulness2: u8,
}

impl EvaluationRecord {
    /// Combine a task with the verdicts of the first and second tracked model.
    pub fn assemble(task: &EvaluationTask, first: ModelVerdict, second: ModelVerdict) -> Self {
        Self {
            question: task.question().to_string(),
            category: task.category().to_string(),
            difficulty: task.difficulty(),
            reference_answer: task.reference_answer().to_string(),
            model1: first.model,
            response1: first.response,
            correctness1: first.score.correctness,
            faithfulness1: first.score.faithfulness,
            model2: second.model,
            response2: second.response,
            correctness2: second.score.correctness,
            faithfulness2: second.score.faithfulness,
        }
    }

    /// Per-model view, in record order.
    pub fn verdicts(&self) -> [ModelVerdict; 2] {
        [
            ModelVerdict {
                model: self.model1.clone(),
                response: self.response1.clone(),
                score: JudgeScore::clamped(self.correctness1.into(), self.faithfulness1.into()),
            },
            ModelVerdict {
                model: self.model2.clone(),
                response: self.response2.clone(),
                score: JudgeScore::clamped(self.correctness2.into(), self.faithfulness2.into()),
            },
        ]
    }
}

/// A record as the store returned it, with storage-assigned fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(flatten)]
    pub record: EvaluationRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Give a record a fresh id and the current time.
    pub fn stamp(record: EvaluationRecord) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            record,
            created_at: now,
            updated_at: now,
        }
    }
}
