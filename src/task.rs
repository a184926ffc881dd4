//! The unit of work: one question to answer and judge.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Difficulty level, 0 (easy) to 2 (hard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MAX: u8 = 2;

    pub fn new(level: i64) -> Result<Self> {
        if (0..=Self::MAX as i64).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(BenchError::InvalidTask(format!(
                "difficulty must be between 0 and {}, got {}",
                Self::MAX,
                level
            )))
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Difficulty {
    type Error = BenchError;

    fn try_from(level: i64) -> Result<Self> {
        Self::new(level)
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One question with its reference answer.
///
/// Validated on construction and immutable afterwards. Deserialization runs
/// the same validation, so a task read from a dataset file is always usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTask")]
pub struct EvaluationTask {
    question: String,
    possible_answers: Vec<String>,
    reference_answer: String,
    category: String,
    difficulty: Difficulty,
}

/// Loosely shaped task as it appears in dataset files.
#[derive(Debug, Deserialize)]
struct RawTask {
    question: String,
    #[serde(default)]
    possible_answers: Vec<String>,
    #[serde(default)]
    reference_answer: Option<String>,
    category: String,
    difficulty: i64,
}

impl TryFrom<RawTask> for EvaluationTask {
    type Error = BenchError;

    fn try_from(raw: RawTask) -> Result<Self> {
        // Without an explicit reference the first acceptable answer stands in.
        let reference = match raw.reference_answer {
            Some(reference) => reference,
            None => raw.possible_answers.first().cloned().ok_or_else(|| {
                BenchError::InvalidTask(format!(
                    "task '{}' has neither a reference answer nor possible answers",
                    raw.question
                ))
            })?,
        };

        EvaluationTask::new(raw.question, reference, raw.category, raw.difficulty)?
            .with_possible_answers(raw.possible_answers)
    }
}

fn required(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BenchError::InvalidTask(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

impl EvaluationTask {
    /// Create a task. Text fields are trimmed and must be non-empty.
    pub fn new(
        question: impl Into<String>,
        reference_answer: impl Into<String>,
        category: impl Into<String>,
        difficulty: i64,
    ) -> Result<Self> {
        Ok(Self {
            question: required("question", question.into())?,
            possible_answers: Vec::new(),
            reference_answer: required("reference_answer", reference_answer.into())?,
            category: required("category", category.into())?,
            difficulty: Difficulty::new(difficulty)?,
        })
    }

    /// Attach the acceptable answers the task was built from.
    ///
    /// An empty list is allowed for sources that only carry the core fields;
    /// otherwise at least two answers are required.
    pub fn with_possible_answers(mut self, answers: Vec<String>) -> Result<Self> {
        if answers.len() == 1 {
            return Err(BenchError::InvalidTask(format!(
                "task '{}' needs at least two possible answers",
                self.question
            )));
        }
        self.possible_answers = answers;
        Ok(self)
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn possible_answers(&self) -> &[String] {
        &self.possible_answers
    }

    pub fn reference_answer(&self) -> &str {
        &self.reference_answer
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
}
