//! LLM-as-judge scoring of candidate answers.

use crate::llm::{LlmGateway, Prompts};
use crate::outcome::{Degradation, Outcome};
use crate::record::JudgeScore;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static DIGIT_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

/// Scores candidate answers against a reference with a judge model.
#[derive(Clone)]
pub struct Judge {
    gateway: LlmGateway,
    model: String,
    max_attempts: u32,
}

impl Judge {
    /// Create a judge that calls `model` once per score.
    pub fn new(gateway: LlmGateway, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
            max_attempts: 1,
        }
    }

    /// Change the attempt budget passed to the gateway.
    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Grade `candidate_answer`. Never fails; any problem yields `(0, 0)`.
    pub async fn score(
        &self,
        question: &str,
        candidate_answer: &str,
        reference_answer: &str,
    ) -> Outcome<JudgeScore> {
        let prompt = Prompts::judge(question, candidate_answer, reference_answer);
        let completion = self
            .gateway
            .complete(&self.model, &prompt, self.max_attempts)
            .await;

        if let Some(degradation) = completion.degradation {
            return Outcome::degraded(JudgeScore::default(), degradation);
        }

        let text = completion.value.text;
        match extract_scores(&text) {
            Some(score) => Outcome::ok(score),
            None => {
                let numbers_found = DIGIT_RUNS.find_iter(&text).count();
                warn!(
                    judge = %self.model,
                    numbers_found,
                    response = %text,
                    "judge response did not contain two scores"
                );
                Outcome::degraded(
                    JudgeScore::default(),
                    Degradation::Unscored { numbers_found },
                )
            }
        }
    }
}

/// Read the first two runs of digits as correctness and faithfulness.
///
/// Returns `None` when fewer than two numbers appear. Values above 10,
/// including runs too long for an integer, are clamped to 10.
pub fn extract_scores(text: &str) -> Option<JudgeScore> {
    let mut numbers = DIGIT_RUNS
        .find_iter(text)
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX));

    let correctness = numbers.next()?;
    let faithfulness = numbers.next()?;
    Some(JudgeScore::clamped(correctness, faithfulness))
}
