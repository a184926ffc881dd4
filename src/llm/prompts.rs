//! Prompts sent to candidate and judge models.

/// Collection of prompts used by the evaluation pipeline.
pub struct Prompts;

impl Prompts {
    /// Prompt asking a candidate model for a strict yes/no answer.
    pub fn candidate_answer(question: &str) -> String {
        format!(r#"Answer with "Yes" or "No": {}"#, question)
    }

    /// Grading prompt for the judge model.
    ///
    /// The judge is asked for two ratings; the first two numbers in its reply
    /// are read as correctness and faithfulness.
    pub fn judge(question: &str, answer: &str, reference: &str) -> String {
        format!(
            "Evaluate the following response to the question: {}\n\n\
             Response: {}\n\n\
             Reference Answer: {}\n\n\
             Rate correctness (1-10) and faithfulness (1-10).",
            question, answer, reference
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_prompt() {
        assert_eq!(
            Prompts::candidate_answer("Is water wet?"),
            r#"Answer with "Yes" or "No": Is water wet?"#
        );
    }

    #[test]
    fn test_judge_prompt_embeds_all_parts() {
        let prompt = Prompts::judge("Is water wet?", "Yes", "Yes.");
        assert!(prompt.starts_with("Evaluate the following response to the question: Is water wet?"));
        assert!(prompt.contains("Response: Yes\n"));
        assert!(prompt.contains("Reference Answer: Yes.\n"));
        assert!(prompt.ends_with("Rate correctness (1-10) and faithfulness (1-10)."));
    }
}
