//! Aggregate metrics over stored records.

use crate::llm::API_ERROR;
use crate::record::{JudgeScore, MAX_SCORE, StoredRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BUCKETS: usize = MAX_SCORE as usize + 1;

/// How many answers received each score from 0 to 10.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreHistogram {
    pub correctness: [usize; BUCKETS],
    pub faithfulness: [usize; BUCKETS],
}

impl ScoreHistogram {
    fn add(&mut self, score: JudgeScore) {
        self.correctness[usize::from(score.correctness.min(MAX_SCORE))] += 1;
        self.faithfulness[usize::from(score.faithfulness.min(MAX_SCORE))] += 1;
    }
}

/// Metrics for one candidate model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Display label as stored on the records.
    pub model: String,
    pub evaluated: usize,
    /// Answers that are the gateway sentinel.
    pub api_errors: usize,
    pub avg_correctness: f64,
    pub avg_faithfulness: f64,
    pub histogram: ScoreHistogram,
}

/// Mean scores of every answer in a group, both models pooled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMeans {
    pub key: String,
    pub answers: usize,
    pub avg_correctness: f64,
    pub avg_faithfulness: f64,
}

/// Dashboard metrics for a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_records: usize,
    /// In order of first appearance.
    pub models: Vec<ModelSummary>,
    /// Sorted by category.
    pub by_category: Vec<GroupMeans>,
    /// Sorted by difficulty level.
    pub by_difficulty: Vec<GroupMeans>,
}

#[derive(Default)]
struct Totals {
    count: usize,
    correctness: u64,
    faithfulness: u64,
}

impl Totals {
    fn add(&mut self, score: JudgeScore) {
        self.count += 1;
        self.correctness += u64::from(score.correctness);
        self.faithfulness += u64::from(score.faithfulness);
    }

    fn means(&self) -> (f64, f64) {
        if self.count == 0 {
            return (0.0, 0.0);
        }
        let n = self.count as f64;
        (self.correctness as f64 / n, self.faithfulness as f64 / n)
    }

    fn into_group(self, key: String) -> GroupMeans {
        let (avg_correctness, avg_faithfulness) = self.means();
        GroupMeans {
            key,
            answers: self.count,
            avg_correctness,
            avg_faithfulness,
        }
    }
}

impl Summary {
    /// Calculate summary statistics from stored records.
    pub fn from_records(records: &[StoredRecord]) -> Self {
        let mut models: Vec<(String, Totals, usize, ScoreHistogram)> = Vec::new();
        let mut categories: BTreeMap<String, Totals> = BTreeMap::new();
        let mut difficulties: BTreeMap<u8, Totals> = BTreeMap::new();

        for stored in records {
            let record = &stored.record;
            for verdict in record.verdicts() {
                let slot = match models.iter().position(|(name, ..)| *name == verdict.model) {
                    Some(i) => i,
                    None => {
                        models.push((verdict.model.clone(), Totals::default(), 0, ScoreHistogram::default()));
                        models.len() - 1
                    }
                };
                let (_, totals, api_errors, histogram) = &mut models[slot];
                totals.add(verdict.score);
                histogram.add(verdict.score);
                if verdict.response == API_ERROR {
                    *api_errors += 1;
                }

                categories
                    .entry(record.category.clone())
                    .or_default()
                    .add(verdict.score);
                difficulties
                    .entry(record.difficulty.level())
                    .or_default()
                    .add(verdict.score);
            }
        }

        Self {
            total_records: records.len(),
            models: models
                .into_iter()
                .map(|(model, totals, api_errors, histogram)| {
                    let (avg_correctness, avg_faithfulness) = totals.means();
                    ModelSummary {
                        model,
                        evaluated: totals.count,
                        api_errors,
                        avg_correctness,
                        avg_faithfulness,
                        histogram,
                    }
                })
                .collect(),
            by_category: categories
                .into_iter()
                .map(|(key, totals)| totals.into_group(key))
                .collect(),
            by_difficulty: difficulties
                .into_iter()
                .map(|(level, totals)| totals.into_group(level.to_string()))
                .collect(),
        }
    }

    /// Print summary to stdout.
    pub fn print(&self) {
        println!("\n========== Evaluation Summary ==========");
        println!("Total records: {}", self.total_records);

        for model in &self.models {
            println!("----------------------------------------");
            println!("{}", model.model);
            println!("  Evaluated:        {}", model.evaluated);
            println!("  API errors:       {}", model.api_errors);
            println!("  Avg correctness:  {:.2}/{}", model.avg_correctness, MAX_SCORE);
            println!("  Avg faithfulness: {:.2}/{}", model.avg_faithfulness, MAX_SCORE);
            println!("  Score  Correct  Faithful");
            for score in 0..BUCKETS {
                let c = model.histogram.correctness[score];
                let f = model.histogram.faithfulness[score];
                if c > 0 || f > 0 {
                    println!("  {:>5}  {:>7}  {:>8}", score, c, f);
                }
            }
        }

        print_groups("By category", &self.by_category);
        print_groups("By difficulty", &self.by_difficulty);
        println!("========================================\n");
    }
}

fn print_groups(title: &str, groups: &[GroupMeans]) {
    if groups.is_empty() {
        return;
    }
    println!("----------------------------------------");
    println!("{title}:");
    for group in groups {
        println!(
            "  {:<16} correctness {:.2}  faithfulness {:.2}  ({} answers)",
            group.key, group.avg_correctness, group.avg_faithfulness, group.answers
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EvaluationRecord, ModelVerdict};
    use crate::task::EvaluationTask;

    fn stored(category: &str, difficulty: i64, first: (u64, u64), second: Option<(u64, u64)>) -> StoredRecord {
        let task = EvaluationTask::new("Q?", "Yes.", category, difficulty).unwrap();
        let a = ModelVerdict {
            model: "DeepSeek".into(),
            response: "Yes".into(),
            score: JudgeScore::clamped(first.0, first.1),
        };
        let b = match second {
            Some((c, f)) => ModelVerdict {
                model: "Qwen".into(),
                response: "No".into(),
                score: JudgeScore::clamped(c, f),
            },
            None => ModelVerdict {
                model: "Qwen".into(),
                response: API_ERROR.into(),
                score: JudgeScore::default(),
            },
        };
        StoredRecord::stamp(EvaluationRecord::assemble(&task, a, b))
    }

    #[test]
    fn test_empty_summary() {
        let summary = Summary::from_records(&[]);
        assert_eq!(summary.total_records, 0);
        assert!(summary.models.is_empty());
        assert!(summary.by_category.is_empty());
    }

    #[test]
    fn test_model_averages_and_histogram() {
        let records = vec![
            stored("physics", 0, (9, 10), Some((5, 6))),
            stored("biology", 2, (7, 8), None),
        ];

        let summary = Summary::from_records(&records);
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.models.len(), 2);

        let deepseek = &summary.models[0];
        assert_eq!(deepseek.model, "DeepSeek");
        assert_eq!(deepseek.evaluated, 2);
        assert!((deepseek.avg_correctness - 8.0).abs() < 0.01);
        assert!((deepseek.avg_faithfulness - 9.0).abs() < 0.01);
        assert_eq!(deepseek.histogram.correctness[9], 1);
        assert_eq!(deepseek.histogram.faithfulness[10], 1);

        let qwen = &summary.models[1];
        assert_eq!(qwen.api_errors, 1);
        assert!((qwen.avg_correctness - 2.5).abs() < 0.01);
        assert_eq!(qwen.histogram.correctness[0], 1);
        assert_eq!(qwen.histogram.correctness.iter().sum::<usize>(), 2);
    }

    #[test]
    fn test_groups_are_sorted_and_pooled() {
        let records = vec![
            stored("physics", 1, (10, 10), Some((0, 0))),
            stored("biology", 0, (4, 4), Some((6, 6))),
        ];

        let summary = Summary::from_records(&records);

        let keys: Vec<&str> = summary.by_category.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["biology", "physics"]);
        assert_eq!(summary.by_category[1].answers, 2);
        assert!((summary.by_category[1].avg_correctness - 5.0).abs() < 0.01);

        let levels: Vec<&str> = summary.by_difficulty.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(levels, vec!["0", "1"]);
    }
}
