//! Dataset loading.
//!
//! Supports:
//! - JSON files holding either a bare array of tasks or `{ "name", "tasks" }`
//! - JSON lines files, one task per line
//! - Directories of the above, walked recursively

use crate::error::{BenchError, Result};
use crate::task::EvaluationTask;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// An ordered collection of evaluation tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Dataset name.
    pub name: String,
    /// Tasks in submission order.
    pub tasks: Vec<EvaluationTask>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDataset {
    Named { name: String, tasks: Vec<EvaluationTask> },
    Bare(Vec<EvaluationTask>),
}

impl Dataset {
    /// Create a new empty dataset.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tasks: Vec::new(),
        }
    }

    /// Add a task to the dataset.
    pub fn add_task(&mut self, task: EvaluationTask) {
        self.tasks.push(task);
    }

    /// Number of tasks in the dataset.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Get a subset of tasks (for quick testing).
    pub fn take(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            tasks: self.tasks.iter().take(n).cloned().collect(),
        }
    }

    /// Load a file or directory, choosing the format from the extension.
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Self::load_dir(path);
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("ndjson") => Self::load_jsonl(path),
            _ => Self::load_json(path),
        }
    }

    /// Load from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        let parsed: JsonDataset = serde_json::from_str(&content).map_err(|e| {
            BenchError::Serialization(format!("Failed to parse dataset {:?}: {}", path, e))
        })?;

        Ok(match parsed {
            JsonDataset::Named { name, tasks } => Self { name, tasks },
            JsonDataset::Bare(tasks) => Self {
                name: dataset_name(path),
                tasks,
            },
        })
    }

    /// Load from a JSON lines file. Blank lines are skipped.
    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        let mut dataset = Dataset::new(&dataset_name(path));

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let task: EvaluationTask = serde_json::from_str(line).map_err(|e| {
                BenchError::Serialization(format!(
                    "Failed to parse task at {:?} line {}: {}",
                    path,
                    line_num + 1,
                    e
                ))
            })?;
            dataset.add_task(task);
        }

        Ok(dataset)
    }

    /// Load every `.json` / `.jsonl` file under a directory, in path order.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(BenchError::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }

        let mut dataset = Dataset::new(&dataset_name(dir));

        let mut files: Vec<_> = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                matches!(
                    entry.path().extension().and_then(|e| e.to_str()),
                    Some("json") | Some("jsonl") | Some("ndjson")
                )
            })
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        for file in files {
            let part = Self::load(&file)?;
            dataset.tasks.extend(part.tasks);
        }

        Ok(dataset)
    }

    /// Save to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BenchError::Serialization(e.to_string()))?;
        fs::write(path, content).map_err(|e| BenchError::io(path, e))?;
        Ok(())
    }

    /// Create a small yes/no dataset for smoke runs.
    pub fn sample() -> Result<Self> {
        let mut dataset = Dataset::new("sample");

        let rows = [
            ("Is water wet?", "Yes.", "physics", 0),
            ("Is the Pacific the largest ocean on Earth?", "Yes.", "geography", 0),
            ("Can a square have unequal sides?", "No.", "math", 1),
            ("Is every prime number odd?", "No.", "math", 1),
            ("Did the Roman Empire exist before the printing press?", "Yes.", "history", 2),
        ];

        for (question, reference, category, difficulty) in rows {
            let task = EvaluationTask::new(question, reference, category, difficulty)?
                .with_possible_answers(vec!["Yes.".to_string(), "No.".to_string()])?;
            dataset.add_task(task);
        }

        Ok(dataset)
    }
}

fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dataset_operations() {
        let mut dataset = Dataset::new("test");
        assert!(dataset.is_empty());

        dataset.add_task(EvaluationTask::new("Test question?", "Yes.", "test", 0).unwrap());

        assert_eq!(dataset.len(), 1);
        assert!(!dataset.is_empty());
    }

    #[test]
    fn test_sample_dataset() {
        let dataset = Dataset::sample().unwrap();
        assert_eq!(dataset.name, "sample");
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.take(2).len(), 2);

        for task in &dataset.tasks {
            assert!(!task.question().is_empty());
            assert_eq!(task.possible_answers().len(), 2);
        }
    }

    #[test]
    fn test_load_bare_and_named_json() {
        let dir = TempDir::new().unwrap();

        let bare = dir.path().join("physics.json");
        fs::write(
            &bare,
            r#"[{"question": "Is ice cold?", "reference_answer": "Yes.", "category": "physics", "difficulty": 0}]"#,
        )
        .unwrap();
        let loaded = Dataset::load(&bare).unwrap();
        assert_eq!(loaded.name, "physics");
        assert_eq!(loaded.len(), 1);

        let named = dir.path().join("named.json");
        fs::write(
            &named,
            r#"{"name": "suite", "tasks": [{"question": "Q?", "reference_answer": "No.", "category": "c", "difficulty": 2}]}"#,
        )
        .unwrap();
        let loaded = Dataset::load(&named).unwrap();
        assert_eq!(loaded.name, "suite");
        assert_eq!(loaded.tasks[0].difficulty().level(), 2);
    }

    #[test]
    fn test_load_jsonl_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.jsonl");
        fs::write(
            &path,
            "{\"question\": \"A?\", \"reference_answer\": \"Yes.\", \"category\": \"c\", \"difficulty\": 0}\n\n\
             {\"question\": \"B?\", \"reference_answer\": \"Yes.\", \"category\": \"c\", \"difficulty\": 9}\n",
        )
        .unwrap();

        let err = Dataset::load(&path).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{}", err);
    }

    #[test]
    fn test_load_dir_preserves_path_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("b.jsonl"),
            "{\"question\": \"Second?\", \"reference_answer\": \"No.\", \"category\": \"c\", \"difficulty\": 1}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"[{"question": "First?", "reference_answer": "Yes.", "category": "c", "difficulty": 0}]"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let dataset = Dataset::load(dir.path()).unwrap();
        let questions: Vec<_> = dataset.tasks.iter().map(|t| t.question()).collect();
        assert_eq!(questions, vec!["First?", "Second?"]);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");

        let original = Dataset::sample().unwrap();
        original.save_json(&path).unwrap();

        let loaded = Dataset::load(&path).unwrap();
        assert_eq!(loaded.name, original.name);
        assert_eq!(loaded.tasks, original.tasks);
    }
}
