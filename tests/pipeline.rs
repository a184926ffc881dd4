//! End-to-end tests: submit a batch, evaluate it, persist, publish, poll status.

use async_trait::async_trait;
use llm_judge_bench::{
    BenchError, ChatBackend, Config, EvaluationTask, JobId, JobProcessor, JobState, LivePublisher,
    LlmClient, MemoryStore, QuestionEvaluator, RecordStore, Result,
    queue::{ProcessorSettings, Scheduler, SchedulerConfig},
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JUDGE: &str = "google/gemma-3-12b-it:free";

/// Backend that answers "Yes" to candidates and "9 10" to the judge, slowly,
/// while counting how many calls are open at once.
#[derive(Default)]
struct CountingBackend {
    open: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl ChatBackend for CountingBackend {
    async fn send(&self, model: &str, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_open, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(10)).await;
        self.open.fetch_sub(1, Ordering::SeqCst);

        if model == JUDGE {
            Ok("9 10".to_string())
        } else {
            Ok("Yes".to_string())
        }
    }
}

fn water() -> EvaluationTask {
    EvaluationTask::new("Is water wet?", "Yes.", "physics", 0).unwrap()
}

fn batch(n: usize) -> Vec<EvaluationTask> {
    (0..n)
        .map(|i| EvaluationTask::new(format!("Question {i}?"), "Yes.", "general", 1).unwrap())
        .collect()
}

fn pipeline(
    config: &Config,
    backend: Arc<dyn ChatBackend>,
    store: Arc<dyn RecordStore>,
    publisher: LivePublisher,
) -> JobProcessor {
    let evaluator = QuestionEvaluator::from_config(config, backend, store, publisher);
    JobProcessor::new(
        Scheduler::start(SchedulerConfig::from(&config.queue)),
        Arc::new(evaluator),
        ProcessorSettings::from(&config.queue),
    )
}

#[tokio::test]
async fn test_water_is_wet_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": JUDGE})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "9 10"}}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Yes"}}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let config = Config::with_llm(server.uri(), "test-key");
    let client = Arc::new(LlmClient::new(config.llm.clone()).unwrap());
    let store = Arc::new(MemoryStore::new());
    let publisher = LivePublisher::new(16);
    let mut live = publisher.subscribe();

    let processor = pipeline(&config, client, store.clone(), publisher);

    let submission = processor.submit(vec![water()]).await.unwrap();
    assert_eq!(submission.total_questions, 1);

    let status = processor.wait(submission.job_id).await.unwrap();
    assert_eq!(status.status, JobState::Completed);
    assert_eq!(status.completed, 1);

    let records = store.find().await.unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0].record;
    assert_eq!(record.question, "Is water wet?");
    assert_eq!(record.reference_answer, "Yes.");
    assert_eq!(record.category, "physics");
    assert_eq!(record.model1, "DeepSeek-R1-Zero");
    assert_eq!(record.model2, "Qwen-32B");
    assert_eq!(record.response1, "Yes");
    assert_eq!(record.response2, "Yes");
    assert_eq!((record.correctness1, record.faithfulness1), (9, 10));
    assert_eq!((record.correctness2, record.faithfulness2), (9, 10));

    // The live event carries the stored form.
    assert_eq!(live.recv().await.unwrap(), records[0]);
}

#[tokio::test]
async fn test_batch_yields_one_record_per_task_under_the_cap() {
    let mut config = Config::with_llm("http://unused", "key");
    config.queue.rate_limit_window_ms = 20;
    let backend = Arc::new(CountingBackend::default());
    let store = Arc::new(MemoryStore::new());
    let publisher = LivePublisher::new(64);
    let mut live = publisher.subscribe();

    let processor = pipeline(&config, backend.clone(), store.clone(), publisher);

    let submission = processor.submit(batch(12)).await.unwrap();
    let status = processor.wait(submission.job_id).await.unwrap();

    assert_eq!(status.status, JobState::Completed);
    assert_eq!(status.completed, 12);
    assert_eq!(store.len().await, 12);

    let mut questions: Vec<String> = store
        .find()
        .await
        .unwrap()
        .into_iter()
        .map(|stored| stored.record.question)
        .collect();
    questions.sort();
    questions.dedup();
    assert_eq!(questions.len(), 12);

    // Two candidate calls and two judge calls per task.
    assert_eq!(backend.calls.load(Ordering::SeqCst), 48);

    // At most five tasks run at once, each with at most two calls open.
    assert!(processor.scheduler().peak_in_flight() <= 5);
    assert!(backend.peak.load(Ordering::SeqCst) <= 10);

    let mut published = 0;
    while live.try_recv().is_ok() {
        published += 1;
    }
    assert_eq!(published, 12);
}

#[tokio::test]
async fn test_status_of_unknown_job() {
    let config = Config::with_llm("http://unused", "key");
    let processor = pipeline(
        &config,
        Arc::new(CountingBackend::default()),
        Arc::new(MemoryStore::new()),
        LivePublisher::default(),
    );

    let result = processor.status(JobId::new(42)).await;
    assert!(matches!(result, Err(BenchError::JobNotFound(_))));
}

#[tokio::test]
async fn test_unreachable_models_still_produce_records() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let mut config = Config::with_llm(server.uri(), "test-key");
    config.llm.max_attempts = 1;
    let client = Arc::new(LlmClient::new(config.llm.clone()).unwrap());
    let store = Arc::new(MemoryStore::new());

    let processor = pipeline(&config, client, store.clone(), LivePublisher::default());

    let submission = processor.submit(vec![water()]).await.unwrap();
    let status = processor.wait(submission.job_id).await.unwrap();
    assert_eq!(status.status, JobState::Completed);

    let record = &store.find().await.unwrap()[0].record;
    assert_eq!(record.response1, "API error");
    assert_eq!(record.response2, "API error");
    assert_eq!(record.correctness1, 0);
    assert_eq!(record.faithfulness2, 0);
}
