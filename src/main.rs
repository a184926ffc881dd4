//! LLM Judge Bench CLI
//!
//! Runs question batches through two candidate models and a judge model.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use llm_judge_bench::{
    config::{Config, LoggingConfig},
    dataset::Dataset,
    evaluator::QuestionEvaluator,
    llm::LlmClient,
    publisher::LivePublisher,
    queue::{JobProcessor, ProcessorSettings, Scheduler, SchedulerConfig},
    record::StoredRecord,
    store::{JsonlStore, RecordStore},
    summary::Summary,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// LLM Judge Bench - compare two models with an LLM judge
#[derive(Parser)]
#[command(name = "judge-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a dataset and stream results as they arrive
    Run {
        /// Dataset file (.json / .jsonl) or directory
        #[arg(required_unless_present = "sample")]
        dataset: Option<PathBuf>,

        /// Use the built-in sample questions
        #[arg(long, conflicts_with = "dataset")]
        sample: bool,

        /// Only evaluate the first N questions
        #[arg(short = 'n', long)]
        max_items: Option<usize>,

        /// Also write the records of this run to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List persisted evaluation records
    Results {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print aggregate metrics over persisted records
    Summary,

    /// Test LLM connection
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Run {
            dataset,
            sample,
            max_items,
            output,
        } => cmd_run(config, dataset, sample, max_items, output).await,
        Commands::Results { json } => cmd_results(&config, json).await,
        Commands::Summary => cmd_summary(&config).await,
        Commands::Test => cmd_test(config).await,
    }
}

fn init_logging(verbose: u8, logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn cmd_run(
    config: Config,
    dataset_path: Option<PathBuf>,
    sample: bool,
    max_items: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let mut dataset = match (&dataset_path, sample) {
        (_, true) => Dataset::sample().context("Failed to build sample dataset")?,
        (Some(path), false) => Dataset::load(path)
            .with_context(|| format!("Failed to load dataset from '{}'", path.display()))?,
        (None, false) => anyhow::bail!("Pass a dataset path or --sample"),
    };
    if let Some(n) = max_items {
        dataset = dataset.take(n);
    }

    let [first, second] = &config.models.candidates;
    println!("Dataset:    {} ({} questions)", dataset.name, dataset.len());
    println!("Candidates: {} / {}", first.label, second.label);
    println!("Judge:      {}", config.models.judge);
    println!("Results:    {}", config.storage.results_path.display());
    println!();

    let client = Arc::new(LlmClient::new(config.llm.clone()).context("Failed to create LLM client")?);
    let store = Arc::new(JsonlStore::new(&config.storage.results_path));
    let publisher = LivePublisher::new(config.queue.publish_capacity);
    let mut live = publisher.subscribe();

    let evaluator = QuestionEvaluator::from_config(&config, client, store, publisher);
    let scheduler = Scheduler::start(SchedulerConfig::from(&config.queue));
    let processor = JobProcessor::new(
        scheduler.clone(),
        Arc::new(evaluator),
        ProcessorSettings::from(&config.queue),
    );

    let start = Instant::now();
    let submission = processor
        .submit(dataset.tasks)
        .await
        .context("Failed to submit batch")?;
    info!(job_id = %submission.job_id, total = submission.total_questions, "batch submitted");

    let mut progress = processor.watch(submission.job_id).await?;
    let mut records = Vec::with_capacity(submission.total_questions);
    let mut finished = progress.borrow_and_update().status.is_terminal();

    while !finished {
        tokio::select! {
            received = live.recv() => match received {
                Ok(record) => {
                    print_record(&record);
                    records.push(record);
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "live updates lagged"),
                Err(RecvError::Closed) => break,
            },
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = progress.borrow_and_update().clone();
                println!(
                    "  progress {:>3}% ({} done, {} failed of {})",
                    status.progress, status.completed, status.failed, status.total
                );
                finished = status.status.is_terminal();
            }
        }
    }

    while let Ok(record) = live.try_recv() {
        print_record(&record);
        records.push(record);
    }
    scheduler.stop();

    let status = processor.status(submission.job_id).await?;
    println!(
        "\nJob {} {} in {:.2?}",
        status.id,
        status.status,
        start.elapsed()
    );

    for failure in processor.failures(submission.job_id).await? {
        println!("  question {} failed: {}", failure.index, failure.message);
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&records).context("Failed to serialize records")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        println!("Records saved to: {}", path.display());
    }

    Summary::from_records(&records).print();

    Ok(())
}

fn print_record(record: &StoredRecord) {
    let r = &record.record;
    let preview: String = r.question.chars().take(60).collect();
    println!(
        "[{}] {}\n    {}: {}/{}   {}: {}/{}",
        record.id.chars().take(8).collect::<String>(),
        preview,
        r.model1,
        r.correctness1,
        r.faithfulness1,
        r.model2,
        r.correctness2,
        r.faithfulness2
    );
}

async fn load_records(config: &Config) -> Result<Vec<StoredRecord>> {
    JsonlStore::new(&config.storage.results_path)
        .find()
        .await
        .with_context(|| {
            format!(
                "Failed to read records from '{}'",
                config.storage.results_path.display()
            )
        })
}

async fn cmd_results(config: &Config, json: bool) -> Result<()> {
    let records = load_records(config).await?;

    if json {
        let json_str = serde_json::to_string_pretty(&records).context("Failed to serialize records")?;
        println!("{}", json_str);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    println!("{}", "─".repeat(60));
    for record in &records {
        print_record(record);
        println!("    reference: {}", record.record.reference_answer);
        println!(
            "    {} / difficulty {} / {}",
            record.record.category,
            record.record.difficulty.level(),
            record.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("{}", "─".repeat(60));
    println!("{} records", records.len());

    Ok(())
}

async fn cmd_summary(config: &Config) -> Result<()> {
    let records = load_records(config).await?;
    Summary::from_records(&records).print();
    Ok(())
}

async fn cmd_test(config: Config) -> Result<()> {
    println!("Testing LLM connection...\n");

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Judge:     {}", config.models.judge);
    let key_prefix: String = config.llm.api_key.chars().take(8).collect();
    println!("  API Key:   {}...", key_prefix);
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm).context("Failed to create LLM client")?;

    println!("Sending test request...");
    match client.test_connection(&config.models.judge).await {
        Ok(()) => println!("Connection successful!"),
        Err(e) => println!("Connection failed: {}", e),
    }

    Ok(())
}
