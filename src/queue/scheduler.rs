//! Admission control for queued work.
//!
//! A scheduler caps how many units run at once and how many may start within
//! a sliding time window. It is started explicitly and stays usable until
//! [`Scheduler::stop`] is called; after that every admission fails.

use crate::config::QueueConfig;
use crate::error::{BenchError, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info};

/// Limits applied by a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Units allowed to run concurrently.
    pub concurrency: usize,
    /// Units allowed to start per `rate_window`.
    pub rate_limit_max: usize,
    pub rate_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for SchedulerConfig {
    fn from(queue: &QueueConfig) -> Self {
        Self {
            concurrency: queue.concurrency.max(1),
            rate_limit_max: queue.rate_limit_max.max(1),
            rate_window: Duration::from_millis(queue.rate_limit_window_ms),
        }
    }
}

/// Proof that a unit may run. Releases its slot when dropped.
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Concurrency and rate limiter owned by the application.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    permits: Arc<Semaphore>,
    /// Start times of admissions inside the current window.
    window: Mutex<VecDeque<Instant>>,
    in_flight: Arc<AtomicUsize>,
    peak: AtomicUsize,
}

impl Scheduler {
    /// Create a running scheduler.
    pub fn start(config: SchedulerConfig) -> Arc<Self> {
        info!(
            concurrency = config.concurrency,
            rate_limit_max = config.rate_limit_max,
            rate_window_ms = config.rate_window.as_millis() as u64,
            "scheduler started"
        );

        Arc::new(Self {
            config,
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            window: Mutex::new(VecDeque::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Wait until one more unit may start.
    ///
    /// Callers are served in the order they arrive.
    pub async fn admit(&self) -> Result<Admission> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BenchError::SchedulerStopped)?;

        self.wait_for_slot().await?;

        let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_running, Ordering::SeqCst);

        Ok(Admission {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }

    async fn wait_for_slot(&self) -> Result<()> {
        let mut window = self.window.lock().await;

        loop {
            if !self.is_running() {
                return Err(BenchError::SchedulerStopped);
            }

            let now = Instant::now();
            while window
                .front()
                .is_some_and(|started| now.duration_since(*started) >= self.config.rate_window)
            {
                window.pop_front();
            }

            if window.len() < self.config.rate_limit_max {
                window.push_back(now);
                return Ok(());
            }

            let oldest = window.front().copied().unwrap_or(now);
            let wait = self.config.rate_window.saturating_sub(now.duration_since(oldest));
            debug!(wait_ms = wait.as_millis() as u64, "rate window full");
            tokio::time::sleep(wait).await;
        }
    }

    /// Stop admitting work. Units already admitted run to completion.
    pub fn stop(&self) {
        if self.is_running() {
            self.permits.close();
            info!(in_flight = self.in_flight(), "scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.permits.is_closed()
    }

    /// Units currently holding an admission.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous admissions seen so far.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
