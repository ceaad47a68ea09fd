//! Concurrent fan-out of one search term to every configured source.
//!
//! Each source runs under its own deadline and settles independently: an error
//! or timeout is recorded for that source and never cancels its siblings.
//! Successive fan-outs are spaced by a minimum interval.

use crate::record::Record;
use crate::sources::RecordSource;
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How a single source settled.
#[derive(Debug)]
pub enum SourceStatus {
    Succeeded(Vec<Record>),
    Failed(String),
    TimedOut,
}

/// Outcome of one source in one fan-out.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source: String,
    pub status: SourceStatus,
    pub elapsed: Duration,
}

impl SourceOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, SourceStatus::Succeeded(_))
    }
}

/// All source outcomes of one fan-out, in source order.
#[derive(Debug, Default)]
pub struct FanOutResult {
    pub outcomes: Vec<SourceOutcome>,
}

impl FanOutResult {
    pub fn sources_total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn sources_succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    /// Union of every successful source's records.
    pub fn into_records(self) -> Vec<Record> {
        self.outcomes
            .into_iter()
            .flat_map(|o| match o.status {
                SourceStatus::Succeeded(records) => records,
                SourceStatus::Failed(_) | SourceStatus::TimedOut => Vec::new(),
            })
            .collect()
    }
}

/// Minimum-interval gate between calls.
///
/// Callers queue on the lock and each waits out whatever is left of the
/// interval since the previous call was dispatched.
pub struct Throttle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!(wait_ms = remaining.as_millis() as u64, "Throttling fan-out");
                tokio::time::sleep(remaining).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Queries every source concurrently for the same term.
pub struct FanOut {
    sources: Vec<Box<dyn RecordSource>>,
    source_timeout: Duration,
    throttle: Throttle,
}

impl FanOut {
    pub fn new(
        sources: Vec<Box<dyn RecordSource>>,
        source_timeout: Duration,
        min_interval: Duration,
    ) -> Self {
        Self {
            sources,
            source_timeout,
            throttle: Throttle::new(min_interval),
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Query all sources and wait until each has answered or hit its deadline.
    pub async fn search(&self, term: &str) -> FanOutResult {
        self.throttle.wait().await;

        info!(query = term, sources = self.sources.len(), "Starting fan-out");

        let tasks = self.sources.iter().map(|source| async move {
            let started = Instant::now();
            let status = match tokio::time::timeout(self.source_timeout, source.search(term)).await {
                Ok(Ok(records)) => {
                    debug!(source = source.name(), count = records.len(), "Source succeeded");
                    SourceStatus::Succeeded(records)
                }
                Ok(Err(e)) => {
                    warn!(source = source.name(), error = %e, "Source failed");
                    SourceStatus::Failed(e.to_string())
                }
                Err(_) => {
                    warn!(
                        source = source.name(),
                        timeout_secs = self.source_timeout.as_secs_f64(),
                        "Source timed out"
                    );
                    SourceStatus::TimedOut
                }
            };
            SourceOutcome {
                source: source.name().to_string(),
                status,
                elapsed: started.elapsed(),
            }
        });

        let result = FanOutResult {
            outcomes: join_all(tasks).await,
        };

        info!(
            query = term,
            succeeded = result.sources_succeeded(),
            total = result.sources_total(),
            "Fan-out complete"
        );
        result
    }
}
