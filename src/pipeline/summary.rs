// src/pipeline/summary.rs
// =============================================================================
// What a run produced, and how the orchestrator knows it is done.
//
// Every report task sends exactly one ReportOutcome on an unbounded channel.
// The CompletionBarrier counts those outcomes against the number of tasks
// submitted. It stops when:
// - every submitted task has reported, or
// - the deadline passes (the rest are counted as unfinished), or
// - every sender is gone (nothing more can arrive).
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::error::ReportError;

/// Result of one report task.
#[derive(Debug)]
pub struct ReportOutcome {
    url: Url,
    result: Result<PathBuf, ReportError>,
}

impl ReportOutcome {
    pub fn new(url: Url, result: Result<PathBuf, ReportError>) -> Self {
        Self { url, result }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn result(&self) -> &Result<PathBuf, ReportError> {
        &self.result
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The written report, if the task succeeded.
    pub fn path(&self) -> Option<&Path> {
        self.result.as_ref().ok().map(PathBuf::as_path)
    }

    pub fn error(&self) -> Option<&ReportError> {
        self.result.as_ref().err()
    }
}

/// Flat, serializable view of one outcome (for `--json` output).
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeRecord {
    pub url: String,
    pub file: Option<String>,
    pub error: Option<String>,
}

/// Totals of a finished run.
#[derive(Debug, Default)]
pub struct RunSummary {
    outcomes: Vec<ReportOutcome>,
    duplicates: usize,
    unfinished: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: ReportOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }

    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = ReportOutcome>) {
        self.outcomes.extend(outcomes);
    }

    pub fn set_unfinished(&mut self, unfinished: usize) {
        self.unfinished = unfinished;
    }

    pub fn outcomes(&self) -> &[ReportOutcome] {
        &self.outcomes
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// URLs delivered more than once and skipped.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Report tasks that had not finished when the barrier gave up.
    pub fn unfinished(&self) -> usize {
        self.unfinished
    }

    /// True when nothing failed and nothing was left behind.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.unfinished == 0
    }

    /// One record per outcome, sorted by URL.
    pub fn records(&self) -> Vec<OutcomeRecord> {
        let mut records: Vec<OutcomeRecord> = self
            .outcomes
            .iter()
            .map(|outcome| OutcomeRecord {
                url: outcome.url().to_string(),
                file: outcome.path().map(|p| p.display().to_string()),
                error: outcome.error().map(|e| e.to_string()),
            })
            .collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        records
    }
}

/// Counts report outcomes until every submitted task has answered.
pub(crate) struct CompletionBarrier {
    receiver: mpsc::UnboundedReceiver<ReportOutcome>,
    expected: usize,
}

impl CompletionBarrier {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<ReportOutcome>) -> Self {
        Self {
            receiver,
            expected: 0,
        }
    }

    /// Registers one more submitted report task.
    pub(crate) fn expect_one(&mut self) {
        self.expected += 1;
    }

    pub(crate) fn expected(&self) -> usize {
        self.expected
    }

    /// Collects outcomes. Returns them with the number of tasks that never
    /// answered.
    pub(crate) async fn wait(mut self, timeout: Duration) -> (Vec<ReportOutcome>, usize) {
        let deadline = Instant::now() + timeout;
        let mut outcomes = Vec::with_capacity(self.expected);

        while outcomes.len() < self.expected {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {
                    debug!("Every report task is gone");
                    break;
                }
                Err(_) => {
                    warn!(
                        after = ?timeout,
                        done = outcomes.len(),
                        expected = self.expected,
                        "Gave up waiting for report tasks"
                    );
                    break;
                }
            }
        }

        let unfinished = self.expected - outcomes.len();
        (outcomes, unfinished)
    }
}
