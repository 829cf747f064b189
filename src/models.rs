use chrono::{DateTime, Utc};

/// Reason recorded when an item stays rate limited past the retry budget
pub const EXHAUSTED_RETRIES: &str = "exhausted retries";

/// One unit of work submitted to the retry queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<T> {
    /// Ordinal position in the input list, used for result placement
    pub position: usize,
    pub payload: T,
}

impl<T> WorkItem<T> {
    pub fn new(position: usize, payload: T) -> Self {
        Self { position, payload }
    }

    /// Number a list of payloads in input order
    pub fn enumerate(payloads: impl IntoIterator<Item = T>) -> Vec<Self> {
        payloads
            .into_iter()
            .enumerate()
            .map(|(position, payload)| Self::new(position, payload))
            .collect()
    }
}

/// Final outcome of one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Success(T),
    /// The task found nothing to act on (e.g. zero messages from a sender)
    NoData,
    Failed(String),
}

impl<T> TaskOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    pub fn exhausted() -> Self {
        TaskOutcome::Failed(EXHAUSTED_RETRIES.to_string())
    }
}

/// Outcome of one work item together with its input position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult<T> {
    pub position: usize,
    pub outcome: TaskOutcome<T>,
    /// Task invocations made, including the first one
    pub attempts: u32,
}

impl<T> TaskResult<T> {
    /// Backoff delays incurred before the final attempt
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// A single status cell write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// 1-based spreadsheet row
    pub row: u32,
    pub status: String,
}

/// One row of the sender analysis table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderCount {
    pub email: String,
    pub count: usize,
}

/// Summary of one workflow run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub workflow: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: usize,
    pub succeeded: usize,
    pub no_data: usize,
    pub failed: usize,
    pub retries: u32,
    pub rows_written: usize,
}

impl RunReport {
    pub fn new(workflow: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            workflow: workflow.to_string(),
            started_at: now,
            finished_at: now,
            items: 0,
            succeeded: 0,
            no_data: 0,
            failed: 0,
            retries: 0,
            rows_written: 0,
        }
    }

    /// Tally the outcomes of a settled batch
    pub fn record_results<T>(&mut self, results: &[TaskResult<T>]) {
        self.items += results.len();
        for result in results {
            self.retries += result.retries();
            match result.outcome {
                TaskOutcome::Success(_) => self.succeeded += 1,
                TaskOutcome::NoData => self.no_data += 1,
                TaskOutcome::Failed(_) => self.failed += 1,
            }
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}
