//! Bounded-concurrency task queue with exponential backoff on rate limits
//!
//! Every workflow pushes its per-sender or per-message work through
//! [`BoundedRetryQueue::run`]. The queue:
//! - starts tasks in input order, keeping at most `concurrency` in flight
//! - retries a task that failed with a rate-limit error, sleeping
//!   `initial_delay * 2^attempt` before each re-attempt
//! - records any other error as a failed outcome without retrying
//! - always returns exactly one [`TaskResult`] per input item
//!
//! All tasks are polled from the caller's task via `buffer_unordered`, so the
//! batch runs cooperatively on one logical thread and results are collected
//! without locking.

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{TaskOutcome, TaskResult, WorkItem};

/// Progress callback invoked once per settled item
pub type ProgressCallback = Arc<dyn Fn() + Send + Sync>;

/// Retry policy for rate-limited tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Base delay; retry `k` waits `initial_delay * 2^k`
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Delay applied before re-attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(1000))
    }
}

/// Per-task retry bookkeeping, dropped when the task settles
#[derive(Debug)]
struct RetryState {
    attempt: u32,
    next_delay: Duration,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 0,
            next_delay: Duration::ZERO,
        }
    }

    /// Count a rate-limited attempt. Returns false once the budget is spent.
    fn advance(&mut self, policy: &RetryPolicy) -> bool {
        self.attempt += 1;
        if self.attempt > policy.max_retries {
            return false;
        }
        self.next_delay = policy.delay_for(self.attempt);
        true
    }
}

/// Runs a fixed batch of independent async tasks under a concurrency cap
#[derive(Debug, Clone)]
pub struct BoundedRetryQueue {
    concurrency: usize,
    policy: RetryPolicy,
}

impl BoundedRetryQueue {
    /// Create a queue. A concurrency of zero is treated as one.
    pub fn new(concurrency: usize, policy: RetryPolicy) -> Self {
        Self {
            concurrency: concurrency.max(1),
            policy,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `task` for every item and collect one result per item, in input order.
    pub async fn run<P, T, F, Fut>(&self, items: Vec<WorkItem<P>>, task: F) -> Vec<TaskResult<T>>
    where
        P: Clone,
        F: Fn(WorkItem<P>) -> Fut,
        Fut: Future<Output = Result<TaskOutcome<T>>>,
    {
        self.run_with_progress(items, task, None).await
    }

    /// Same as [`run`](Self::run), calling `on_progress` as each item settles.
    pub async fn run_with_progress<P, T, F, Fut>(
        &self,
        items: Vec<WorkItem<P>>,
        task: F,
        on_progress: Option<ProgressCallback>,
    ) -> Vec<TaskResult<T>>
    where
        P: Clone,
        F: Fn(WorkItem<P>) -> Fut,
        Fut: Future<Output = Result<TaskOutcome<T>>>,
    {
        let total = items.len();
        debug!(
            "Running {} tasks with concurrency {} and up to {} retries",
            total, self.concurrency, self.policy.max_retries
        );

        let mut slots: Vec<Option<TaskResult<T>>> = (0..total).map(|_| None).collect();
        let task = &task;

        let mut settled = stream::iter(items.into_iter().enumerate())
            .map(|(slot, item)| async move { (slot, self.execute(item, task).await) })
            .buffer_unordered(self.concurrency);

        while let Some((slot, result)) = settled.next().await {
            slots[slot] = Some(result);
            if let Some(on_progress) = &on_progress {
                on_progress();
            }
        }

        let results: Vec<TaskResult<T>> = slots.into_iter().flatten().collect();
        debug_assert_eq!(results.len(), total);
        results
    }

    /// Drive a single item to a terminal outcome
    async fn execute<P, T, F, Fut>(&self, item: WorkItem<P>, task: &F) -> TaskResult<T>
    where
        P: Clone,
        F: Fn(WorkItem<P>) -> Fut,
        Fut: Future<Output = Result<TaskOutcome<T>>>,
    {
        let position = item.position;
        let context = format!("item {}", position);
        let (result, attempts) =
            with_backoff(&self.policy, &context, || task(item.clone())).await;

        let outcome = match result {
            Ok(outcome) => outcome,
            // with_backoff only hands back a rate limit once the budget is spent
            Err(e) if e.is_rate_limited() => TaskOutcome::exhausted(),
            Err(e) => {
                warn!("Item {} failed: {}", position, e);
                TaskOutcome::Failed(e.to_string())
            }
        };

        TaskResult {
            position,
            outcome,
            attempts,
        }
    }
}

/// Run `operation`, retrying rate-limit failures per `policy`
///
/// Returns the last result together with the number of attempts made. Any
/// error other than a rate limit is returned after the attempt that hit it.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    mut operation: F,
) -> (Result<T>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut state = RetryState::new();

    loop {
        let attempts = state.attempt + 1;

        match operation().await {
            Err(e) if e.is_rate_limited() => {
                if !state.advance(policy) {
                    warn!(
                        "{} still rate limited after {} retries, giving up",
                        context, policy.max_retries
                    );
                    return (Err(e), attempts);
                }

                warn!(
                    "Rate limit exceeded for {}, retrying in {:?} (retry {}/{})",
                    context, state.next_delay, state.attempt, policy.max_retries
                );
                tokio::time::sleep(state.next_delay).await;
            }
            result => return (result, attempts),
        }
    }
}
