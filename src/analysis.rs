//! Sender analysis workflow
//!
//! Counts inbox messages per sender and writes an `Email | Count` table to the
//! analysis spreadsheet. Message ids are listed page by page up to the inbox
//! total, then every id is resolved to its sender through the retry queue.

use indexmap::IndexMap;
use indicatif::ProgressBar;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::GmailClient;
use crate::config::{require_spreadsheet_id, Config};
use crate::error::Result;
use crate::models::{RunReport, SenderCount, TaskOutcome, TaskResult, WorkItem};
use crate::queue::{with_backoff, BoundedRetryQueue, RetryPolicy};
use crate::report;
use crate::sheets::{self, SheetsClient};

pub const WORKFLOW: &str = "analysis";

/// Restricts listing to the messages counted by `inbox_total`
pub const INBOX_QUERY: &str = "in:inbox";

pub const TABLE_HEADER: [&str; 2] = ["Email", "Count"];

pub async fn run(
    gmail: &dyn GmailClient,
    sheets: &dyn SheetsClient,
    config: &Config,
    progress: Option<&ProgressBar>,
) -> Result<RunReport> {
    let mut run_report = RunReport::new(WORKFLOW);
    let spreadsheet_id = require_spreadsheet_id(
        &config.sheets.analysis_spreadsheet_id,
        "sheets.analysis_spreadsheet_id (SHEET_ID_FETCH)",
    )?;
    let policy = config.queue.retry_policy();

    info!("Fetching total email count...");
    let total = gmail.inbox_total().await?;
    info!("Total emails in inbox: {}", total);

    let message_ids = list_inbox_ids(
        gmail,
        config.analysis.page_size,
        usize::try_from(total).unwrap_or(usize::MAX),
        &policy,
    )
    .await?;

    let queue = BoundedRetryQueue::new(config.analysis.concurrency, policy);
    let on_progress = report::progress_callback(progress, message_ids.len());

    info!("Resolving senders for {} messages...", message_ids.len());
    let results = queue
        .run_with_progress(
            WorkItem::enumerate(message_ids),
            |item: WorkItem<String>| async move { resolve_sender(gmail, &item.payload).await },
            on_progress,
        )
        .await;

    run_report.record_results(&results);
    if run_report.failed > 0 {
        warn!(
            "{} messages could not be resolved and are left out of the counts",
            run_report.failed
        );
    }

    let counts = aggregate_sender_counts(&results);
    let table = analysis_table(&counts);
    let range = sheets::table_range(&config.sheets.sheet_name, table.len());

    info!("Writing {} senders to range {}", counts.len(), range);
    sheets.write_range(spreadsheet_id, &range, table).await?;
    run_report.rows_written = counts.len();

    run_report.finish();
    info!("Analysis complete: {} senders from {} messages", counts.len(), run_report.items);
    Ok(run_report)
}

/// Page through inbox message ids until `total` ids are collected or the
/// listing runs out
pub async fn list_inbox_ids(
    gmail: &dyn GmailClient,
    page_size: u32,
    total: usize,
    policy: &RetryPolicy,
) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut page_token: Option<String> = None;

    while ids.len() < total {
        let token = page_token.take();
        let (page, _) = with_backoff(policy, "message page", || {
            gmail.list_messages_page(INBOX_QUERY, page_size, token.clone())
        })
        .await;
        let page = page?;

        let remaining = total - ids.len();
        ids.extend(page.ids.into_iter().take(remaining));
        info!("Fetched {}/{} messages", ids.len(), total);

        match page.next_page_token {
            Some(next) => page_token = Some(next),
            None => break,
        }
    }

    Ok(ids)
}

/// Sender address of one message; `NoData` when it has no usable `From`
pub async fn resolve_sender(gmail: &dyn GmailClient, message_id: &str) -> Result<TaskOutcome<String>> {
    Ok(match gmail.get_sender(message_id).await? {
        Some(email) => TaskOutcome::Success(email),
        None => TaskOutcome::NoData,
    })
}

/// Count resolved senders, ordered by first appearance in the message list
pub fn aggregate_sender_counts(results: &[TaskResult<String>]) -> Vec<SenderCount> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();

    for result in results {
        if let TaskOutcome::Success(email) = &result.outcome {
            *counts.entry(email.as_str()).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|(email, count)| SenderCount {
            email: email.to_string(),
            count,
        })
        .collect()
}

/// Header row followed by one row per sender
pub fn analysis_table(counts: &[SenderCount]) -> Vec<Vec<Value>> {
    let header = TABLE_HEADER.iter().map(|h| Value::from(*h)).collect();

    std::iter::once(header)
        .chain(
            counts
                .iter()
                .map(|c| vec![Value::from(c.email.as_str()), Value::from(c.count)]),
        )
        .collect()
}
