//! Unsubscribe lookup workflow
//!
//! For each sender in the unsubscribe spreadsheet, finds the most recent
//! message and records whether one exists.

use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::client::{sender_query, GmailClient};
use crate::config::{require_spreadsheet_id, Config};
use crate::error::Result;
use crate::models::{RunReport, TaskOutcome, WorkItem};
use crate::queue::BoundedRetryQueue;
use crate::report::{self, UNSUBSCRIBE_STATUS};
use crate::sheets::{self, SheetsClient};

pub const WORKFLOW: &str = "unsubscribe";

pub async fn run(
    gmail: &dyn GmailClient,
    sheets: &dyn SheetsClient,
    config: &Config,
    progress: Option<&ProgressBar>,
) -> Result<RunReport> {
    let mut run_report = RunReport::new(WORKFLOW);
    let spreadsheet_id = require_spreadsheet_id(
        &config.sheets.unsubscribe_spreadsheet_id,
        "sheets.unsubscribe_spreadsheet_id (SHEET_ID_UNSUBSCRIBE)",
    )?;
    let sheet_name = &config.sheets.sheet_name;

    info!("Reading unsubscribes from Google Sheet...");
    let emails = sheets::read_unique_emails(sheets, spreadsheet_id, sheet_name).await?;
    info!("Found {} unique emails to unsubscribe", emails.len());

    if emails.is_empty() {
        info!("No emails to unsubscribe found in the sheet");
        run_report.finish();
        return Ok(run_report);
    }

    let queue = BoundedRetryQueue::new(
        config.unsubscribe.concurrency,
        config.queue.retry_policy(),
    );
    let on_progress = report::progress_callback(progress, emails.len());

    let results = queue
        .run_with_progress(
            WorkItem::enumerate(emails),
            |item: WorkItem<String>| async move { latest_message(gmail, &item.payload).await },
            on_progress,
        )
        .await;

    run_report.record_results(&results);

    let updates = report::build_status_updates(&results, &UNSUBSCRIBE_STATUS);
    run_report.rows_written =
        report::flush_statuses(sheets, spreadsheet_id, sheet_name, updates).await?;

    run_report.finish();
    info!(
        "Unsubscribe lookup complete: {} found, {} without messages, {} failed",
        run_report.succeeded, run_report.no_data, run_report.failed
    );
    Ok(run_report)
}

/// Id of the newest message from `email`, or `NoData` if there is none
pub async fn latest_message(gmail: &dyn GmailClient, email: &str) -> Result<TaskOutcome<String>> {
    // messages.list returns newest first
    let page = gmail.list_messages_page(&sender_query(email), 1, None).await?;

    let Some(message_id) = page.ids.into_iter().next() else {
        debug!("No messages found from {}", email);
        return Ok(TaskOutcome::NoData);
    };

    let id = gmail.get_message_id(&message_id).await?;
    info!("Latest message from {}: ID {}", email, id);
    Ok(TaskOutcome::Success(id))
}
