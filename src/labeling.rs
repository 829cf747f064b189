//! Deletion labeling workflow
//!
//! Reads sender addresses from the label spreadsheet, applies the configured
//! label to every message from each sender and writes one status per row.

use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::client::{list_message_ids, sender_query, GmailClient};
use crate::config::{require_spreadsheet_id, Config};
use crate::error::Result;
use crate::label_manager::LabelManager;
use crate::models::{RunReport, TaskOutcome, WorkItem};
use crate::queue::BoundedRetryQueue;
use crate::report::{self, LABELING_STATUS};
use crate::sheets::{self, SheetsClient};

pub const WORKFLOW: &str = "labeling";

/// Label every message from every sender listed in the label spreadsheet
pub async fn run(
    gmail: &dyn GmailClient,
    sheets: &dyn SheetsClient,
    config: &Config,
    progress: Option<&ProgressBar>,
) -> Result<RunReport> {
    let mut run_report = RunReport::new(WORKFLOW);
    let spreadsheet_id = require_spreadsheet_id(
        &config.sheets.label_spreadsheet_id,
        "sheets.label_spreadsheet_id (SHEET_ID_LABEL)",
    )?;
    let sheet_name = &config.sheets.sheet_name;

    info!("Reading emails from Google Sheet...");
    let emails = sheets::read_unique_emails(sheets, spreadsheet_id, sheet_name).await?;
    info!("Found {} unique emails to label", emails.len());

    if emails.is_empty() {
        info!("No emails found in the sheet");
        run_report.finish();
        return Ok(run_report);
    }

    let mut labels = LabelManager::new(gmail);
    let label_id = labels.get_or_create_label(&config.labeling.label_name).await?;

    let queue = BoundedRetryQueue::new(config.labeling.concurrency, config.queue.retry_policy());
    let page_size = config.labeling.page_size;
    let on_progress = report::progress_callback(progress, emails.len());

    let results = queue
        .run_with_progress(
            WorkItem::enumerate(emails),
            |item: WorkItem<String>| {
                let label_id = &label_id;
                async move { label_sender(gmail, label_id, page_size, &item.payload).await }
            },
            on_progress,
        )
        .await;

    run_report.record_results(&results);

    let updates = report::build_status_updates(&results, &LABELING_STATUS);
    run_report.rows_written =
        report::flush_statuses(sheets, spreadsheet_id, sheet_name, updates).await?;

    run_report.finish();
    info!(
        "Labeling complete: {} labeled, {} without messages, {} failed",
        run_report.succeeded, run_report.no_data, run_report.failed
    );
    Ok(run_report)
}

/// Apply `label_id` to all messages from `email`
///
/// Succeeds with the number of messages labeled, or `NoData` when the sender
/// has no messages.
pub async fn label_sender(
    gmail: &dyn GmailClient,
    label_id: &str,
    page_size: u32,
    email: &str,
) -> Result<TaskOutcome<usize>> {
    let message_ids = list_message_ids(gmail, &sender_query(email), page_size, None).await?;

    if message_ids.is_empty() {
        debug!("No messages found from {}", email);
        return Ok(TaskOutcome::NoData);
    }

    let labeled = gmail.batch_add_label(&message_ids, label_id).await?;
    info!("Labeled {} messages from {}", labeled, email);
    Ok(TaskOutcome::Success(labeled))
}
