//! Turning settled task results into spreadsheet status writes

use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::Result;
use crate::models::{StatusUpdate, TaskOutcome, TaskResult, EXHAUSTED_RETRIES};
use crate::queue::ProgressCallback;
use crate::sheets::{self, CellUpdate, SheetsClient};

/// Status strings a workflow writes for its non-failure outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTexts {
    pub success: &'static str,
    pub no_data: &'static str,
}

pub const LABELING_STATUS: StatusTexts = StatusTexts {
    success: "Labeled successfully",
    no_data: "No messages found",
};

pub const UNSUBSCRIBE_STATUS: StatusTexts = StatusTexts {
    success: "Unsubscribed successfully",
    no_data: "No messages found",
};

pub const FAILED_AFTER_RETRIES: &str = "Failed after retries";

/// Text written to the status cell for one outcome
pub fn status_text<T>(outcome: &TaskOutcome<T>, texts: &StatusTexts) -> String {
    match outcome {
        TaskOutcome::Success(_) => texts.success.to_string(),
        TaskOutcome::NoData => texts.no_data.to_string(),
        TaskOutcome::Failed(reason) if reason == EXHAUSTED_RETRIES => {
            FAILED_AFTER_RETRIES.to_string()
        }
        TaskOutcome::Failed(reason) => format!("Error: {}", reason),
    }
}

/// One status row per result, placed by the item's input position
pub fn build_status_updates<T>(results: &[TaskResult<T>], texts: &StatusTexts) -> Vec<StatusUpdate> {
    results
        .iter()
        .map(|result| StatusUpdate {
            row: sheets::row_for_position(result.position),
            status: status_text(&result.outcome, texts),
        })
        .collect()
}

/// Size `progress` for a batch and tick it once per settled item
pub fn progress_callback(progress: Option<&ProgressBar>, items: usize) -> Option<ProgressCallback> {
    progress.map(|pb| {
        pb.set_length(items as u64);
        pb.set_position(0);
        let pb = pb.clone();
        Arc::new(move || pb.inc(1)) as ProgressCallback
    })
}

/// Write every status in a single batch call
///
/// A failed write is logged and returned; it is not retried.
pub async fn flush_statuses(
    client: &dyn SheetsClient,
    spreadsheet_id: &str,
    sheet_name: &str,
    updates: Vec<StatusUpdate>,
) -> Result<usize> {
    let count = updates.len();
    let cells: Vec<CellUpdate> = updates
        .into_iter()
        .map(|update| CellUpdate {
            range: sheets::status_range(sheet_name, update.row),
            value: update.status,
        })
        .collect();

    match client.batch_write(spreadsheet_id, cells).await {
        Ok(()) => {
            info!("Successfully updated Google Sheet with {} statuses", count);
            Ok(count)
        }
        Err(e) => {
            error!("Failed to batch update the Google Sheet with statuses: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AutomationError;
    use crate::sheets::MockSheetsClient;
    use mockall::predicate::*;

    fn result(position: usize, outcome: TaskOutcome<usize>) -> TaskResult<usize> {
        TaskResult {
            position,
            outcome,
            attempts: 1,
        }
    }

    #[test]
    fn test_status_text() {
        assert_eq!(
            status_text(&TaskOutcome::Success(3usize), &LABELING_STATUS),
            "Labeled successfully"
        );
        assert_eq!(
            status_text(&TaskOutcome::<usize>::NoData, &UNSUBSCRIBE_STATUS),
            "No messages found"
        );
        assert_eq!(
            status_text(&TaskOutcome::<usize>::exhausted(), &LABELING_STATUS),
            "Failed after retries"
        );
        assert_eq!(
            status_text(
                &TaskOutcome::<usize>::Failed("Access forbidden: HTTP 403".to_string()),
                &LABELING_STATUS
            ),
            "Error: Access forbidden: HTTP 403"
        );
    }

    #[test]
    fn test_build_status_updates_uses_positions() {
        let results = vec![
            result(0, TaskOutcome::Success(2)),
            result(1, TaskOutcome::NoData),
            result(2, TaskOutcome::exhausted()),
        ];

        let updates = build_status_updates(&results, &LABELING_STATUS);
        assert_eq!(
            updates,
            vec![
                StatusUpdate { row: 2, status: "Labeled successfully".to_string() },
                StatusUpdate { row: 3, status: "No messages found".to_string() },
                StatusUpdate { row: 4, status: "Failed after retries".to_string() },
            ]
        );
    }

    #[test]
    fn test_progress_callback_ticks_bar() {
        let pb = ProgressBar::hidden();
        let tick = progress_callback(Some(&pb), 3).unwrap();
        tick();
        tick();
        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.position(), 2);

        assert!(progress_callback(None, 3).is_none());
    }

    #[tokio::test]
    async fn test_flush_writes_one_batch() {
        let mut mock = MockSheetsClient::new();
        mock.expect_batch_write()
            .with(
                eq("sheet-123"),
                eq(vec![
                    CellUpdate { range: "Sheet1!B2".to_string(), value: "Labeled successfully".to_string() },
                    CellUpdate { range: "Sheet1!B3".to_string(), value: "No messages found".to_string() },
                ]),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let updates = vec![
            StatusUpdate { row: 2, status: "Labeled successfully".to_string() },
            StatusUpdate { row: 3, status: "No messages found".to_string() },
        ];

        let written = flush_statuses(&mock, "sheet-123", "Sheet1", updates).await.unwrap();
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn test_flush_failure_is_surfaced() {
        let mut mock = MockSheetsClient::new();
        mock.expect_batch_write()
            .times(1)
            .returning(|_, _| Err(AutomationError::Forbidden("HTTP 403: Forbidden".to_string())));

        let updates = vec![StatusUpdate { row: 2, status: "x".to_string() }];
        let result = flush_statuses(&mock, "sheet-123", "Sheet1", updates).await;
        assert!(matches!(result, Err(AutomationError::Forbidden(_))));
    }
}
