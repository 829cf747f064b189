//! Google Sheets access: reading sender lists and writing statuses

use async_trait::async_trait;
use google_sheets4::api::{BatchUpdateValuesRequest, ValueRange};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::auth::{SheetsHub, SHEETS_SCOPE};
use crate::error::{AutomationError, Result};

/// Sender lists start below a header row
pub const FIRST_DATA_ROW: u32 = 2;

/// Statuses are written next to each address
pub const STATUS_COLUMN: &str = "B";

/// A single-cell write in A1 notation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub range: String,
    pub value: String,
}

/// Spreadsheet operations the workflows depend on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SheetsClient: Send + Sync {
    /// Read a range as rows of display strings
    async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>>;

    /// Write many single cells in one `values.batchUpdate` call
    async fn batch_write(&self, spreadsheet_id: &str, updates: Vec<CellUpdate>) -> Result<()>;

    /// Overwrite a rectangular range with `rows`
    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<()>;
}

/// `Sheet1!A2:A`: the address column below the header
pub fn input_range(sheet: &str) -> String {
    format!("{}!A{}:A", sheet, FIRST_DATA_ROW)
}

/// `Sheet1!B7`: the status cell for a 1-based row
pub fn status_range(sheet: &str, row: u32) -> String {
    format!("{}!{}{}", sheet, STATUS_COLUMN, row)
}

/// `Sheet1!A1:B<rows>`: a two-column table anchored at A1
pub fn table_range(sheet: &str, rows: usize) -> String {
    format!("{}!A1:B{}", sheet, rows.max(1))
}

/// Spreadsheet row for an item's position in the deduplicated list
///
/// Rows are not traced back to the source cell, so blanks or duplicates in
/// the address column shift later statuses upward.
pub fn row_for_position(position: usize) -> u32 {
    FIRST_DATA_ROW + position as u32
}

/// Flatten rows into trimmed, non-blank, unique addresses in first-seen order
///
/// Comparison is exact after trimming, so `A@x.com` and `a@x.com` are kept
/// as two entries.
pub fn unique_emails(rows: Vec<Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .flatten()
        .map(|cell| cell.trim().to_string())
        .filter(|email| !email.is_empty())
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

/// Read a sheet's address column and deduplicate it
///
/// Any read failure is reported as a [`AutomationError::SheetError`].
pub async fn read_unique_emails(
    client: &dyn SheetsClient,
    spreadsheet_id: &str,
    sheet: &str,
) -> Result<Vec<String>> {
    let range = input_range(sheet);
    let rows = client
        .read_range(spreadsheet_id, &range)
        .await
        .map_err(|e| AutomationError::SheetError(format!("Failed to read {}: {}", range, e)))?;

    let emails = unique_emails(rows);
    debug!("Read {} unique addresses from {}", emails.len(), range);
    Ok(emails)
}

/// Render a cell value the way the Sheets UI displays it
fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Production Sheets client backed by the generated API hub
pub struct ProductionSheetsClient {
    hub: SheetsHub,
}

impl ProductionSheetsClient {
    pub fn new(hub: SheetsHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl SheetsClient for ProductionSheetsClient {
    async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let (_, value_range) = self
            .hub
            .spreadsheets()
            .values_get(spreadsheet_id, range)
            .add_scope(SHEETS_SCOPE)
            .doit()
            .await
            .map_err(AutomationError::from_sheets)?;

        let rows: Vec<Vec<String>> = value_range
            .values
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect();

        debug!("Read {} rows from {}", rows.len(), range);
        Ok(rows)
    }

    async fn batch_write(&self, spreadsheet_id: &str, updates: Vec<CellUpdate>) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let count = updates.len();
        let data = updates
            .into_iter()
            .map(|update| ValueRange {
                range: Some(update.range),
                values: Some(vec![vec![Value::String(update.value)]]),
                ..Default::default()
            })
            .collect();

        let request = BatchUpdateValuesRequest {
            data: Some(data),
            value_input_option: Some("RAW".to_string()),
            ..Default::default()
        };

        self.hub
            .spreadsheets()
            .values_batch_update(request, spreadsheet_id)
            .add_scope(SHEETS_SCOPE)
            .doit()
            .await
            .map_err(AutomationError::from_sheets)?;

        debug!("Batch wrote {} cells", count);
        Ok(())
    }

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<()> {
        let request = ValueRange {
            range: Some(range.to_string()),
            values: Some(rows),
            ..Default::default()
        };

        self.hub
            .spreadsheets()
            .values_update(request, spreadsheet_id, range)
            .value_input_option("RAW")
            .add_scope(SHEETS_SCOPE)
            .doit()
            .await
            .map_err(AutomationError::from_sheets)?;

        debug!("Wrote range {}", range);
        Ok(())
    }
}
