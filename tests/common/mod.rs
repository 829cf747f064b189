//! Common test utilities and fixtures
#![allow(dead_code)]

use gmail_sheet_workflows::client::{GmailClient, LabelInfo, MessagePage};
use gmail_sheet_workflows::config::Config;
use gmail_sheet_workflows::error::Result;
use gmail_sheet_workflows::sheets::{CellUpdate, SheetsClient};
use mockall::mock;
use serde_json::Value;

pub const ANALYSIS_SHEET: &str = "analysis-sheet";
pub const LABEL_SHEET: &str = "label-sheet";
pub const UNSUBSCRIBE_SHEET: &str = "unsubscribe-sheet";

/// Config with every spreadsheet id set and a short backoff
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.sheets.analysis_spreadsheet_id = ANALYSIS_SHEET.to_string();
    config.sheets.label_spreadsheet_id = LABEL_SHEET.to_string();
    config.sheets.unsubscribe_spreadsheet_id = UNSUBSCRIBE_SHEET.to_string();
    config.queue.max_retries = 3;
    config.queue.initial_backoff_ms = 100;
    config
}

/// Single-column rows as returned by a `values.get` on `A2:A`
pub fn column(cells: &[&str]) -> Vec<Vec<String>> {
    cells.iter().map(|cell| vec![cell.to_string()]).collect()
}

/// A `messages.list` page
pub fn page(ids: &[&str], next_page_token: Option<&str>) -> MessagePage {
    MessagePage {
        ids: ids.iter().map(|id| id.to_string()).collect(),
        next_page_token: next_page_token.map(str::to_string),
    }
}

/// Create a test LabelInfo
pub fn create_test_label_info(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Status cell update as produced by the flush step
pub fn status(range: &str, value: &str) -> CellUpdate {
    CellUpdate {
        range: range.to_string(),
        value: value.to_string(),
    }
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn inbox_total(&self) -> Result<u64>;
        async fn list_messages_page(
            &self,
            query: &str,
            page_size: u32,
            page_token: Option<String>,
        ) -> Result<MessagePage>;
        async fn get_sender(&self, message_id: &str) -> Result<Option<String>>;
        async fn get_message_id(&self, message_id: &str) -> Result<String>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, name: &str) -> Result<String>;
        async fn batch_add_label(&self, message_ids: &[String], label_id: &str) -> Result<usize>;
    }
}

// Mock implementation of SheetsClient for testing
mock! {
    pub SheetsClient {}

    #[async_trait::async_trait]
    impl SheetsClient for SheetsClient {
        async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>>;
        async fn batch_write(&self, spreadsheet_id: &str, updates: Vec<CellUpdate>) -> Result<()>;
        async fn write_range(
            &self,
            spreadsheet_id: &str,
            range: &str,
            rows: Vec<Vec<Value>>,
        ) -> Result<()>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_config_is_valid() {
        let config = test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.sheets.label_spreadsheet_id, LABEL_SHEET);
    }

    #[test]
    fn test_page() {
        let page = page(&["m1", "m2"], Some("token123"));
        assert_eq!(page.ids, vec!["m1", "m2"]);
        assert_eq!(page.next_page_token.as_deref(), Some("token123"));
    }

    #[test]
    fn test_column() {
        assert_eq!(column(&["a@x.com"]), vec![vec!["a@x.com".to_string()]]);
    }
}
