//! Config loading against the real process environment
//!
//! These tests mutate environment variables, so they run serially.

use gmail_sheet_workflows::config::Config;
use gmail_sheet_workflows::error::AutomationError;
use serial_test::serial;
use tempfile::TempDir;

const VARS: &[&str] = &[
    "SHEET_ID_FETCH",
    "SHEET_ID_LABEL",
    "SHEET_ID_UNSUBSCRIBE",
    "PQ_CONCURRENCY_ANALYSIS",
    "PQ_CONCURRENCY_ASSIGN_LABEL",
    "PQ_CONCURRENCY_UNSUB",
    "REDIRECT_URI_PORT",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[tokio::test]
#[serial]
async fn test_environment_overrides_file_values() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    tokio::fs::write(
        &path,
        r#"
[sheets]
label_spreadsheet_id = "from-file"

[labeling]
concurrency = 3
"#,
    )
    .await
    .unwrap();

    std::env::set_var("SHEET_ID_LABEL", "from-env");
    std::env::set_var("PQ_CONCURRENCY_ASSIGN_LABEL", "7");
    std::env::set_var("REDIRECT_URI_PORT", "9090");

    let config = Config::load(&path).await;
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.sheets.label_spreadsheet_id, "from-env");
    assert_eq!(config.labeling.concurrency, 7);
    assert_eq!(config.auth.redirect_port, 9090);
    assert_eq!(config.unsubscribe.concurrency, 5);
}

#[tokio::test]
#[serial]
async fn test_missing_file_uses_defaults_and_environment() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");

    std::env::set_var("SHEET_ID_FETCH", "analysis-id");

    let config = Config::load(&path).await;
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.sheets.analysis_spreadsheet_id, "analysis-id");
    assert_eq!(config.analysis.concurrency, 10);
    assert_eq!(config.labeling.label_name, "to be deleted");
}

#[tokio::test]
#[serial]
async fn test_out_of_range_environment_value_fails_validation() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");

    std::env::set_var("PQ_CONCURRENCY_UNSUB", "0");

    let result = Config::load(&path).await;
    clear_env();

    match result {
        Err(AutomationError::ConfigError(msg)) => {
            assert!(msg.contains("unsubscribe.concurrency must be at least 1"))
        }
        other => panic!("unexpected result {:?}", other),
    }
}
