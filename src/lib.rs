//! Gmail Sheet Workflows
//!
//! Spreadsheet-driven Gmail housekeeping: count inbox messages per sender,
//! label every message from a list of senders, and look up the latest message
//! from each sender on an unsubscribe list.
//!
//! # Overview
//!
//! Every workflow follows the same shape:
//! - **Input**: a list of work items (message ids, or sender addresses read
//!   from a Google Sheet and deduplicated)
//! - **Execution**: items run through a [`BoundedRetryQueue`] that caps the
//!   number of in-flight API calls and retries rate-limited calls with
//!   exponential backoff
//! - **Output**: one outcome per item, written back to the sheet in a single
//!   batch call
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_sheet_workflows::{auth, labeling, Config, ProductionGmailClient, ProductionSheetsClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let hubs = auth::initialize_hubs(
//!         "credentials.json".as_ref(),
//!         "token.json".as_ref(),
//!         config.auth.redirect_port,
//!     )
//!     .await?;
//!
//!     let gmail = ProductionGmailClient::new(hubs.gmail);
//!     let sheets = ProductionSheetsClient::new(hubs.sheets);
//!
//!     let report = labeling::run(&gmail, &sheets, &config, None).await?;
//!     println!("{} senders labeled", report.succeeded);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`analysis`] - Per-sender inbox counts
//! - [`auth`] - OAuth2 authentication and API hub initialization
//! - [`cli`] - Command-line interface and workflow orchestration
//! - [`client`] - Gmail API client
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`label_manager`] - Label lookup and creation
//! - [`labeling`] - Deletion labeling
//! - [`models`] - Core data structures
//! - [`queue`] - Bounded-concurrency retry queue
//! - [`report`] - Outcome to status mapping and the batch status write
//! - [`sheets`] - Google Sheets client
//! - [`unsubscribe`] - Latest-message lookup per sender

pub mod analysis;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod label_manager;
pub mod labeling;
pub mod models;
pub mod queue;
pub mod report;
pub mod sheets;
pub mod unsubscribe;

// Re-export commonly used types for convenience
pub use error::{AutomationError, Result};

// Core data models
pub use models::{RunReport, SenderCount, StatusUpdate, TaskOutcome, TaskResult, WorkItem};

// Queue
pub use queue::{BoundedRetryQueue, RetryPolicy};

// Config types
pub use config::{
    AnalysisConfig, AuthConfig, Config, LabelingConfig, QueueConfig, SheetsConfig,
    UnsubscribeConfig,
};

// Client traits
pub use client::{GmailClient, ProductionGmailClient};
pub use sheets::{ProductionSheetsClient, SheetsClient};

// Manager types
pub use label_manager::LabelManager;

// CLI types (for binary usage)
pub use cli::{Cli, Commands, ProgressReporter, Workflow};
