//! Command-line interface

use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::auth;
use crate::client::ProductionGmailClient;
use crate::config::Config;
use crate::error::Result;
use crate::models::RunReport;
use crate::sheets::ProductionSheetsClient;
use crate::{analysis, labeling, unsubscribe};

#[derive(Parser, Debug)]
#[command(name = "gmail-sheets")]
#[command(version = "0.1.0")]
#[command(about = "Gmail sender analysis, labeling and unsubscribe lookups driven by Google Sheets", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = "token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with the Gmail and Sheets APIs
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Count inbox messages per sender and write the table to a sheet
    Analyze,

    /// Label every message from the senders listed in a sheet
    Label {
        /// Label to apply (overrides labeling.label_name)
        #[arg(long)]
        label_name: Option<String>,
    },

    /// Look up the latest message from each sender listed in a sheet
    Unsubscribe,

    /// Generate example configuration file
    InitConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// The three sheet-driven workflows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Analyze,
    Label,
    Unsubscribe,
}

impl Workflow {
    fn progress_message(&self) -> &'static str {
        match self {
            Workflow::Analyze => "Resolving senders",
            Workflow::Label => "Labeling senders",
            Workflow::Unsubscribe => "Finding latest messages",
        }
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }

    /// Share a `MultiProgress` with the log writer so log lines print above the bars
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Bar whose length is set once the workflow knows its item count
    pub fn add_progress_bar(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✓ {}", msg));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Load config, authenticate and run one workflow end to end
pub async fn run_workflow(
    cli: &Cli,
    workflow: Workflow,
    label_name: Option<String>,
    multi: MultiProgress,
) -> Result<RunReport> {
    let reporter = ProgressReporter::with_multi_progress(multi);

    let config_spinner = reporter.add_spinner("Loading configuration...");
    let mut config = Config::load(&cli.config).await?;
    if let Some(label_name) = label_name {
        config.labeling.label_name = label_name;
        config.validate()?;
    }
    reporter.finish_spinner(&config_spinner, &format!("Configuration loaded from {:?}", cli.config));

    let auth_spinner = reporter.add_spinner("Authenticating with Google APIs...");
    let hubs =
        auth::initialize_hubs(&cli.credentials, &cli.token_cache, config.auth.redirect_port).await?;
    reporter.finish_spinner(&auth_spinner, "Google APIs authenticated successfully");

    let gmail = ProductionGmailClient::new(hubs.gmail);
    let sheets = ProductionSheetsClient::new(hubs.sheets);

    let progress = reporter.add_progress_bar(workflow.progress_message());
    info!("Starting {:?} workflow", workflow);

    let result = match workflow {
        Workflow::Analyze => analysis::run(&gmail, &sheets, &config, Some(&progress)).await,
        Workflow::Label => labeling::run(&gmail, &sheets, &config, Some(&progress)).await,
        Workflow::Unsubscribe => unsubscribe::run(&gmail, &sheets, &config, Some(&progress)).await,
    };

    progress.finish_and_clear();
    result
}

/// Render the summary block printed after a workflow
pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str("\n========================================\n");
    out.push_str(&format!("{} Summary\n", capitalize(&report.workflow)));
    out.push_str("========================================\n");
    out.push_str(&format!("Run ID: {}\n", report.run_id));
    out.push_str(&format!("Duration: {} seconds\n", report.duration_seconds()));
    out.push_str(&format!("Items processed: {}\n", report.items));
    out.push_str(&format!("Succeeded: {}\n", report.succeeded));
    out.push_str(&format!("No data: {}\n", report.no_data));
    out.push_str(&format!("Failed: {}\n", report.failed));
    out.push_str(&format!("Rate-limit retries: {}\n", report.retries));
    out.push_str(&format!("Rows written: {}\n", report.rows_written));
    out.push_str("========================================");
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_command() {
        let cli = Cli::try_parse_from([
            "gmail-sheets",
            "--config",
            "custom.toml",
            "label",
            "--label-name",
            "cleanup",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.token_cache, PathBuf::from("token.json"));
        match cli.command {
            Commands::Label { label_name } => assert_eq!(label_name.as_deref(), Some("cleanup")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_workflow_commands() {
        let cli = Cli::try_parse_from(["gmail-sheets", "-v", "analyze"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Analyze));

        let cli = Cli::try_parse_from(["gmail-sheets", "unsubscribe"]).unwrap();
        assert!(matches!(cli.command, Commands::Unsubscribe));

        let cli = Cli::try_parse_from(["gmail-sheets", "init-config", "--force"]).unwrap();
        match cli.command {
            Commands::InitConfig { output, force } => {
                assert_eq!(output, PathBuf::from("config.toml"));
                assert!(force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_format_report() {
        let mut report = RunReport::new("labeling");
        report.items = 3;
        report.succeeded = 1;
        report.no_data = 1;
        report.failed = 1;
        report.retries = 2;
        report.rows_written = 3;

        let text = format_report(&report);
        assert!(text.contains("Labeling Summary"));
        assert!(text.contains("Items processed: 3"));
        assert!(text.contains("Rate-limit retries: 2"));
        assert!(text.contains("Rows written: 3"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("analysis"), "Analysis");
        assert_eq!(capitalize(""), "");
    }
}
