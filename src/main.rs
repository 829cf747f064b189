use anyhow::Result;
use clap::Parser;
use gmail_sheet_workflows::auth::{self, GMAIL_SCOPE};
use gmail_sheet_workflows::cli::{self, Cli, Commands, Workflow};
use gmail_sheet_workflows::config::Config;
use gmail_sheet_workflows::error::AutomationError;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl MultiProgressMakeWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self { multi }
    }
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        eprintln!("\nFor help, run: gmail-sheets --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls
    // On non-Windows platforms, use aws-lc-rs; on Windows, use ring
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    // Spreadsheet ids and concurrency overrides may live in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_sheet_workflows=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_sheet_workflows=info,warn"))
    };

    // Create shared MultiProgress for coordinated progress bar + logging
    let multi_progress = Arc::new(MultiProgress::new());
    let make_writer = MultiProgressMakeWriter::new(Arc::clone(&multi_progress));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Google APIs...");
            let config = Config::load(&cli.config).await?;

            if let Some(parent) = cli.token_cache.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }

            if force && cli.token_cache.exists() {
                tokio::fs::remove_file(&cli.token_cache).await?;
                tracing::info!("Removed existing token cache");
            }

            let hubs = auth::initialize_hubs(
                &cli.credentials,
                &cli.token_cache,
                config.auth.redirect_port,
            )
            .await?;

            println!("Successfully authenticated with Gmail and Sheets APIs");
            println!("Token cached at: {:?}", cli.token_cache);

            // Scope must be given explicitly or the hub asks for its default one
            let (_, profile) = hubs
                .gmail
                .users()
                .get_profile("me")
                .add_scope(GMAIL_SCOPE)
                .doit()
                .await
                .map_err(AutomationError::from)?;
            println!(
                "Connected to account: {}",
                profile.email_address.unwrap_or_default()
            );

            Ok(())
        }

        Commands::Analyze => run_workflow(&cli, Workflow::Analyze, None, &multi_progress).await,

        Commands::Label { ref label_name } => {
            run_workflow(&cli, Workflow::Label, label_name.clone(), &multi_progress).await
        }

        Commands::Unsubscribe => {
            run_workflow(&cli, Workflow::Unsubscribe, None, &multi_progress).await
        }

        Commands::InitConfig { ref output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(AutomationError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - sheets.*_spreadsheet_id: The sheet each workflow reads and writes");
            println!("  - labeling.label_name: Label applied to messages from listed senders");
            println!("  - queue.max_retries: Retries for rate-limited calls");
            println!("\nSpreadsheet ids can also be set with SHEET_ID_FETCH, SHEET_ID_LABEL");
            println!("and SHEET_ID_UNSUBSCRIBE in the environment or a .env file.");

            Ok(())
        }
    }
}

async fn run_workflow(
    cli: &Cli,
    workflow: Workflow,
    label_name: Option<String>,
    multi_progress: &Arc<MultiProgress>,
) -> Result<()> {
    let report = cli::run_workflow(cli, workflow, label_name, (**multi_progress).clone()).await?;
    println!("{}", cli::format_report(&report));
    Ok(())
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(err) = error.downcast_ref::<AutomationError>() {
        match err {
            AutomationError::AuthError(_) => {
                eprintln!("\nHint: Make sure your credentials.json file is valid.");
                eprintln!("      You can download it from Google Cloud Console.");
                eprintln!("      Try running: gmail-sheets auth --force");
            }
            AutomationError::ApiError(_) | AutomationError::ServerError { .. } => {
                eprintln!("\nHint: This may be a temporary API error.");
                eprintln!("      Try running the command again.");
            }
            AutomationError::RateLimitExceeded { .. } => {
                eprintln!("\nHint: You've hit Google API rate limits.");
                eprintln!("      Wait a few seconds and try again.");
                eprintln!("      Consider lowering the concurrency settings in config.");
            }
            AutomationError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: gmail-sheets init-config --force");
            }
            AutomationError::SheetError(_) => {
                eprintln!("\nHint: Check the spreadsheet id and that the sheet is shared");
                eprintln!("      with the authenticated account.");
            }
            _ => {}
        }
    }
}
