use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AutomationError, Result};
use crate::queue::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub labeling: LabelingConfig,
    #[serde(default)]
    pub unsubscribe: UnsubscribeConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default)]
    pub analysis_spreadsheet_id: String,
    #[serde(default)]
    pub label_spreadsheet_id: String,
    #[serde(default)]
    pub unsubscribe_spreadsheet_id: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            sheet_name: default_sheet_name(),
            analysis_spreadsheet_id: String::new(),
            label_spreadsheet_id: String::new(),
            unsubscribe_spreadsheet_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl QueueConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_analysis_page_size")]
    pub page_size: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            concurrency: default_analysis_concurrency(),
            page_size: default_analysis_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelingConfig {
    #[serde(default = "default_workflow_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_label_name")]
    pub label_name: String,
    #[serde(default = "default_label_page_size")]
    pub page_size: u32,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_workflow_concurrency(),
            label_name: default_label_name(),
            page_size: default_label_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeConfig {
    #[serde(default = "default_workflow_concurrency")]
    pub concurrency: usize,
}

impl Default for UnsubscribeConfig {
    fn default() -> Self {
        Self {
            concurrency: default_workflow_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            redirect_port: default_redirect_port(),
        }
    }
}

fn default_sheet_name() -> String {
    "Sheet1".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_analysis_concurrency() -> usize {
    10
}

fn default_analysis_page_size() -> u32 {
    100
}

fn default_workflow_concurrency() -> usize {
    5
}

fn default_label_name() -> String {
    "to be deleted".to_string()
}

fn default_label_page_size() -> u32 {
    500
}

fn default_redirect_port() -> u16 {
    8080
}

/// Gmail caps `messages.list` page size at 500
const MAX_PAGE_SIZE: u32 = 500;

/// Stay well under the per-user quota of 250 units/sec
const MAX_CONCURRENCY: usize = 50;

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, start from defaults and let the environment fill in
        let mut config = if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Self::default()
        } else {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                AutomationError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                AutomationError::ConfigError(format!("Failed to parse config file: {}", e))
            })?;

            tracing::info!("Loaded configuration from {:?}", path);
            config
        };

        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AutomationError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            AutomationError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        tokio::fs::write(path, content).await.map_err(|e| {
            AutomationError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Apply overrides from `SHEET_ID_*`, `PQ_CONCURRENCY_*` and `REDIRECT_URI_PORT`.
    ///
    /// `lookup` returns the value of a variable, if set; blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(id) = get("SHEET_ID_FETCH") {
            self.sheets.analysis_spreadsheet_id = id;
        }
        if let Some(id) = get("SHEET_ID_LABEL") {
            self.sheets.label_spreadsheet_id = id;
        }
        if let Some(id) = get("SHEET_ID_UNSUBSCRIBE") {
            self.sheets.unsubscribe_spreadsheet_id = id;
        }
        if let Some(value) = get("PQ_CONCURRENCY_ANALYSIS") {
            self.analysis.concurrency = parse_env("PQ_CONCURRENCY_ANALYSIS", &value)?;
        }
        if let Some(value) = get("PQ_CONCURRENCY_ASSIGN_LABEL") {
            self.labeling.concurrency = parse_env("PQ_CONCURRENCY_ASSIGN_LABEL", &value)?;
        }
        if let Some(value) = get("PQ_CONCURRENCY_UNSUB") {
            self.unsubscribe.concurrency = parse_env("PQ_CONCURRENCY_UNSUB", &value)?;
        }
        if let Some(value) = get("REDIRECT_URI_PORT") {
            self.auth.redirect_port = parse_env("REDIRECT_URI_PORT", &value)?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sheets.sheet_name.trim().is_empty() {
            return Err(AutomationError::ConfigError(
                "sheets.sheet_name cannot be empty".to_string(),
            ));
        }

        for (name, value) in [
            ("analysis.concurrency", self.analysis.concurrency),
            ("labeling.concurrency", self.labeling.concurrency),
            ("unsubscribe.concurrency", self.unsubscribe.concurrency),
        ] {
            if value == 0 {
                return Err(AutomationError::ConfigError(format!(
                    "{} must be at least 1",
                    name
                )));
            }
            if value > MAX_CONCURRENCY {
                return Err(AutomationError::ConfigError(format!(
                    "{} cannot exceed {} (to stay under Gmail API rate limits)",
                    name, MAX_CONCURRENCY
                )));
            }
        }

        for (name, value) in [
            ("analysis.page_size", self.analysis.page_size),
            ("labeling.page_size", self.labeling.page_size),
        ] {
            if value == 0 || value > MAX_PAGE_SIZE {
                return Err(AutomationError::ConfigError(format!(
                    "{} must be between 1 and {}",
                    name, MAX_PAGE_SIZE
                )));
            }
        }

        if self.labeling.label_name.trim().is_empty() {
            return Err(AutomationError::ConfigError(
                "labeling.label_name cannot be empty".to_string(),
            ));
        }

        if self.queue.initial_backoff_ms == 0 {
            return Err(AutomationError::ConfigError(
                "queue.initial_backoff_ms must be greater than 0".to_string(),
            ));
        }

        if self.auth.redirect_port == 0 {
            return Err(AutomationError::ConfigError(
                "auth.redirect_port must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}

/// Require a spreadsheet id for the workflow about to run
pub fn require_spreadsheet_id<'a>(id: &'a str, setting: &str) -> Result<&'a str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AutomationError::ConfigError(format!(
            "{} is not set (config file or environment)",
            setting
        )));
    }
    Ok(id)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        AutomationError::ConfigError(format!("{} has an invalid value: '{}'", name, value))
    })
}
