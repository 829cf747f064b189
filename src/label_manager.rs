//! Label lookup and creation
use crate::client::GmailClient;
use crate::error::{AutomationError, Result};
use std::collections::HashMap;
use tracing::{debug, info};

/// Gmail rejects label names longer than this
const MAX_LABEL_NAME_LEN: usize = 225;

/// Resolves label names to ids, creating missing labels on demand
pub struct LabelManager<'a> {
    client: &'a dyn GmailClient,
    label_cache: HashMap<String, String>, // lowercase name -> id
    loaded: bool,
}

impl<'a> LabelManager<'a> {
    pub fn new(client: &'a dyn GmailClient) -> Self {
        Self {
            client,
            label_cache: HashMap::new(),
            loaded: false,
        }
    }

    /// Loads all existing labels from Gmail into the cache
    /// Note: Cache keys are stored lowercase since Gmail label names are case-insensitive
    pub async fn load_existing_labels(&mut self) -> Result<usize> {
        let labels = self.client.list_labels().await?;
        let count = labels.len();

        for label in labels {
            self.label_cache.insert(label.name.to_lowercase(), label.id);
        }

        self.loaded = true;
        info!("Loaded {} existing labels into cache", count);
        Ok(count)
    }

    /// Gets label ID by name, creating it if necessary
    pub async fn get_or_create_label(&mut self, name: &str) -> Result<String> {
        let name = normalize_label_name(name)?;

        if !self.loaded {
            self.load_existing_labels().await.map_err(|e| {
                AutomationError::LabelError(format!("Failed to list labels: {}", e))
            })?;
        }

        if let Some(id) = self.label_cache.get(&name.to_lowercase()) {
            info!("Found label \"{}\" with ID {}", name, id);
            return Ok(id.clone());
        }

        debug!("Label \"{}\" not found, creating it", name);
        let label_id = self.client.create_label(&name).await.map_err(|e| {
            AutomationError::LabelError(format!("Failed to create label '{}': {}", name, e))
        })?;

        self.label_cache.insert(name.to_lowercase(), label_id.clone());

        info!("Created label \"{}\" with ID {}", name, label_id);
        Ok(label_id)
    }
}

/// Trim a label name, collapse inner whitespace and check Gmail's limits
pub fn normalize_label_name(name: &str) -> Result<String> {
    let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.is_empty() {
        return Err(AutomationError::LabelError(
            "Label name cannot be empty".to_string(),
        ));
    }
    if normalized.starts_with('/') || normalized.ends_with('/') {
        return Err(AutomationError::LabelError(format!(
            "Label name '{}' cannot start or end with '/'",
            normalized
        )));
    }
    if normalized.chars().count() > MAX_LABEL_NAME_LEN {
        return Err(AutomationError::LabelError(format!(
            "Label name exceeds {} characters",
            MAX_LABEL_NAME_LEN
        )));
    }

    Ok(normalized)
}
