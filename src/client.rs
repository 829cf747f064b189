//! Gmail API client used by the workflows
//!
//! Per-item calls (`list_messages_page`, `get_sender`, `get_message_id`,
//! `batch_add_label`) surface rate limiting as
//! [`AutomationError::RateLimitExceeded`] and never retry on their own; the
//! [`BoundedRetryQueue`](crate::queue::BoundedRetryQueue) owns that policy.
//! Setup calls (`list_labels`, `create_label`, `inbox_total`) retry transient
//! errors internally since they run once per workflow, outside the queue.

use async_trait::async_trait;
use google_gmail1::api::{BatchModifyMessagesRequest, Label};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::{GmailHub, GMAIL_SCOPE};
use crate::error::{AutomationError, Result};

/// Gmail accepts up to 1000 ids per `messages.batchModify`
pub const BATCH_MODIFY_LIMIT: usize = 1000;

static ANGLE_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(.*)>").unwrap());

/// Label info returned from Gmail API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// One page of `messages.list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Gmail operations the workflows depend on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// Total number of messages carrying the INBOX label
    async fn inbox_total(&self) -> Result<u64>;

    /// Fetch one page of message ids; an empty `query` lists everything
    async fn list_messages_page(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<MessagePage>;

    /// Sender address of a message, taken from its `From` header
    async fn get_sender(&self, message_id: &str) -> Result<Option<String>>;

    /// Fetch a message's metadata and return its id
    async fn get_message_id(&self, message_id: &str) -> Result<String>;

    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a new label, returning its id
    async fn create_label(&self, name: &str) -> Result<String>;

    /// Add a label to many messages, chunked per batch limit.
    /// Returns the number of messages modified.
    async fn batch_add_label(&self, message_ids: &[String], label_id: &str) -> Result<usize>;
}

/// Drain `messages.list` pages for `query`, stopping once `limit` ids are collected
pub async fn list_message_ids(
    client: &dyn GmailClient,
    query: &str,
    page_size: u32,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    let mut all_ids = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = client
            .list_messages_page(query, page_size, page_token.take())
            .await?;
        all_ids.extend(page.ids);

        if let Some(limit) = limit {
            if all_ids.len() >= limit {
                all_ids.truncate(limit);
                break;
            }
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(all_ids)
}

/// Search query matching every message sent by `email`
pub fn sender_query(email: &str) -> String {
    format!("from:{}", email)
}

/// Extract the bare address from a `From` header value
///
/// `"Jane <jane@example.com>"` yields `jane@example.com`; a value without angle
/// brackets is returned trimmed. Blank values yield `None`.
pub fn extract_sender_address(from: &str) -> Option<String> {
    let address = match ANGLE_ADDRESS.captures(from) {
        Some(caps) => caps[1].trim().to_string(),
        None => from.trim().to_string(),
    };

    if address.is_empty() {
        None
    } else {
        Some(address)
    }
}

/// Production Gmail client backed by the generated API hub
pub struct ProductionGmailClient {
    hub: GmailHub,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self { hub }
    }

    /// Check if an error is retryable by the setup-call helper
    fn should_retry(error: &AutomationError) -> bool {
        error.is_transient()
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(
        operation_name: &str,
        max_retries: u32,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name,
                        attempts,
                        max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn inbox_total(&self) -> Result<u64> {
        Self::with_retry("inbox_total", 3, || async {
            let (_, label) = self
                .hub
                .users()
                .labels_get("me", "INBOX")
                .add_scope(GMAIL_SCOPE)
                .doit()
                .await?;

            let total = label.messages_total.ok_or_else(|| {
                AutomationError::InvalidResponse("INBOX label has no message total".to_string())
            })?;
            Ok(u64::try_from(total).unwrap_or(0))
        })
        .await
    }

    async fn list_messages_page(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        let mut call = self.hub.users().messages_list("me").max_results(page_size);

        if !query.is_empty() {
            call = call.q(query);
        }
        if let Some(token) = page_token.as_ref() {
            call = call.page_token(token);
        }

        let (_, response) = call.add_scope(GMAIL_SCOPE).doit().await?;

        let ids = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect();

        Ok(MessagePage {
            ids,
            next_page_token: response.next_page_token,
        })
    }

    async fn get_sender(&self, message_id: &str) -> Result<Option<String>> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", message_id)
            .format("metadata")
            .add_metadata_headers("From")
            .add_scope(GMAIL_SCOPE)
            .doit()
            .await?;

        let sender = msg
            .payload
            .and_then(|p| p.headers)
            .unwrap_or_default()
            .into_iter()
            .find(|h| {
                h.name
                    .as_deref()
                    .map(|n| n.eq_ignore_ascii_case("from"))
                    .unwrap_or(false)
            })
            .and_then(|h| h.value)
            .and_then(|value| extract_sender_address(&value));

        Ok(sender)
    }

    async fn get_message_id(&self, message_id: &str) -> Result<String> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", message_id)
            .format("metadata")
            .add_scope(GMAIL_SCOPE)
            .doit()
            .await?;

        msg.id
            .ok_or_else(|| AutomationError::InvalidResponse("Message has no ID".to_string()))
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Self::with_retry("list_labels", 3, || async {
            // Wrap API call in timeout to prevent indefinite hangs
            let timeout_duration = Duration::from_secs(30);
            let api_call = async {
                debug!("Calling Gmail API to list labels...");
                self.hub
                    .users()
                    .labels_list("me")
                    .add_scope(GMAIL_SCOPE)
                    .doit()
                    .await
            };

            let (_, response) = match tokio::time::timeout(timeout_duration, api_call).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!("Gmail API list_labels call timed out after {:?}", timeout_duration);
                    return Err(AutomationError::NetworkError(format!(
                        "API call timed out after {:?}",
                        timeout_duration
                    )));
                }
            };

            let labels: Vec<LabelInfo> = response
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| match (label.id, label.name) {
                    (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                    _ => None,
                })
                .collect();

            debug!("Successfully parsed {} labels", labels.len());
            Ok(labels)
        })
        .await
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let name = name.to_string();
        Self::with_retry("create_label", 3, || async {
            let label = Label {
                name: Some(name.clone()),
                message_list_visibility: Some("show".to_string()),
                label_list_visibility: Some("labelShow".to_string()),
                ..Default::default()
            };

            let (_, created_label) = self
                .hub
                .users()
                .labels_create(label, "me")
                .add_scope(GMAIL_SCOPE)
                .doit()
                .await?;

            created_label
                .id
                .ok_or_else(|| AutomationError::LabelError("Created label has no ID".to_string()))
        })
        .await
    }

    async fn batch_add_label(&self, message_ids: &[String], label_id: &str) -> Result<usize> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let mut total_modified = 0;

        for chunk in message_ids.chunks(BATCH_MODIFY_LIMIT) {
            let request = BatchModifyMessagesRequest {
                ids: Some(chunk.to_vec()),
                add_label_ids: Some(vec![label_id.to_string()]),
                remove_label_ids: None,
            };

            self.hub
                .users()
                .messages_batch_modify(request, "me")
                .add_scope(GMAIL_SCOPE)
                .doit()
                .await?;

            total_modified += chunk.len();
        }

        Ok(total_modified)
    }
}
