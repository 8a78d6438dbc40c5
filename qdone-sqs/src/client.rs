//! The hosted-queue-service client abstraction (component M).
//!
//! Components D, E, F, G, and H depend only on `Arc<dyn QueueClient>`, never
//! on a concrete SDK client, the same way the sibling MTA's delivery and
//! spool layers depend on `Arc<dyn BackingStore>` rather than a filesystem
//! type directly. This is what lets the real operations below be exercised
//! against an in-memory mock in tests.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use qdone_common::{FailedEntry, QdoneError, Result};
use serde::Serialize;

/// Attributes given to `CreateQueue`. Field names and string-typed values
/// mirror the hosted service's wire format exactly — this is a
/// wire-compatibility requirement, not a style choice.
#[derive(Debug, Clone, Default)]
pub struct QueueAttributes {
    pub fifo: bool,
    pub message_retention_period: Duration,
    pub redrive_policy: Option<RedrivePolicy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedrivePolicy {
    #[serde(rename = "deadLetterTargetArn")]
    pub dead_letter_target_arn: String,
    #[serde(rename = "maxReceiveCount")]
    pub max_receive_count: String,
}

impl RedrivePolicy {
    #[must_use]
    pub fn new(dead_letter_target_arn: impl Into<String>, max_receive_count: u32) -> Self {
        Self {
            dead_letter_target_arn: dead_letter_target_arn.into(),
            max_receive_count: max_receive_count.to_string(),
        }
    }

    /// Serialises to the JSON string the `RedrivePolicy` attribute expects.
    /// Always emits valid JSON (see the open question in the design notes
    /// about a malformed-JSON bug in one source variant this was distilled
    /// from).
    ///
    /// # Errors
    /// Returns an error only if the policy somehow fails to serialise.
    pub fn to_attribute_value(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueueAttributesSnapshot {
    pub arn: String,
    pub approximate_number_of_messages: u64,
    pub approximate_number_of_messages_not_visible: u64,
    pub approximate_number_of_messages_delayed: u64,
}

impl QueueAttributesSnapshot {
    /// The shallow activity check used by `--active-only` worker filtering.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.approximate_number_of_messages > 0
            || self.approximate_number_of_messages_not_visible > 0
            || self.approximate_number_of_messages_delayed > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub body: String,
    pub group_id: Option<String>,
    pub deduplication_id: Option<String>,
    pub delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchEntry {
    pub id: String,
    pub body: String,
    pub group_id: Option<String>,
    pub deduplication_id: Option<String>,
    pub delay: Option<Duration>,
}

impl BatchEntry {
    /// Rough serialised size used to keep a batch under the service's
    /// 256 KiB cap. Conservative: counts the body and the attribute values,
    /// not the full request envelope.
    #[must_use]
    pub fn approximate_size(&self) -> usize {
        self.body.len()
            + self.id.len()
            + self.group_id.as_ref().map_or(0, String::len)
            + self.deduplication_id.as_ref().map_or(0, String::len)
    }
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<FailedEntry>,
}

#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

#[async_trait]
pub trait QueueClient: Send + Sync + std::fmt::Debug {
    async fn get_queue_url(&self, name: &str) -> Result<String>;

    async fn create_queue(
        &self,
        name: &str,
        attributes: &QueueAttributes,
        tags: &HashMap<String, String>,
    ) -> Result<String>;

    async fn get_queue_attributes(&self, url: &str) -> Result<QueueAttributesSnapshot>;

    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>>;

    async fn send_message(&self, url: &str, message: &OutboundMessage) -> Result<SendOutcome>;

    async fn send_message_batch(&self, url: &str, entries: &[BatchEntry]) -> Result<BatchOutcome>;

    async fn receive_message(
        &self,
        url: &str,
        wait_time: Duration,
        visibility_timeout: Duration,
    ) -> Result<Option<ReceivedMessage>>;

    async fn change_message_visibility(
        &self,
        url: &str,
        receipt_handle: &str,
        visibility_timeout: Duration,
    ) -> Result<()>;

    async fn delete_message(&self, url: &str, receipt_handle: &str) -> Result<()>;
}

/// Convenience constructor for the common "queue not found" error, used by
/// every `QueueClient` implementation so callers can match on it uniformly.
#[must_use]
pub fn not_exist(name: &str) -> QdoneError {
    QdoneError::NotExist(name.to_string())
}
