//! An in-memory [`QueueClient`], the same role `MemoryBackingStore` plays for
//! the sibling MTA's spool: deterministic, network-free, and good enough to
//! exercise every component above it in tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use qdone_common::{FailedEntry, QdoneError, Result};

use crate::client::{
    BatchEntry, BatchOutcome, OutboundMessage, QueueAttributes, QueueAttributesSnapshot,
    QueueClient, ReceivedMessage, SendOutcome, not_exist,
};

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
}

#[derive(Debug, Default)]
struct QueueRecord {
    url: String,
    arn: String,
    attributes: QueueAttributes,
    pending: VecDeque<StoredMessage>,
    in_flight: HashMap<String, StoredMessage>,
}

/// In-memory [`QueueClient`] backed by an `Arc<RwLock<HashMap<...>>>`,
/// mirroring `empath_spool::backends::memory::MemoryBackingStore`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueClient {
    account_url: String,
    queues: Arc<RwLock<HashMap<String, QueueRecord>>>,
}

impl InMemoryQueueClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            account_url: "https://queue.example/000000000000".to_string(),
            queues: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{name}", self.account_url)
    }

    fn name_from_url<'a>(&self, url: &'a str) -> &'a str {
        url.rsplit('/').next().unwrap_or(url)
    }

    /// Test helper: how many messages (pending + in flight) a queue holds.
    #[must_use]
    pub fn message_count(&self, name: &str) -> usize {
        self.queues
            .read()
            .get(name)
            .map_or(0, |q| q.pending.len() + q.in_flight.len())
    }

    /// Test helper: whether a queue of this name has been created.
    #[must_use]
    pub fn queue_exists(&self, name: &str) -> bool {
        self.queues.read().contains_key(name)
    }
}

#[async_trait]
impl QueueClient for InMemoryQueueClient {
    async fn get_queue_url(&self, name: &str) -> Result<String> {
        self.queues
            .read()
            .get(name)
            .map(|q| q.url.clone())
            .ok_or_else(|| not_exist(name))
    }

    async fn create_queue(
        &self,
        name: &str,
        attributes: &QueueAttributes,
        _tags: &HashMap<String, String>,
    ) -> Result<String> {
        let url = self.url_for(name);
        let arn = format!("arn:aws:sqs:us-east-1:000000000000:{name}");
        let mut guard = self.queues.write();
        guard.entry(name.to_string()).or_insert_with(|| QueueRecord {
            url: url.clone(),
            arn,
            attributes: attributes.clone(),
            pending: VecDeque::new(),
            in_flight: HashMap::new(),
        });
        Ok(url)
    }

    async fn get_queue_attributes(&self, url: &str) -> Result<QueueAttributesSnapshot> {
        let name = self.name_from_url(url).to_string();
        let guard = self.queues.read();
        let record = guard.get(&name).ok_or_else(|| not_exist(&name))?;
        Ok(QueueAttributesSnapshot {
            arn: record.arn.clone(),
            approximate_number_of_messages: record.pending.len() as u64,
            approximate_number_of_messages_not_visible: record.in_flight.len() as u64,
            approximate_number_of_messages_delayed: 0,
        })
    }

    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>> {
        let guard = self.queues.read();
        Ok(guard
            .values()
            .filter(|q| self.name_from_url(&q.url).starts_with(prefix))
            .map(|q| q.url.clone())
            .collect())
    }

    async fn send_message(&self, url: &str, message: &OutboundMessage) -> Result<SendOutcome> {
        let name = self.name_from_url(url).to_string();
        let message_id = ulid::Ulid::new().to_string();
        let mut guard = self.queues.write();
        let record = guard.get_mut(&name).ok_or_else(|| not_exist(&name))?;
        record.pending.push_back(StoredMessage {
            message_id: message_id.clone(),
            body: message.body.clone(),
        });
        Ok(SendOutcome { message_id })
    }

    async fn send_message_batch(&self, url: &str, entries: &[BatchEntry]) -> Result<BatchOutcome> {
        if entries.len() > 10 {
            return Err(QdoneError::Client(format!(
                "batch of {} exceeds the 10-entry limit",
                entries.len()
            )));
        }
        let total_size: usize = entries.iter().map(BatchEntry::approximate_size).sum();
        if total_size >= 262_144 {
            return Err(QdoneError::Client(format!(
                "batch of {total_size} bytes exceeds the 256 KiB limit"
            )));
        }

        let name = self.name_from_url(url).to_string();
        let mut outcome = BatchOutcome::default();
        let mut guard = self.queues.write();
        let Some(record) = guard.get_mut(&name) else {
            return Err(not_exist(&name));
        };
        for entry in entries {
            let message_id = ulid::Ulid::new().to_string();
            record.pending.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: entry.body.clone(),
            });
            outcome.successful.push(message_id);
        }
        let _ = &outcome.failed; // populated only on partial-failure test doubles
        Ok(outcome)
    }

    async fn receive_message(
        &self,
        url: &str,
        _wait_time: std::time::Duration,
        _visibility_timeout: std::time::Duration,
    ) -> Result<Option<ReceivedMessage>> {
        let name = self.name_from_url(url).to_string();
        let mut guard = self.queues.write();
        let record = guard.get_mut(&name).ok_or_else(|| not_exist(&name))?;
        let Some(message) = record.pending.pop_front() else {
            return Ok(None);
        };
        let receipt_handle = ulid::Ulid::new().to_string();
        let received = ReceivedMessage {
            message_id: message.message_id.clone(),
            receipt_handle: receipt_handle.clone(),
            body: message.body.clone(),
        };
        record.in_flight.insert(receipt_handle, message);
        Ok(Some(received))
    }

    async fn change_message_visibility(
        &self,
        url: &str,
        receipt_handle: &str,
        _visibility_timeout: std::time::Duration,
    ) -> Result<()> {
        let name = self.name_from_url(url).to_string();
        let guard = self.queues.read();
        let record = guard.get(&name).ok_or_else(|| not_exist(&name))?;
        if record.in_flight.contains_key(receipt_handle) {
            Ok(())
        } else {
            Err(QdoneError::Client(format!(
                "unknown receipt handle: {receipt_handle}"
            )))
        }
    }

    async fn delete_message(&self, url: &str, receipt_handle: &str) -> Result<()> {
        let name = self.name_from_url(url).to_string();
        let mut guard = self.queues.write();
        let record = guard.get_mut(&name).ok_or_else(|| not_exist(&name))?;
        record
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QdoneError::Client(format!("unknown receipt handle: {receipt_handle}")))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn send_then_receive_then_delete_round_trips() {
        let client = InMemoryQueueClient::new();
        let url = client
            .create_queue("qdone_orders", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();

        client
            .send_message(
                &url,
                &OutboundMessage {
                    body: "do-the-thing".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let received = client
            .receive_message(&url, Duration::ZERO, Duration::from_secs(30))
            .await
            .unwrap()
            .expect("message should be present");
        assert_eq!(received.body, "do-the-thing");

        client
            .delete_message(&url, &received.receipt_handle)
            .await
            .unwrap();
        assert_eq!(client.message_count("qdone_orders"), 0);
    }

    #[tokio::test]
    async fn get_queue_url_fails_not_exist_before_creation() {
        let client = InMemoryQueueClient::new();
        let err = client.get_queue_url("qdone_missing").await.unwrap_err();
        assert!(matches!(err, QdoneError::NotExist(_)));
    }

    #[tokio::test]
    async fn batch_over_ten_entries_is_rejected() {
        let client = InMemoryQueueClient::new();
        let url = client
            .create_queue("qdone_orders", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();
        let entries: Vec<_> = (0..11)
            .map(|i| BatchEntry {
                id: i.to_string(),
                body: "x".to_string(),
                ..Default::default()
            })
            .collect();
        let err = client.send_message_batch(&url, &entries).await.unwrap_err();
        assert!(matches!(err, QdoneError::Client(_)));
    }
}
