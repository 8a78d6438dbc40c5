//! The real [`QueueClient`], backed by `aws-sdk-sqs`. No example in this
//! workspace's retrieval pack reaches for a hosted-queue-service client —
//! this dependency is added because the operations in §6 of the design
//! document are literally this service's wire API, and there is no idiomatic
//! way to speak it without the SDK.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use aws_sdk_sqs::{
    error::ProvideErrorMetadata,
    types::{MessageSystemAttributeName, QueueAttributeName, SendMessageBatchRequestEntry},
};
use qdone_common::{FailedEntry, QdoneError, Result};

use crate::client::{
    BatchEntry, BatchOutcome, OutboundMessage, QueueAttributes, QueueAttributesSnapshot,
    QueueClient, ReceivedMessage, SendOutcome,
};

#[derive(Debug, Clone)]
pub struct AwsQueueClient {
    client: aws_sdk_sqs::Client,
}

impl AwsQueueClient {
    #[must_use]
    pub const fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    /// Builds a client from the ambient AWS configuration (environment,
    /// shared config file, IMDS), optionally pinned to a region.
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let config = loader.load().await;
        Self::new(aws_sdk_sqs::Client::new(&config))
    }
}

/// Classifies a service error by its AWS error code, the way
/// `aws_sdk_sqs::error::ProvideErrorMetadata` exposes it uniformly across
/// every operation's error type.
///
/// `GetQueueUrl` is the only operation where "does this queue exist" is a
/// genuine open question — every other operation is called with a URL the
/// caller already resolved, so a `NonExistentQueue` there means the queue
/// was created moments ago and has not yet propagated to every backend
/// partition, not that it was never created. That case is retried as
/// [`QdoneError::EventualConsistency`] rather than surfaced as fatal.
fn classify<E, R>(context: &str, err: aws_sdk_sqs::error::SdkError<E, R>) -> QdoneError
where
    E: ProvideErrorMetadata,
{
    let code = err.code().map(str::to_string);
    let message = err
        .message()
        .map_or_else(|| context.to_string(), str::to_string);
    match code.as_deref() {
        Some("AWS.SimpleQueueService.NonExistentQueue") if context == "GetQueueUrl" => {
            QdoneError::NotExist(message)
        }
        Some("AWS.SimpleQueueService.NonExistentQueue") => QdoneError::EventualConsistency(message),
        Some(
            "RequestThrottled" | "ThrottlingException" | "KmsThrottled" | "KmsRequestThrottled",
        ) => QdoneError::Throttled(message),
        Some("AccessDenied" | "AccessDeniedException") => QdoneError::AccessDenied(message),
        _ => QdoneError::Client(format!("{context}: {message}")),
    }
}

#[async_trait]
impl QueueClient for AwsQueueClient {
    async fn get_queue_url(&self, name: &str) -> Result<String> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| classify("GetQueueUrl", e))?;
        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| QdoneError::Client("GetQueueUrl returned no URL".to_string()))
    }

    async fn create_queue(
        &self,
        name: &str,
        attributes: &QueueAttributes,
        tags: &HashMap<String, String>,
    ) -> Result<String> {
        let mut request = self.client.create_queue().queue_name(name).attributes(
            QueueAttributeName::MessageRetentionPeriod,
            attributes.message_retention_period.as_secs().to_string(),
        );
        if attributes.fifo {
            request = request.attributes(QueueAttributeName::FifoQueue, "true");
        }
        if let Some(redrive) = &attributes.redrive_policy {
            request = request.attributes(
                QueueAttributeName::RedrivePolicy,
                redrive.to_attribute_value()?,
            );
        }
        for (key, value) in tags {
            request = request.tags(key, value);
        }

        let output = request
            .send()
            .await
            .map_err(|e| classify("CreateQueue", e))?;
        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| QdoneError::Client("CreateQueue returned no URL".to_string()))
    }

    async fn get_queue_attributes(&self, url: &str) -> Result<QueueAttributesSnapshot> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(url)
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
            .map_err(|e| classify("GetQueueAttributes", e))?;
        let attributes = output.attributes().cloned().unwrap_or_default();
        let parse = |key: &QueueAttributeName| {
            attributes
                .get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
        };
        Ok(QueueAttributesSnapshot {
            arn: attributes
                .get(&QueueAttributeName::QueueArn)
                .cloned()
                .unwrap_or_default(),
            approximate_number_of_messages: parse(&QueueAttributeName::ApproximateNumberOfMessages),
            approximate_number_of_messages_not_visible: parse(
                &QueueAttributeName::ApproximateNumberOfMessagesNotVisible,
            ),
            approximate_number_of_messages_delayed: parse(
                &QueueAttributeName::ApproximateNumberOfMessagesDelayed,
            ),
        })
    }

    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .list_queues()
            .queue_name_prefix(prefix)
            .send()
            .await
            .map_err(|e| classify("ListQueues", e))?;
        Ok(output.queue_urls().to_vec())
    }

    async fn send_message(&self, url: &str, message: &OutboundMessage) -> Result<SendOutcome> {
        let mut request = self
            .client
            .send_message()
            .queue_url(url)
            .message_body(&message.body);
        if let Some(group_id) = &message.group_id {
            request = request.message_group_id(group_id);
        }
        if let Some(dedup_id) = &message.deduplication_id {
            request = request.message_deduplication_id(dedup_id);
        }
        if let Some(delay) = message.delay {
            request = request.delay_seconds(i32::try_from(delay.as_secs()).unwrap_or(i32::MAX));
        }
        let output = request
            .send()
            .await
            .map_err(|e| classify("SendMessage", e))?;
        Ok(SendOutcome {
            message_id: output.message_id().unwrap_or_default().to_string(),
        })
    }

    async fn send_message_batch(&self, url: &str, entries: &[BatchEntry]) -> Result<BatchOutcome> {
        let mut built = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut builder = SendMessageBatchRequestEntry::builder()
                .id(&entry.id)
                .message_body(&entry.body);
            if let Some(group_id) = &entry.group_id {
                builder = builder.message_group_id(group_id);
            }
            if let Some(dedup_id) = &entry.deduplication_id {
                builder = builder.message_deduplication_id(dedup_id);
            }
            if let Some(delay) = entry.delay {
                builder = builder.delay_seconds(i32::try_from(delay.as_secs()).unwrap_or(i32::MAX));
            }
            built.push(
                builder
                    .build()
                    .map_err(|e| QdoneError::Client(format!("invalid batch entry: {e}")))?,
            );
        }

        let output = self
            .client
            .send_message_batch()
            .queue_url(url)
            .set_entries(Some(built))
            .send()
            .await
            .map_err(|e| classify("SendMessageBatch", e))?;

        let successful = output
            .successful()
            .iter()
            .map(|e| e.message_id().to_string())
            .collect();
        let failed = output
            .failed()
            .iter()
            .map(|e| FailedEntry {
                id: e.id().to_string(),
                code: e.code().to_string(),
                message: e.message().unwrap_or_default().to_string(),
            })
            .collect();
        Ok(BatchOutcome { successful, failed })
    }

    async fn receive_message(
        &self,
        url: &str,
        wait_time: Duration,
        visibility_timeout: Duration,
    ) -> Result<Option<ReceivedMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(url)
            .max_number_of_messages(1)
            .wait_time_seconds(i32::try_from(wait_time.as_secs()).unwrap_or(20))
            .visibility_timeout(i32::try_from(visibility_timeout.as_secs()).unwrap_or(30))
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| classify("ReceiveMessage", e))?;

        Ok(output.messages().first().map(|message| ReceivedMessage {
            message_id: message.message_id().unwrap_or_default().to_string(),
            receipt_handle: message.receipt_handle().unwrap_or_default().to_string(),
            body: message.body().unwrap_or_default().to_string(),
        }))
    }

    async fn change_message_visibility(
        &self,
        url: &str,
        receipt_handle: &str,
        visibility_timeout: Duration,
    ) -> Result<()> {
        self.client
            .change_message_visibility()
            .queue_url(url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(i32::try_from(visibility_timeout.as_secs()).unwrap_or(30))
            .send()
            .await
            .map_err(|e| classify("ChangeMessageVisibility", e))?;
        Ok(())
    }

    async fn delete_message(&self, url: &str, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| classify("DeleteMessage", e))?;
        Ok(())
    }
}
