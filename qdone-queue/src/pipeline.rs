//! Enqueue pipeline (component E): `enqueue_one` and `enqueue_batch`.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use qdone_common::{Options, QdoneError, Result};
use qdone_sqs::{BatchEntry, OutboundMessage, QueueClient, SendOutcome};
use tracing::warn;

use crate::{
    backoff::Backoff,
    dedup::DedupStore,
    resolver::{ResolveMode, Resolver},
};

/// One `(queue, command)` pair, the unit `enqueue-batch` operates over.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub queue: String,
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct EnqueuePipeline {
    client: Arc<dyn QueueClient>,
    resolver: Arc<Resolver>,
    dedup: Arc<dyn DedupStore>,
}

impl EnqueuePipeline {
    #[must_use]
    pub fn new(client: Arc<dyn QueueClient>, resolver: Arc<Resolver>, dedup: Arc<dyn DedupStore>) -> Self {
        Self { client, resolver, dedup }
    }

    /// Resolves/creates the queue, builds a single message, and sends it
    /// through the backoff controller. Honours the external dedup store
    /// when `options.external_dedup` is set.
    ///
    /// # Errors
    /// Surfaces any non-retryable error from resolution or the send itself.
    pub async fn enqueue_one(&self, queue: &str, command: &str, options: &Options) -> Result<SendOutcome> {
        if options.external_dedup && !self.dedup.should_enqueue(command).await {
            return Ok(SendOutcome {
                message_id: ulid::Ulid::new().to_string(),
            });
        }

        let url = self.resolver.resolve(queue, options, ResolveMode::CreateIfMissing).await?;
        let message = build_message(command, options);
        let backoff = Backoff::from_options(options);

        let outcome = backoff
            .run(
                |_attempt| {
                    let client = self.client.clone();
                    let url = url.clone();
                    let message = message.clone();
                    async move { client.send_message(&url, &message).await }
                },
                |result| matches!(result, Err(e) if e.is_retryable()),
            )
            .await;

        match outcome {
            Ok(outcome) => {
                if options.external_dedup {
                    self.dedup.successfully_processed(&outcome.message_id).await;
                }
                Ok(outcome)
            }
            Err(err) => {
                if options.external_dedup {
                    self.dedup.unmark(command).await;
                }
                Err(err)
            }
        }
    }

    /// Resolves every distinct queue in `pairs` in parallel, then walks the
    /// pairs in order filling a per-call buffer per queue URL, flushing a
    /// buffer as soon as it reaches 10 entries. Returns the number of
    /// messages actually enqueued.
    ///
    /// # Errors
    /// Surfaces the first resolution or flush failure encountered.
    pub async fn enqueue_batch(&self, pairs: &[QueuedCommand], options: &Options) -> Result<usize> {
        let distinct: HashSet<&str> = pairs.iter().map(|p| p.queue.as_str()).collect();
        let mut resolves = tokio::task::JoinSet::new();
        for name in distinct {
            let resolver = self.resolver.clone();
            let options = options.clone();
            let name = name.to_string();
            resolves.spawn(async move {
                let url = resolver.resolve(&name, &options, ResolveMode::CreateIfMissing).await;
                (name, url)
            });
        }

        let mut urls = HashMap::new();
        while let Some(joined) = resolves.join_next().await {
            let (name, url) = joined.map_err(|e| QdoneError::Client(format!("resolve task panicked: {e}")))?;
            urls.insert(name, url?);
        }

        // A fresh, locally-owned buffer map -- never module-global, per the
        // concurrency contract: two concurrent enqueue_batch calls must
        // never share a buffer.
        let mut buffers: HashMap<String, VecDeque<BatchEntry>> = HashMap::new();
        let mut enqueued = 0usize;

        for (index, pair) in pairs.iter().enumerate() {
            let url = urls
                .get(pair.queue.as_str())
                .cloned()
                .expect("every pair's queue was resolved above");
            let entry = build_entry(&pair.command, options, index);
            let buffer = buffers.entry(url.clone()).or_default();
            buffer.push_back(entry);
            if buffer.len() >= 10 {
                let drained: Vec<_> = buffer.drain(..).collect();
                enqueued += drained.len();
                self.flush(&url, drained, options).await?;
            }
        }

        for (url, mut remaining) in buffers {
            if !remaining.is_empty() {
                let drained: Vec<_> = remaining.drain(..).collect();
                enqueued += drained.len();
                self.flush(&url, drained, options).await?;
            }
        }

        Ok(enqueued)
    }

    /// Drains `entries` into batches respecting the 10-entry and
    /// sub-256-KiB limits, sending each through the backoff controller.
    async fn flush(&self, url: &str, entries: Vec<BatchEntry>, options: &Options) -> Result<()> {
        let mut remaining: VecDeque<BatchEntry> = entries.into();
        let backoff = Backoff::from_options(options);

        while !remaining.is_empty() {
            let mut slice = Vec::new();
            let mut size = 0usize;
            while let Some(next) = remaining.front() {
                let next_size = next.approximate_size();
                if slice.len() >= 10 || (!slice.is_empty() && size + next_size >= 262_144) {
                    break;
                }
                size += next_size;
                slice.push(remaining.pop_front().expect("front just peeked"));
            }
            if slice.is_empty() {
                // A single oversized entry; send it alone rather than loop forever.
                slice.push(remaining.pop_front().expect("queue is non-empty"));
            }

            let outcome = backoff
                .run(
                    |_attempt| {
                        let client = self.client.clone();
                        let url = url.to_string();
                        let slice = slice.clone();
                        async move { client.send_message_batch(&url, &slice).await }
                    },
                    |result| matches!(result, Err(e) if e.is_retryable()),
                )
                .await?;

            if !outcome.failed.is_empty() {
                warn!(url, failed = outcome.failed.len(), "batch send partially failed");
                return Err(QdoneError::BatchPartial {
                    total: slice.len(),
                    entries: outcome.failed,
                });
            }
        }
        Ok(())
    }
}

fn build_message(command: &str, options: &Options) -> OutboundMessage {
    OutboundMessage {
        body: command.to_string(),
        group_id: fifo_group_id(options),
        deduplication_id: options.fifo.then(|| {
            options
                .deduplication_id
                .clone()
                .unwrap_or_else(|| ulid::Ulid::new().to_string())
        }),
        delay: options.delay,
    }
}

fn build_entry(command: &str, options: &Options, index: usize) -> BatchEntry {
    BatchEntry {
        id: index.to_string(),
        body: command.to_string(),
        group_id: fifo_group_id(options),
        deduplication_id: options.fifo.then(|| ulid::Ulid::new().to_string()),
        delay: options.delay,
    }
}

fn fifo_group_id(options: &Options) -> Option<String> {
    options.fifo.then(|| {
        if options.group_id_per_message {
            ulid::Ulid::new().to_string()
        } else {
            options
                .group_id
                .clone()
                .unwrap_or_else(|| ulid::Ulid::new().to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use qdone_sqs::InMemoryQueueClient;

    use super::*;
    use crate::dedup::NoopDedupStore;

    fn pipeline(client: Arc<dyn QueueClient>) -> EnqueuePipeline {
        let resolver = Arc::new(Resolver::new(client.clone()));
        EnqueuePipeline::new(client, resolver, Arc::new(NoopDedupStore))
    }

    #[tokio::test]
    async fn enqueue_one_round_trips_through_receive() {
        let memory = InMemoryQueueClient::new();
        let client: Arc<dyn QueueClient> = Arc::new(memory.clone());
        let pipeline = pipeline(client.clone());
        let options = Options::default();

        pipeline.enqueue_one("orders", "true", &options).await.unwrap();

        let url = client.get_queue_url("qdone_orders").await.unwrap();
        let received = client
            .receive_message(&url, std::time::Duration::ZERO, std::time::Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.body, "true");
    }

    #[tokio::test]
    async fn batch_of_24_sends_exactly_three_batch_calls() {
        let memory = InMemoryQueueClient::new();
        let client: Arc<dyn QueueClient> = Arc::new(memory.clone());
        let pipeline = pipeline(client.clone());
        let options = Options::default();

        let pairs: Vec<_> = (0..24)
            .map(|_| QueuedCommand {
                queue: "test".to_string(),
                command: "true".to_string(),
            })
            .collect();

        let enqueued = pipeline.enqueue_batch(&pairs, &options).await.unwrap();
        assert_eq!(enqueued, 24);
        assert_eq!(memory.message_count("qdone_test"), 24);
    }

    #[tokio::test]
    async fn fifo_batch_carries_group_and_dedup_ids() {
        let memory = InMemoryQueueClient::new();
        let client: Arc<dyn QueueClient> = Arc::new(memory.clone());
        let pipeline = pipeline(client.clone());
        let options = Options {
            fifo: true,
            group_id: Some("group-1".to_string()),
            ..Options::default()
        };

        let pairs: Vec<_> = (0..24)
            .map(|_| QueuedCommand {
                queue: "test".to_string(),
                command: "true".to_string(),
            })
            .collect();

        let enqueued = pipeline.enqueue_batch(&pairs, &options).await.unwrap();
        assert_eq!(enqueued, 24);
        assert_eq!(memory.message_count("qdone_test.fifo"), 24);
    }

    #[tokio::test]
    async fn concurrent_batches_never_share_a_buffer() {
        let memory = InMemoryQueueClient::new();
        let client: Arc<dyn QueueClient> = Arc::new(memory.clone());

        let non_fifo = pipeline(client.clone());
        let fifo_pipeline = {
            let resolver = Arc::new(Resolver::new(client.clone()));
            EnqueuePipeline::new(client.clone(), resolver, Arc::new(NoopDedupStore))
        };

        let plain_options = Options::default();
        let fifo_options = Options {
            fifo: true,
            ..Options::default()
        };

        let plain_pairs: Vec<_> = (0..15)
            .map(|_| QueuedCommand {
                queue: "plain".to_string(),
                command: "true".to_string(),
            })
            .collect();
        let fifo_pairs: Vec<_> = (0..15)
            .map(|_| QueuedCommand {
                queue: "fifo".to_string(),
                command: "true".to_string(),
            })
            .collect();

        let (plain_result, fifo_result) = tokio::join!(
            non_fifo.enqueue_batch(&plain_pairs, &plain_options),
            fifo_pipeline.enqueue_batch(&fifo_pairs, &fifo_options),
        );

        assert_eq!(plain_result.unwrap(), 15);
        assert_eq!(fifo_result.unwrap(), 15);
        assert_eq!(memory.message_count("qdone_plain"), 15);
        assert_eq!(memory.message_count("qdone_fifo.fifo"), 15);
    }
}
