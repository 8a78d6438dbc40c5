//! Queue resolver / provisioner (component D).

use std::sync::Arc;

use qdone_common::{Options, QdoneError, Result};
use qdone_sqs::{QueueAttributes, QueueClient, RedrivePolicy, UrlCache, naming};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    ResolveOnly,
    CreateIfMissing,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    client: Arc<dyn QueueClient>,
    cache: UrlCache,
}

impl Resolver {
    #[must_use]
    pub fn new(client: Arc<dyn QueueClient>) -> Self {
        Self {
            client,
            cache: UrlCache::new(),
        }
    }

    #[must_use]
    pub fn with_cache(client: Arc<dyn QueueClient>, cache: UrlCache) -> Self {
        Self { client, cache }
    }

    #[must_use]
    pub const fn cache(&self) -> &UrlCache {
        &self.cache
    }

    /// Resolves a base queue name to its URL, qualifying and normalising it
    /// first. Creates the full primary/fail/dead-letter chain on demand when
    /// `mode` is [`ResolveMode::CreateIfMissing`].
    ///
    /// # Errors
    /// Returns `QdoneError::NotExist` in resolve-only mode when the queue is
    /// absent, or whatever the queue client surfaces on a creation failure.
    pub async fn resolve(&self, base: &str, options: &Options, mode: ResolveMode) -> Result<String> {
        let qualified = naming::qualify(base, options);
        let normalised = naming::normalise(&qualified, options);

        if let Some(url) = self.cache.get(&normalised) {
            return Ok(url);
        }
        match self.client.get_queue_url(&normalised).await {
            Ok(url) => {
                self.cache.set(normalised, url.clone());
                Ok(url)
            }
            Err(QdoneError::NotExist(_)) if mode == ResolveMode::CreateIfMissing => {
                self.create_primary(&normalised, options).await
            }
            Err(err) => Err(err),
        }
    }

    async fn create_primary(&self, normalised_primary: &str, options: &Options) -> Result<String> {
        let fail_name = naming::fail_name(normalised_primary, options);
        let fail_url = self.resolve_or_create_fail(&fail_name, options).await?;
        let fail_attrs = self.client.get_queue_attributes(&fail_url).await?;

        let attributes = QueueAttributes {
            fifo: options.fifo,
            message_retention_period: options.message_retention_period,
            redrive_policy: Some(RedrivePolicy::new(fail_attrs.arn, 1)),
        };
        let url = self
            .client
            .create_queue(normalised_primary, &attributes, &options.tags)
            .await?;
        self.cache.set(normalised_primary.to_string(), url.clone());
        Ok(url)
    }

    async fn resolve_or_create_fail(&self, fail_name: &str, options: &Options) -> Result<String> {
        if let Some(url) = self.cache.get(fail_name) {
            return Ok(url);
        }
        match self.client.get_queue_url(fail_name).await {
            Ok(url) => {
                self.cache.set(fail_name.to_string(), url.clone());
                Ok(url)
            }
            Err(QdoneError::NotExist(_)) => self.create_fail(fail_name, options).await,
            Err(err) => Err(err),
        }
    }

    async fn create_fail(&self, fail_name: &str, options: &Options) -> Result<String> {
        let redrive_policy = if options.dlq {
            let dlq_name = naming::dlq_name(fail_name, options);
            let dlq_url = self.resolve_or_create_dlq(&dlq_name, options).await?;
            let dlq_attrs = self.client.get_queue_attributes(&dlq_url).await?;
            Some(RedrivePolicy::new(dlq_attrs.arn, options.dlq_after))
        } else {
            None
        };

        let attributes = QueueAttributes {
            fifo: options.fifo,
            message_retention_period: options.message_retention_period,
            redrive_policy,
        };
        let url = self
            .client
            .create_queue(fail_name, &attributes, &options.tags)
            .await?;
        self.cache.set(fail_name.to_string(), url.clone());
        Ok(url)
    }

    async fn resolve_or_create_dlq(&self, dlq_name: &str, options: &Options) -> Result<String> {
        if let Some(url) = self.cache.get(dlq_name) {
            return Ok(url);
        }
        match self.client.get_queue_url(dlq_name).await {
            Ok(url) => {
                self.cache.set(dlq_name.to_string(), url.clone());
                Ok(url)
            }
            Err(QdoneError::NotExist(_)) => {
                let attributes = QueueAttributes {
                    fifo: options.fifo,
                    message_retention_period: options.message_retention_period,
                    redrive_policy: None,
                };
                let url = self
                    .client
                    .create_queue(dlq_name, &attributes, &options.tags)
                    .await?;
                self.cache.set(dlq_name.to_string(), url.clone());
                Ok(url)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use qdone_sqs::InMemoryQueueClient;

    use super::*;

    fn fifo_options() -> Options {
        Options::default()
    }

    #[tokio::test]
    async fn cached_hit_makes_no_client_calls() {
        let client: Arc<dyn QueueClient> = Arc::new(InMemoryQueueClient::new());
        let resolver = Resolver::new(client);
        resolver.cache().set("qdone_testqueue", "https://queue.example/acct/qdone_testqueue");

        let url = resolver
            .resolve("testqueue", &fifo_options(), ResolveMode::ResolveOnly)
            .await
            .unwrap();
        assert_eq!(url, "https://queue.example/acct/qdone_testqueue");
    }

    #[tokio::test]
    async fn cold_resolve_creates_the_fail_queue_then_the_primary() {
        let memory = InMemoryQueueClient::new();
        let client: Arc<dyn QueueClient> = Arc::new(memory.clone());
        let resolver = Resolver::new(client);

        let url = resolver
            .resolve("testQueue", &fifo_options(), ResolveMode::CreateIfMissing)
            .await
            .unwrap();

        assert!(memory.queue_exists("qdone_testQueue"));
        assert!(memory.queue_exists("qdone_testQueue_failed"));
        assert!(url.ends_with("qdone_testQueue"));
    }

    #[tokio::test]
    async fn resolve_only_surfaces_not_exist_without_creating() {
        let client: Arc<dyn QueueClient> = Arc::new(InMemoryQueueClient::new());
        let resolver = Resolver::new(client);
        let err = resolver
            .resolve("testQueue", &fifo_options(), ResolveMode::ResolveOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, QdoneError::NotExist(_)));
    }
}
