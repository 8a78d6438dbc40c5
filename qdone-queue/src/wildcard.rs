//! Wildcard queue-name expansion (component F).

use std::sync::Arc;

use qdone_common::{Options, Result};
use qdone_sqs::{QueueClient, UrlCache, naming};

#[must_use]
pub fn is_wildcard(base: &str) -> bool {
    base.ends_with('*')
}

/// Lists every queue matching `base*`, filtered to FIFO or non-FIFO names
/// depending on `options.fifo`, ingests the listing into `cache`, and
/// returns `(name, url)` pairs.
///
/// # Errors
/// Propagates whatever the queue client's `ListQueues` call returns.
pub async fn expand(
    client: &Arc<dyn QueueClient>,
    cache: &UrlCache,
    base: &str,
    options: &Options,
) -> Result<Vec<(String, String)>> {
    let stem = base.strip_suffix('*').unwrap_or(base);
    let prefix = naming::qualify(stem, options);

    let urls = client.list_queues(&prefix).await?;
    cache.ingest(&urls);

    Ok(urls
        .into_iter()
        .filter_map(|url| {
            let name = url.rsplit('/').next().unwrap_or(&url).to_string();
            (name.ends_with(".fifo") == options.fifo).then_some((name, url))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use qdone_sqs::{InMemoryQueueClient, QueueAttributes};

    use super::*;

    #[tokio::test]
    async fn expand_filters_by_fifo_suffix() {
        let memory = InMemoryQueueClient::new();
        memory
            .create_queue("qdone_orders", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();
        memory
            .create_queue("qdone_orders.fifo", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();
        memory
            .create_queue("qdone_other", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();

        let client: Arc<dyn QueueClient> = Arc::new(memory);
        let cache = UrlCache::new();

        let options = Options::default();
        let pairs = expand(&client, &cache, "orders*", &options).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "qdone_orders");

        let fifo_options = Options {
            fifo: true,
            ..Options::default()
        };
        let fifo_pairs = expand(&client, &cache, "orders*", &fifo_options).await.unwrap();
        assert_eq!(fifo_pairs.len(), 1);
        assert_eq!(fifo_pairs[0].0, "qdone_orders.fifo");
    }
}
