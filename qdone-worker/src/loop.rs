//! The worker loop (component G): resolves the working set of queues once,
//! then polls each in turn, dispatching received messages to the executor
//! and deciding whether to keep going or drain-and-exit, the same outer
//! shape as the sibling MTA's delivery processor's `serve()` loop but
//! sequential across queues rather than fanned out across connections.

use std::sync::Arc;

use qdone_common::{Options, Result, Shutdown};
use qdone_queue::{ResolveMode, Resolver};
use qdone_sqs::QueueClient;

use crate::executor::{self, JobOutcome};

#[derive(Debug, Clone, Copy, Default)]
pub struct RoundTally {
    pub succeeded: u32,
    pub failed: u32,
    pub empty: bool,
}

impl RoundTally {
    fn record(&mut self, outcome: JobOutcome) {
        self.succeeded += outcome.succeeded;
        self.failed += outcome.failed;
        self.empty = false;
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RoundResult {
    /// Nothing to do: the working set resolved to zero queues.
    NoQueues,
    /// At least one poll happened; the tally reports what ran.
    Tally(RoundTally),
}

/// Drives one or more named or wildcarded queues, grounded on the same
/// `Arc<dyn QueueClient>` abstraction the enqueue side uses so both can be
/// exercised against the in-memory backend in tests.
pub struct Worker {
    client: Arc<dyn QueueClient>,
    resolver: Resolver,
    shutdown: Shutdown,
}

impl Worker {
    #[must_use]
    pub fn new(client: Arc<dyn QueueClient>, resolver: Resolver, shutdown: Shutdown) -> Self {
        Self { client, resolver, shutdown }
    }

    /// Resolves `bases` into the concrete queue URLs to poll this run,
    /// expanding any wildcards and excluding fail queues unless
    /// `--include-failed` is set, then dropping idle queues when
    /// `--active-only` is set.
    ///
    /// # Errors
    /// Propagates resolution failures (e.g. a named queue that does not
    /// exist and cannot be created).
    pub async fn working_set(&self, bases: &[String], options: &Options) -> Result<Vec<String>> {
        let mut urls = Vec::new();

        for base in bases {
            if qdone_queue::is_wildcard(base) {
                let expanded =
                    qdone_queue::expand(&self.client, self.resolver.cache(), base, options).await?;
                for (name, url) in expanded {
                    if !options.include_failed && qdone_sqs::is_fail_queue_name(&name, options) {
                        continue;
                    }
                    urls.push(url);
                }
            } else {
                let qualified = qdone_sqs::naming::qualify(base, options);
                let normalised = qdone_sqs::naming::normalise(&qualified, options);
                if !options.include_failed && qdone_sqs::is_fail_queue_name(&normalised, options) {
                    continue;
                }
                let url = self
                    .resolver
                    .resolve(base, options, ResolveMode::ResolveOnly)
                    .await?;
                urls.push(url);
            }
        }

        if options.active_only {
            let mut active = Vec::with_capacity(urls.len());
            for url in urls {
                let snapshot = self.client.get_queue_attributes(&url).await?;
                if snapshot.is_active() {
                    active.push(url);
                }
            }
            urls = active;
        }

        Ok(urls)
    }

    /// Polls every queue in `urls` once, dispatching any message received to
    /// the executor. Checks the shutdown flag before each poll and before
    /// each dispatch so a signal mid-round stops promptly rather than after
    /// draining every queue.
    pub async fn one_round(&self, urls: &[String], options: &Options) -> RoundResult {
        if urls.is_empty() {
            return RoundResult::NoQueues;
        }

        let mut tally = RoundTally { empty: true, ..RoundTally::default() };

        for url in urls {
            if self.shutdown.requested() {
                break;
            }

            let received = self
                .client
                .receive_message(url, options.wait_time, executor::INITIAL_VISIBILITY_TIMEOUT)
                .await;

            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, queue = %url, "failed to poll queue");
                    continue;
                }
            };

            if self.shutdown.requested() {
                break;
            }

            let outcome = executor::execute(&self.client, url, &message, options, &self.shutdown).await;
            tally.record(outcome);
        }

        RoundResult::Tally(tally)
    }

    /// Outer state machine: `--drain` exits once a full round sees no work;
    /// otherwise loops forever (modulo a shutdown request), the way a
    /// long-running MTA server loops over `tokio::select!` until told to
    /// stop.
    ///
    /// # Errors
    /// Propagates a failure resolving the working set.
    pub async fn listen(&self, bases: &[String], options: &Options) -> Result<RoundTally> {
        let urls = self.working_set(bases, options).await?;
        let mut totals = RoundTally::default();

        loop {
            if self.shutdown.requested() {
                break;
            }

            let round = self.one_round(&urls, options).await;
            let round_tally = match round {
                RoundResult::NoQueues => {
                    tracing::info!("no queues in the working set, nothing to drain");
                    break;
                }
                RoundResult::Tally(tally) => tally,
            };
            totals.succeeded += round_tally.succeeded;
            totals.failed += round_tally.failed;

            if options.drain && round_tally.empty {
                break;
            }
        }

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use qdone_sqs::{InMemoryQueueClient, QueueAttributes};

    use super::*;

    fn worker(memory: InMemoryQueueClient) -> Worker {
        let client: Arc<dyn QueueClient> = Arc::new(memory);
        let resolver = Resolver::new(client.clone());
        Worker::new(client, resolver, Shutdown::new())
    }

    #[tokio::test]
    async fn drain_exits_once_every_queue_is_empty() {
        let memory = InMemoryQueueClient::new();
        let url = memory
            .create_queue("qdone_jobs", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();
        let client: Arc<dyn QueueClient> = Arc::new(memory.clone());
        client
            .send_message(
                &url,
                &qdone_sqs::OutboundMessage { body: "true".to_string(), ..Default::default() },
            )
            .await
            .unwrap();

        let worker = worker(memory.clone());
        let options = Options { drain: true, wait_time: std::time::Duration::from_secs(1), ..Options::default() };

        let tally = worker.listen(&["jobs".to_string()], &options).await.unwrap();
        assert_eq!(tally.succeeded, 1);
        assert_eq!(tally.failed, 0);
        assert_eq!(memory.message_count("qdone_jobs"), 0);
    }

    #[tokio::test]
    async fn fail_queues_are_excluded_from_the_default_working_set() {
        let memory = InMemoryQueueClient::new();
        memory
            .create_queue("qdone_jobs", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();
        memory
            .create_queue("qdone_jobs_failed", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();

        let worker = worker(memory);
        let urls = worker
            .working_set(&["jobs*".to_string()], &Options::default())
            .await
            .unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].ends_with("qdone_jobs"));
    }

    #[tokio::test]
    async fn a_directly_named_fail_queue_is_excluded_without_include_failed() {
        let memory = InMemoryQueueClient::new();
        memory
            .create_queue("qdone_jobs_failed", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();

        let worker = worker(memory);
        let urls = worker
            .working_set(&["jobs_failed".to_string()], &Options::default())
            .await
            .unwrap();
        assert!(urls.is_empty());

        let options = Options { include_failed: true, ..Options::default() };
        let urls = worker
            .working_set(&["jobs_failed".to_string()], &options)
            .await
            .unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].ends_with("qdone_jobs_failed"));
    }

    #[tokio::test]
    async fn requested_shutdown_stops_the_listen_loop() {
        let memory = InMemoryQueueClient::new();
        memory
            .create_queue("qdone_jobs", &QueueAttributes::default(), &HashMap::new())
            .await
            .unwrap();
        let client: Arc<dyn QueueClient> = Arc::new(memory);
        let resolver = Resolver::new(client.clone());
        let shutdown = Shutdown::new();
        shutdown.request();
        let worker = Worker::new(client, resolver, shutdown);

        let options = Options { wait_time: std::time::Duration::from_secs(1), ..Options::default() };
        let tally = worker.listen(&["jobs".to_string()], &options).await.unwrap();
        assert_eq!(tally.succeeded, 0);
        assert_eq!(tally.failed, 0);
    }
}
