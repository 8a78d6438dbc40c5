//! External deduplication store (open question, §9 of the design document).
//!
//! The distilled specification calls `dedupShouldEnqueue` and
//! `dedupSuccessfullyProcessed` without defining either. This models the gap
//! as a pluggable trait with a no-op default, leaving the real
//! implementation (Redis, DynamoDB, whatever the deployment already has) to
//! the integrator — the same shape as `empath_spool::BackingStore` standing
//! in front of a filesystem or an in-memory map.

use async_trait::async_trait;

#[async_trait]
pub trait DedupStore: Send + Sync + std::fmt::Debug {
    /// Whether a message with this body should actually be sent. Called
    /// before the send; returning `false` suppresses it.
    async fn should_enqueue(&self, body: &str) -> bool;

    /// Marks a message as durably sent, keyed by the service-assigned id.
    async fn successfully_processed(&self, message_id: &str);

    /// Reverses whatever bookkeeping `should_enqueue` performed, called when
    /// a send that passed the check then failed non-retryably.
    async fn unmark(&self, body: &str);

    /// Batch form of `should_enqueue`; the default implementation checks
    /// each body independently.
    async fn should_enqueue_multi(&self, bodies: &[String]) -> Vec<bool> {
        let mut decisions = Vec::with_capacity(bodies.len());
        for body in bodies {
            decisions.push(self.should_enqueue(body).await);
        }
        decisions
    }
}

/// The default `DedupStore`: every message is sent, nothing is tracked.
#[derive(Debug, Clone, Default)]
pub struct NoopDedupStore;

#[async_trait]
impl DedupStore for NoopDedupStore {
    async fn should_enqueue(&self, _body: &str) -> bool {
        true
    }

    async fn successfully_processed(&self, _message_id: &str) {}

    async fn unmark(&self, _body: &str) {}
}
