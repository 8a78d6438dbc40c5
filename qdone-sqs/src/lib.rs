//! Queue naming (component B), the process-wide URL cache (component C),
//! and a hosted-queue-service client abstraction (component M) with both a
//! real (`aws-sdk-sqs`) and an in-memory backend.

pub mod backends;
pub mod cache;
pub mod client;
pub mod naming;

pub use backends::{AwsQueueClient, InMemoryQueueClient};
pub use cache::UrlCache;
pub use client::{
    BatchEntry, BatchOutcome, OutboundMessage, QueueAttributes, QueueAttributesSnapshot,
    QueueClient, ReceivedMessage, RedrivePolicy, SendOutcome,
};
pub use naming::is_fail_queue_name;
