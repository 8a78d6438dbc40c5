//! The backoff controller (component A), queue resolver/provisioner
//! (component D), enqueue pipeline (component E), and wildcard expander
//! (component F).

pub mod backoff;
pub mod dedup;
pub mod pipeline;
pub mod resolver;
pub mod wildcard;

pub use backoff::Backoff;
pub use dedup::{DedupStore, NoopDedupStore};
pub use pipeline::{EnqueuePipeline, QueuedCommand};
pub use resolver::{ResolveMode, Resolver};
pub use wildcard::{expand, is_wildcard};
