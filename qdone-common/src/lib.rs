//! Shared configuration, error taxonomy, signal handling, and logging
//! initialisation used by every `qdone` crate.

pub mod error;
pub mod logging;
pub mod options;
pub mod signal;

pub use error::{FailedEntry, QdoneError, Result};
pub use options::Options;
pub use signal::{Shutdown, Signal};
