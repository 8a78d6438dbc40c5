//! The supervised job executor (component H), structured failure events
//! (component N), and the outer worker loop (component G).

pub mod events;
pub mod executor;
#[path = "loop.rs"]
pub mod worker_loop;

pub use events::emit_job_failed;
pub use executor::{JobOutcome, execute};
pub use worker_loop::{RoundResult, RoundTally, Worker};
