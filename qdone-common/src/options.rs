//! The canonical configuration object, assembled once from CLI flags (and
//! environment, where `clap`'s `env` feature applies) and passed by
//! reference through the rest of the call graph. No other module reads
//! process arguments or environment variables directly.

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

mod defaults {
    use std::time::Duration;

    pub fn prefix() -> String {
        "qdone_".to_string()
    }

    pub fn fail_suffix() -> String {
        "_failed".to_string()
    }

    pub fn dlq_suffix() -> String {
        "_dlq".to_string()
    }

    pub const fn dlq_after() -> u32 {
        3
    }

    pub const fn message_retention_period() -> Duration {
        Duration::from_secs(14 * 24 * 60 * 60)
    }

    pub const fn send_retries() -> u32 {
        3
    }

    pub const fn jitter_fraction() -> f64 {
        0.5
    }

    pub const fn backoff_base() -> f64 {
        2.0
    }

    pub const fn kill_after() -> Duration {
        Duration::from_secs(30)
    }

    pub const fn wait_time() -> Duration {
        Duration::from_secs(20)
    }
}

/// Canonical, fully-resolved configuration for a single `qdone` invocation.
///
/// `clap` parses flags into this struct in the CLI layer (component I); every
/// other component takes `&Options` (or a cheap `Arc<Options>` clone) rather
/// than individual flag values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    #[serde(default = "defaults::prefix")]
    pub prefix: String,

    #[serde(default = "defaults::fail_suffix")]
    pub fail_suffix: String,

    #[serde(default = "defaults::dlq_suffix")]
    pub dlq_suffix: String,

    #[serde(default)]
    pub fifo: bool,

    #[serde(default)]
    pub group_id: Option<String>,

    #[serde(default)]
    pub group_id_per_message: bool,

    #[serde(default)]
    pub deduplication_id: Option<String>,

    #[serde(default)]
    pub delay: Option<Duration>,

    #[serde(default)]
    pub dlq: bool,

    #[serde(default = "defaults::dlq_after")]
    pub dlq_after: u32,

    #[serde(default = "defaults::message_retention_period")]
    pub message_retention_period: Duration,

    #[serde(default = "defaults::send_retries")]
    pub send_retries: u32,

    #[serde(default = "defaults::jitter_fraction")]
    pub jitter_fraction: f64,

    #[serde(default = "defaults::backoff_base")]
    pub backoff_base: f64,

    #[serde(default = "defaults::kill_after")]
    pub kill_after: Duration,

    #[serde(default = "defaults::wait_time")]
    pub wait_time: Duration,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub quiet: bool,

    #[serde(default)]
    pub include_failed: bool,

    #[serde(default)]
    pub active_only: bool,

    #[serde(default)]
    pub drain: bool,

    #[serde(default)]
    pub tags: HashMap<String, String>,

    #[serde(default)]
    pub external_dedup: bool,

    #[serde(default)]
    pub region: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prefix: defaults::prefix(),
            fail_suffix: defaults::fail_suffix(),
            dlq_suffix: defaults::dlq_suffix(),
            fifo: false,
            group_id: None,
            group_id_per_message: false,
            deduplication_id: None,
            delay: None,
            dlq: false,
            dlq_after: defaults::dlq_after(),
            message_retention_period: defaults::message_retention_period(),
            send_retries: defaults::send_retries(),
            jitter_fraction: defaults::jitter_fraction(),
            backoff_base: defaults::backoff_base(),
            kill_after: defaults::kill_after(),
            wait_time: defaults::wait_time(),
            verbose: false,
            quiet: false,
            include_failed: false,
            active_only: false,
            drain: false,
            tags: HashMap::new(),
            external_dedup: false,
            region: None,
        }
    }
}

impl Options {
    /// Validates the combinations that `clap`'s own parser can't express,
    /// matching the boundary behaviours in the specification's testable
    /// properties: `--drain` requires long-polling, and the worker timeouts
    /// must stay within the hosted service's own limits.
    ///
    /// # Errors
    /// Returns `QdoneError::Usage` describing the first violated rule.
    pub fn validate(&self) -> crate::Result<()> {
        if self.drain && self.wait_time.is_zero() {
            return Err(crate::QdoneError::Usage(
                "--drain requires --wait-time greater than 0".to_string(),
            ));
        }
        if self.wait_time.as_secs() > 20 {
            return Err(crate::QdoneError::Usage(
                "--wait-time must be between 0 and 20 seconds".to_string(),
            ));
        }
        if self.kill_after.as_secs() > 12 * 60 * 60 {
            return Err(crate::QdoneError::Usage(
                "--kill-after must be between 0 and 43200 seconds".to_string(),
            ));
        }
        if !(0.1..=1.0).contains(&self.jitter_fraction) {
            return Err(crate::QdoneError::Usage(
                "jitter fraction must be between 0.1 and 1".to_string(),
            ));
        }
        if !(1.0..=10.0).contains(&self.backoff_base) {
            return Err(crate::QdoneError::Usage(
                "backoff base must be between 1 and 10".to_string(),
            ));
        }
        if self.send_retries < 1 {
            return Err(crate::QdoneError::Usage(
                "send-retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let opts = Options::default();
        assert_eq!(opts.prefix, "qdone_");
        assert_eq!(opts.fail_suffix, "_failed");
        assert_eq!(opts.dlq_after, 3);
        assert_eq!(opts.message_retention_period, Duration::from_secs(1_209_600));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn drain_without_long_polling_is_rejected() {
        let mut opts = Options {
            drain: true,
            wait_time: Duration::ZERO,
            ..Options::default()
        };
        assert!(matches!(opts.validate(), Err(crate::QdoneError::Usage(_))));
        opts.wait_time = Duration::from_secs(5);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn wait_time_out_of_range_is_rejected() {
        let opts = Options {
            wait_time: Duration::from_secs(21),
            ..Options::default()
        };
        assert!(matches!(opts.validate(), Err(crate::QdoneError::Usage(_))));
    }

    #[test]
    fn kill_after_out_of_range_is_rejected() {
        let opts = Options {
            kill_after: Duration::from_secs(12 * 60 * 60 + 1),
            ..Options::default()
        };
        assert!(matches!(opts.validate(), Err(crate::QdoneError::Usage(_))));
    }
}
