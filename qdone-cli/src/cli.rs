//! Argument parsing (component I). One top-level struct carries every global
//! flag; each subcommand gets its own flags plus whatever global ones it
//! legitimately uses, the same shape the sibling MTA binary keeps for its own
//! entry point rather than duplicating flags per subcommand.

use std::{collections::HashMap, time::Duration};

use clap::{Parser, Subcommand};
use qdone_common::{Options, QdoneError, Result};

#[derive(Parser, Debug)]
#[command(name = "qdone", version, about = "A command-line job queue backed by a hosted message queue")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Prepended to every queue name.
    #[arg(long, global = true, default_value = "qdone_")]
    pub prefix: String,

    /// Suffix used to derive a queue's failed-job queue name.
    #[arg(long, global = true, default_value = "_failed")]
    pub fail_suffix: String,

    /// Suffix used to derive a failed queue's dead-letter queue name.
    #[arg(long, global = true, default_value = "_dlq")]
    pub dlq_suffix: String,

    /// Hosted queue service region, if not picked up from the ambient config.
    #[arg(long, global = true, env = "QDONE_REGION")]
    pub region: Option<String>,

    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enqueue a single command onto a queue.
    Enqueue {
        queue: String,
        command: Vec<String>,

        #[arg(long)]
        fifo: bool,
        #[arg(long)]
        group_id: Option<String>,
        #[arg(long)]
        group_id_per_message: bool,
        #[arg(long)]
        deduplication_id: Option<String>,
        #[arg(long, value_parser = parse_seconds)]
        delay: Option<Duration>,
        #[arg(long)]
        dlq: bool,
        #[arg(long, default_value_t = 3)]
        dlq_after: u32,
        #[arg(long, default_value_t = 3)]
        send_retries: u32,
        /// Tag applied to a queue this invocation creates, `key=value`.
        /// Repeatable.
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
        /// Suppress duplicate enqueues via the external dedup store.
        #[arg(long)]
        external_dedup: bool,
        #[arg(long, value_parser = parse_seconds)]
        message_retention_period: Option<Duration>,
    },

    /// Enqueue every `<queueName> <command...>` line of one or more files
    /// (`-` for standard input).
    EnqueueBatch {
        files: Vec<String>,

        #[arg(long)]
        fifo: bool,
        #[arg(long)]
        group_id: Option<String>,
        #[arg(long)]
        group_id_per_message: bool,
        #[arg(long, default_value_t = 3)]
        send_retries: u32,
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
        #[arg(long)]
        external_dedup: bool,
        #[arg(long, value_parser = parse_seconds)]
        message_retention_period: Option<Duration>,
    },

    /// Poll one or more named or wildcarded queues and run their jobs.
    Worker {
        queue: Vec<String>,

        #[arg(long, default_value = "30", value_parser = parse_seconds)]
        kill_after: Duration,
        #[arg(long, default_value = "20", value_parser = parse_seconds)]
        wait_time: Duration,
        #[arg(long)]
        include_failed: bool,
        #[arg(long)]
        active_only: bool,
        #[arg(long)]
        drain: bool,
        #[arg(long)]
        fifo: bool,
    },
}

fn parse_seconds(raw: &str) -> std::result::Result<Duration, String> {
    raw.parse::<u64>().map(Duration::from_secs).map_err(|e| e.to_string())
}

fn parse_tag(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

impl Cli {
    /// Builds the canonical [`Options`] for whichever subcommand is active
    /// and validates it, turning parser-unreachable conflicts (e.g.
    /// `--drain` with `--wait-time 0`) into a [`QdoneError::Usage`].
    pub fn options(&self) -> Result<Options> {
        let mut options = Options {
            prefix: self.global.prefix.clone(),
            fail_suffix: self.global.fail_suffix.clone(),
            dlq_suffix: self.global.dlq_suffix.clone(),
            region: self.global.region.clone(),
            verbose: self.global.verbose,
            quiet: self.global.quiet,
            ..Options::default()
        };

        match &self.command {
            Command::Enqueue {
                fifo,
                group_id,
                group_id_per_message,
                deduplication_id,
                delay,
                dlq,
                dlq_after,
                send_retries,
                tags,
                external_dedup,
                message_retention_period,
                ..
            } => {
                options.fifo = *fifo;
                options.group_id = group_id.clone();
                options.group_id_per_message = *group_id_per_message;
                options.deduplication_id = deduplication_id.clone();
                options.delay = *delay;
                options.dlq = *dlq;
                options.dlq_after = *dlq_after;
                options.send_retries = *send_retries;
                options.tags = tags.iter().cloned().collect::<HashMap<_, _>>();
                options.external_dedup = *external_dedup;
                if let Some(retention) = message_retention_period {
                    options.message_retention_period = *retention;
                }
            }
            Command::EnqueueBatch {
                fifo,
                group_id,
                group_id_per_message,
                send_retries,
                tags,
                external_dedup,
                message_retention_period,
                ..
            } => {
                options.fifo = *fifo;
                options.group_id = group_id.clone();
                options.group_id_per_message = *group_id_per_message;
                options.send_retries = *send_retries;
                options.tags = tags.iter().cloned().collect::<HashMap<_, _>>();
                options.external_dedup = *external_dedup;
                if let Some(retention) = message_retention_period {
                    options.message_retention_period = *retention;
                }
            }
            Command::Worker { kill_after, wait_time, include_failed, active_only, drain, fifo, .. } => {
                options.kill_after = *kill_after;
                options.wait_time = *wait_time;
                options.include_failed = *include_failed;
                options.active_only = *active_only;
                options.drain = *drain;
                options.fifo = *fifo;
            }
        }

        options.validate().map_err(|e| match e {
            QdoneError::Usage(msg) => QdoneError::Usage(msg),
            other => other,
        })?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_with_zero_wait_time_is_rejected_after_parsing() {
        let cli = Cli::parse_from(["qdone", "worker", "jobs", "--drain", "--wait-time", "0"]);
        assert!(matches!(cli.options(), Err(QdoneError::Usage(_))));
    }

    #[test]
    fn worker_defaults_match_the_documented_values() {
        let cli = Cli::parse_from(["qdone", "worker", "jobs"]);
        let options = cli.options().unwrap();
        assert_eq!(options.kill_after, Duration::from_secs(30));
        assert_eq!(options.wait_time, Duration::from_secs(20));
    }

    #[test]
    fn enqueue_threads_tags_dedup_and_retention_into_options() {
        let cli = Cli::parse_from([
            "qdone",
            "enqueue",
            "jobs",
            "--tag",
            "team=payments",
            "--external-dedup",
            "--message-retention-period",
            "3600",
            "echo",
            "hi",
        ]);
        let options = cli.options().unwrap();
        assert_eq!(options.tags.get("team"), Some(&"payments".to_string()));
        assert!(options.external_dedup);
        assert_eq!(options.message_retention_period, Duration::from_secs(3600));
    }

    #[test]
    fn enqueue_carries_the_queue_and_command() {
        let cli = Cli::parse_from(["qdone", "enqueue", "jobs", "echo", "hi"]);
        match cli.command {
            Command::Enqueue { queue, command, .. } => {
                assert_eq!(queue, "jobs");
                assert_eq!(command, vec!["echo", "hi"]);
            }
            _ => panic!("expected Enqueue"),
        }
    }
}
