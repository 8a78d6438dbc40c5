//! `qdone`: enqueue shell commands onto a hosted queue, or run a worker that
//! polls one or more queues and executes whatever it receives.

mod batch;
mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use qdone_common::{Options, QdoneError, Shutdown};
use qdone_queue::{DedupStore, EnqueuePipeline, NoopDedupStore, Resolver};
use qdone_sqs::{AwsQueueClient, QueueClient};
use qdone_worker::Worker;

/// Picks the dedup store backing `--external-dedup`. `NoopDedupStore` is the
/// only backend shipped today (no integration target is named anywhere in
/// the design), but the selection lives here rather than being hardcoded at
/// each pipeline construction site so a real backend only has to be plugged
/// in once this function returns something else.
fn dedup_store(options: &Options) -> Arc<dyn DedupStore> {
    if options.external_dedup {
        tracing::debug!("external dedup enabled, no backing store configured: falling back to no-op");
    }
    Arc::new(NoopDedupStore)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    qdone_common::logging::init(cli.global.verbose, cli.global.quiet);

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "qdone exiting with an error");
            e.exit_code()
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> qdone_common::Result<()> {
    let options = cli.options()?;
    let client: Arc<dyn QueueClient> = Arc::new(AwsQueueClient::from_env(options.region.clone()).await);

    match cli.command {
        Command::Enqueue { queue, command, .. } => {
            if command.is_empty() {
                return Err(QdoneError::Usage("enqueue requires a command".to_string()));
            }
            let resolver = Arc::new(Resolver::new(client.clone()));
            let pipeline = EnqueuePipeline::new(client, resolver, dedup_store(&options));
            let outcome = pipeline.enqueue_one(&queue, &command.join(" "), &options).await?;
            tracing::info!(message_id = %outcome.message_id, queue = %queue, "enqueued");
        }
        Command::EnqueueBatch { files, .. } => {
            let pairs = batch::read_pairs(&files)?;
            let resolver = Arc::new(Resolver::new(client.clone()));
            let pipeline = EnqueuePipeline::new(client, resolver, dedup_store(&options));
            let enqueued = pipeline.enqueue_batch(&pairs, &options).await?;
            tracing::info!(enqueued, "batch enqueue complete");
        }
        Command::Worker { queue, .. } => {
            let shutdown = Shutdown::new();
            let signal_handle = tokio::spawn(shutdown.clone().listen_for_os_signals());
            let resolver = Resolver::new(client.clone());
            let worker = Worker::new(client, resolver, shutdown);

            let tally = worker.listen(&queue, &options).await?;
            tracing::info!(succeeded = tally.succeeded, failed = tally.failed, "worker stopped");
            signal_handle.abort();
        }
    }

    Ok(())
}
