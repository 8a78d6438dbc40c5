//! Job executor (component H): runs the message body as a shell command
//! under supervision, extending its visibility timeout while it runs and
//! killing the whole process tree if it overruns `kill_after`.

use std::{
    os::unix::process::CommandExt,
    process::Stdio,
    sync::Arc,
    time::{Duration, Instant},
};

use qdone_common::{Options, Shutdown, Signal};
use qdone_sqs::{QueueClient, ReceivedMessage};
use tokio::process::Command;

use crate::events::emit_job_failed;

pub(crate) const INITIAL_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
const TWELVE_HOURS: Duration = Duration::from_secs(12 * 60 * 60);
const KILL_GRACE_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default)]
pub struct JobOutcome {
    pub succeeded: u32,
    pub failed: u32,
}

/// Runs `message`'s body as `nice <body>` under a new process group, deletes
/// the message on a clean exit, and emits a `JOB_FAILED` record otherwise.
/// Never returns an error -- failure is reported through the outcome and the
/// structured event, exactly as the worker loop expects.
pub async fn execute(
    client: &Arc<dyn QueueClient>,
    queue_url: &str,
    message: &ReceivedMessage,
    options: &Options,
    shutdown: &Shutdown,
) -> JobOutcome {
    let job_start = Instant::now();

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(format!("nice {}", message.body))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // SAFETY: `setsid` is async-signal-safe and takes no arguments; it only
    // detaches the child into its own process group so the watchdog can
    // signal the whole tree via a negative pid.
    unsafe {
        command.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            emit_job_failed(
                &mut std::io::stdout(),
                &message.message_id,
                &message.body,
                None,
                None,
                b"",
                b"",
                &format!("failed to spawn job: {e}"),
            );
            return JobOutcome { succeeded: 0, failed: 1 };
        }
    };
    let pid = child.id();

    let extender = tokio::spawn(extend_visibility(
        client.clone(),
        queue_url.to_string(),
        message.receipt_handle.clone(),
        job_start,
        options.kill_after,
    ));
    let watchdog = tokio::spawn(kill_after_timeout(pid, options.kill_after));
    let halt = tokio::spawn(halt_on_second_signal(shutdown.subscribe(), pid));

    let output = child.wait_with_output().await;
    extender.abort();
    watchdog.abort();
    halt.abort();

    match output {
        Ok(output) if output.status.success() => {
            if let Err(e) = client.delete_message(queue_url, &message.receipt_handle).await {
                tracing::warn!(error = %e, job = %message.message_id, "failed to delete message after successful job");
            }
            JobOutcome { succeeded: 1, failed: 0 }
        }
        Ok(output) => {
            emit_job_failed(
                &mut std::io::stdout(),
                &message.message_id,
                &message.body,
                output.status.code(),
                unix_kill_signal(&output.status),
                &output.stdout,
                &output.stderr,
                "child process exited unsuccessfully",
            );
            JobOutcome { succeeded: 0, failed: 1 }
        }
        Err(e) => {
            emit_job_failed(
                &mut std::io::stdout(),
                &message.message_id,
                &message.body,
                None,
                None,
                b"",
                b"",
                &format!("failed to wait for job: {e}"),
            );
            JobOutcome { succeeded: 0, failed: 1 }
        }
    }
}

#[cfg(unix)]
fn unix_kill_signal(status: &std::process::ExitStatus) -> Option<i32> {
    std::os::unix::process::ExitStatusExt::signal(status)
}

#[cfg(not(unix))]
fn unix_kill_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// Periodically extends the message's visibility timeout while the job
/// runs, doubling each time up to the lesser of 12 hours and `kill_after`.
/// Logs and stops (rather than erroring) when extension fails -- the job is
/// out of time regardless, and the hosted service will reclaim the message.
async fn extend_visibility(
    client: Arc<dyn QueueClient>,
    queue_url: String,
    receipt_handle: String,
    job_start: Instant,
    kill_after: Duration,
) {
    let cap = TWELVE_HOURS.min(kill_after);
    let mut visibility_timeout = INITIAL_VISIBILITY_TIMEOUT;

    loop {
        tokio::time::sleep(visibility_timeout / 2).await;

        let elapsed = job_start.elapsed();
        if elapsed >= cap {
            break;
        }
        let remaining = cap - elapsed;
        let doubled = visibility_timeout.saturating_mul(2);
        let next_timeout = doubled.min(remaining);

        if let Err(e) = client
            .change_message_visibility(&queue_url, &receipt_handle, next_timeout)
            .await
        {
            tracing::warn!(error = %e, "visibility timeout extension failed");
            break;
        }

        if elapsed + next_timeout >= cap {
            tracing::warn!("last visibility extension before the kill-after cap");
            break;
        }
        visibility_timeout = next_timeout;
    }
}

/// Fires once, `kill_after` after job start: SIGTERM the whole process
/// group, then SIGKILL one second later if it is still alive.
async fn kill_after_timeout(pid: Option<u32>, kill_after: Duration) {
    tokio::time::sleep(kill_after).await;
    let Some(pid) = pid else { return };
    let pgid = -(i64::from(pid) as libc::pid_t);

    tracing::warn!(pid, "kill-after elapsed, sending SIGTERM to the job's process group");
    // SAFETY: `pgid` is a plain integer; `kill` is async-signal-safe and
    // has no aliasing requirements on its arguments.
    unsafe {
        libc::kill(pgid, libc::SIGTERM);
    }

    tokio::time::sleep(KILL_GRACE_PERIOD).await;
    tracing::warn!(pid, "job still alive after SIGTERM, sending SIGKILL");
    unsafe {
        libc::kill(pgid, libc::SIGKILL);
    }
}

/// Waits for a second shutdown signal (`Signal::Halt`) and force-kills the
/// job's process group the instant it arrives, rather than waiting for
/// `kill_after` like the ordinary watchdog does.
async fn halt_on_second_signal(mut rx: tokio::sync::broadcast::Receiver<Signal>, pid: Option<u32>) {
    loop {
        match rx.recv().await {
            Ok(Signal::Halt) => break,
            Ok(Signal::Shutdown) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }

    let Some(pid) = pid else { return };
    let pgid = -(i64::from(pid) as libc::pid_t);
    tracing::warn!(pid, "second shutdown signal received, force-killing the job's process group");
    // SAFETY: `pgid` is a plain integer; `kill` is async-signal-safe and has
    // no aliasing requirements on its arguments.
    unsafe {
        libc::kill(pgid, libc::SIGKILL);
    }
}
