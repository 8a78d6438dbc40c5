//! Structured per-job failure events (component N), emitted as one JSON
//! object per line on stdout so log aggregators can pick them up the way
//! the sibling MTA's metrics crate exposes per-status counters -- except
//! here there is no telemetry exporter to ship them through, so they go
//! straight to the process's own stdout.

use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailedEvent<'a> {
    pub event: &'static str,
    pub timestamp: String,
    pub job: &'a str,
    pub command: &'a str,
    pub exit_code: Option<i32>,
    pub kill_signal: Option<i32>,
    pub stderr: String,
    pub stdout: String,
    pub error_message: String,
}

/// Writes a single `JOB_FAILED` record to `writer`. Swallows serialisation
/// errors -- a logging failure must never fail the job itself.
pub fn emit_job_failed(
    writer: &mut dyn std::io::Write,
    job: &str,
    command: &str,
    exit_code: Option<i32>,
    kill_signal: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
    error_message: &str,
) {
    let event = JobFailedEvent {
        event: "JOB_FAILED",
        timestamp: chrono::Utc::now().to_rfc3339(),
        job,
        command,
        exit_code,
        kill_signal,
        stdout: String::from_utf8_lossy(stdout).to_string(),
        stderr: String::from_utf8_lossy(stderr).to_string(),
        error_message: error_message.to_string(),
    };
    match serde_json::to_string(&event) {
        Ok(line) => {
            let _ = writeln!(writer, "{line}");
        }
        Err(e) => tracing::error!(error = %e, "failed to serialise JOB_FAILED event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_one_json_line_with_the_expected_fields() {
        let mut buffer = Vec::new();
        emit_job_failed(
            &mut buffer,
            "01J0000000000000000000000",
            "false",
            Some(1),
            None,
            b"",
            b"boom",
            "exit code 1",
        );
        let line = String::from_utf8(buffer).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["event"], "JOB_FAILED");
        assert_eq!(value["command"], "false");
        assert_eq!(value["exitCode"], 1);
        assert_eq!(value["stderr"], "boom");
    }
}
