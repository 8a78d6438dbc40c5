//! Reads `enqueue-batch` input files into `{queue, command}` pairs. A thin
//! adapter the CLI binary owns -- it is not part of the enqueue pipeline's
//! own API surface, only one of its callers.

use std::io::Read;

use qdone_common::{QdoneError, Result};
use qdone_queue::QueuedCommand;

/// Reads every file in `paths` (or stdin for a bare `-`), splitting each
/// non-blank line once on whitespace into `<queueName> <command...>`.
///
/// # Errors
/// Returns `QdoneError::Io` on a read failure, or `QdoneError::Usage` for a
/// line that has no command after the queue name.
pub fn read_pairs(paths: &[String]) -> Result<Vec<QueuedCommand>> {
    let mut pairs = Vec::new();
    for path in paths {
        let contents = if path == "-" {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        } else {
            std::fs::read_to_string(path)?
        };
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let queue = parts.next().unwrap_or_default().to_string();
            let command = parts
                .next()
                .ok_or_else(|| QdoneError::Usage(format!("malformed batch line: {line}")))?
                .trim()
                .to_string();
            if command.is_empty() {
                return Err(QdoneError::Usage(format!("malformed batch line: {line}")));
            }
            pairs.push(QueuedCommand { queue, command });
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reads_pairs_from_a_file() {
        let mut file = tempfile_with("jobs echo hi\nother echo bye\n");
        let pairs = read_pairs(&[file.path_string()]).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].queue, "jobs");
        assert_eq!(pairs[0].command, "echo hi");
        file.close();
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut file = tempfile_with("jobs echo hi\n\n\nother echo bye\n");
        let pairs = read_pairs(&[file.path_string()]).unwrap();
        assert_eq!(pairs.len(), 2);
        file.close();
    }

    #[test]
    fn a_queue_name_with_no_command_is_a_usage_error() {
        let mut file = tempfile_with("jobs\n");
        let err = read_pairs(&[file.path_string()]).unwrap_err();
        assert!(matches!(err, QdoneError::Usage(_)));
        file.close();
    }

    struct TempFile {
        path: std::path::PathBuf,
    }

    impl TempFile {
        fn path_string(&self) -> String {
            self.path.to_string_lossy().to_string()
        }

        fn close(self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn tempfile_with(contents: &str) -> TempFile {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("qdone-batch-test-{}-{unique}", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        TempFile { path }
    }
}
