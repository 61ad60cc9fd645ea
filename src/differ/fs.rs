//! File reads that tolerate transient writer locks
//!
//! The editor or another process may still hold a changed file when we try to
//! read it. The writer is outside our control, so instead of locking we retry
//! with a fixed delay and a bounded attempt budget.

use crate::core::error::ProduceError;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Run a fallible read until it succeeds or the attempt budget is spent.
///
/// Sleeps `delay` between attempts but not after the final failure, so the
/// total wait for `n` attempts is `(n - 1) * delay`. Returns the number of
/// attempts made when the budget runs out.
pub(crate) async fn retry_read<T, F>(attempts: u32, delay: Duration, mut op: F) -> Result<T, u32>
where
    F: FnMut() -> std::io::Result<T>,
{
    for attempt in 1..=attempts {
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "read succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt == attempts {
                    warn!(attempt, error = %e, "read retry budget exhausted");
                    break;
                }
                debug!(attempt, error = %e, "read failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
    Err(attempts)
}

/// Read a changed file's text, retrying through transient locks.
pub async fn read_file_text_with_retry(
    path: &Path,
    attempts: u32,
    delay: Duration,
) -> Result<String, ProduceError> {
    retry_read(attempts, delay, || std::fs::read_to_string(path))
        .await
        .map_err(|attempts| ProduceError::FileUnavailable {
            path: path.to_path_buf(),
            attempts,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn failing_until(successes_after: u32) -> (Arc<AtomicU32>, impl FnMut() -> std::io::Result<String>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let op = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            if call < successes_after {
                Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "locked by writer",
                ))
            } else {
                Ok("contents".to_string())
            }
        };
        (calls, op)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_k_failures() {
        let (calls, op) = failing_until(3);
        let start = Instant::now();

        let result = retry_read(10, Duration::from_millis(100), op).await;

        assert_eq!(result.unwrap(), "contents");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_fails_after_exactly_ten_attempts() {
        let (calls, op) = failing_until(u32::MAX);
        let start = Instant::now();

        let result = retry_read(10, Duration::from_millis(100), op).await;

        assert_eq!(result.unwrap_err(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        // Nine sleeps between ten attempts.
        assert_eq!(start.elapsed(), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_file_reports_file_unavailable() {
        let result = read_file_text_with_retry(
            Path::new("/nonexistent/source.rs"),
            10,
            Duration::from_millis(100),
        )
        .await;

        match result {
            Err(ProduceError::FileUnavailable { path, attempts }) => {
                assert_eq!(path, Path::new("/nonexistent/source.rs"));
                assert_eq!(attempts, 10);
            }
            other => panic!("expected FileUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_file_returns_content_immediately_when_readable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "fn main() {}\n").unwrap();

        let text = read_file_text_with_retry(file.path(), 10, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(text, "fn main() {}\n");
    }
}
