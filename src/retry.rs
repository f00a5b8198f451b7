use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Default total attempts for external calls
pub const DEFAULT_RETRIES: u32 = 3;
/// Fixed delay between attempts
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Invoke an async operation up to `retries` times with a fixed delay
/// between attempts. Each failed attempt before the last emits a warning;
/// the final failure propagates unchanged. No jitter, no backoff.
pub async fn with_retry<T, E, F, Fut>(
    label: &str,
    retries: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                tracing::warn!("{}: retry {}/{} failed: {}", label, attempt, retries, e);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry("op", 3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry("op", 3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err("transient".to_string())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_propagates_final_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry("op", 3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;

        // Third attempt fails and the error surfaces unchanged
        assert_eq!(result.unwrap_err(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
