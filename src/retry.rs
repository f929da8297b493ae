use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

/// Drive `attempt_fn` until it succeeds, fails fatally, or the retry budget
/// runs out.
///
/// Each attempt yields a nested result: the outer error aborts immediately
/// (client errors where another attempt cannot help), the inner error is
/// transient (network trouble, 5xx, rate limiting) and is retried after an
/// exponential backoff delay. `what` names the operation in log lines.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryConfig,
    what: &str,
    mut attempt_fn: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Result<T, E>, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        match attempt_fn().await? {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_retries {
                    return Err(e);
                }
                tracing::warn!(
                    "{} attempt {}/{} failed: {}",
                    what,
                    attempt + 1,
                    policy.max_retries + 1,
                    e
                );
            }
        }
        attempt += 1;
        tokio::time::sleep(Duration::from_millis(policy.backoff_delay_ms(attempt))).await;
    }
}
