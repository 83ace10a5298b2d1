use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Backoff schedule: one attempt per `base_delays` entry, then
/// `final_retries` more attempts spaced by `final_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delays: Vec<Duration>,
    pub final_retries: usize,
    pub final_delay: Duration,
}

impl Default for RetryPolicy {
    /// 2s, 4s, 6s, 8s, then 10s x 3
    fn default() -> Self {
        Self {
            base_delays: [2, 4, 6, 8].map(Duration::from_secs).to_vec(),
            final_retries: 3,
            final_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    #[must_use]
    pub fn none() -> Self {
        Self {
            base_delays: vec![Duration::ZERO],
            final_retries: 0,
            final_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.base_delays.len() + self.final_retries
    }

    fn delay_after(&self, attempt: usize) -> Duration {
        self.base_delays
            .get(attempt - 1)
            .copied()
            .unwrap_or(self.final_delay)
    }
}

/// Retry an async operation while `is_transient` accepts its error.
///
/// Returns the first success, the first non-transient error, or the last
/// error once the policy is exhausted.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    mut operation: F,
    policy: &RetryPolicy,
    is_transient: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts().max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "Request failed (attempt {attempt}/{max_attempts}): {e}. Retrying after {}s...",
                    delay.as_secs_f32()
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
