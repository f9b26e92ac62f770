use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::GrabError;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails with something other than a rate
    /// limit, or the attempts run out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GrabError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GrabError>>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Err(GrabError::RateLimited(message)) => {
                    warn!("rate limited on attempt {attempt}/{attempts}: {message}");
                    if attempt < attempts {
                        sleep(self.delay).await;
                    }
                }
                result => return result,
            }
        }
        Err(GrabError::RetriesExhausted)
    }
}
