use crate::infrastructure::error::InfraError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 0..retry {
            delay = delay.saturating_mul(3) / 2;
        }
        delay
    }
}

pub async fn retry_on_server_error<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, InfraError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, InfraError>>,
{
    let mut retry: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_server_error() && retry < policy.max_retries => {
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    operation = label,
                    retry = retry + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "server error, retrying"
                );
                sleep(delay).await;
                retry = retry.saturating_add(1);
            }
            Err(error) => return Err(error),
        }
    }
}
