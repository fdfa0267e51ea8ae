//! Fixed-delay retry policy shared by the manifest and advisory clients.
//!
//! A policy retries only on the response statuses it is given; transport
//! errors and every other status are returned to the caller on the first
//! attempt.

use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    /// Pause before each retry.
    pub delay: Duration,
    /// Statuses that trigger a retry.
    pub retry_on: Vec<StatusCode>,
}

/// What a retried call ended with.
#[derive(Debug)]
pub enum Attempt {
    /// A response with a status the policy does not retry.
    Response(Response),
    /// Every attempt came back with a retryable status.
    Exhausted { attempts: u32, status: StatusCode },
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration, retry_on: Vec<StatusCode>) -> Self {
        Self {
            max_retries,
            delay,
            retry_on,
        }
    }

    /// Two retries, two seconds apart, on gateway timeouts.
    pub fn gateway_timeout() -> Self {
        Self::new(2, Duration::from_secs(2), vec![StatusCode::GATEWAY_TIMEOUT])
    }

    /// Two retries, one second apart, on rate limiting.
    pub fn rate_limited() -> Self {
        Self::new(2, Duration::from_secs(1), vec![StatusCode::TOO_MANY_REQUESTS])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn is_retryable(&self, status: StatusCode) -> bool {
        self.retry_on.contains(&status)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Sends the request built by `build` until it returns a non-retryable
    /// status or the attempts run out.
    ///
    /// `on_retry` is called with the failed attempt number and its status
    /// before each pause.
    pub async fn send<B, R>(&self, mut build: B, mut on_retry: R) -> reqwest::Result<Attempt>
    where
        B: FnMut() -> RequestBuilder,
        R: FnMut(u32, StatusCode),
    {
        let mut attempt = 1;
        loop {
            let response = build().send().await?;
            let status = response.status();

            if !self.is_retryable(status) {
                return Ok(Attempt::Response(response));
            }
            if attempt >= self.max_attempts() {
                return Ok(Attempt::Exhausted {
                    attempts: attempt,
                    status,
                });
            }

            on_retry(attempt, status);
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_timeout_policy() {
        let policy = RetryPolicy::gateway_timeout();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay, Duration::from_secs(2));
        assert!(policy.is_retryable(StatusCode::GATEWAY_TIMEOUT));
        assert!(!policy.is_retryable(StatusCode::NOT_FOUND));
        assert!(!policy.is_retryable(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn test_rate_limited_policy() {
        let policy = RetryPolicy::rate_limited().with_delay(Duration::ZERO);
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.delay, Duration::ZERO);
        assert!(policy.is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!policy.is_retryable(StatusCode::GATEWAY_TIMEOUT));
    }
}
