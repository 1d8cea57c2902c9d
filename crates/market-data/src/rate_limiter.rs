use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::sync::Mutex;
use valuation_core::ValuationError;

const MAX_ATTEMPTS: u32 = 3;

/// Sliding-window limiter: at most `max_requests` acquisitions per `window`.
#[derive(Clone)]
pub struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).saturating_duration_since(now) + Duration::from_millis(5),
                None => Duration::from_millis(5),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.2}s for a request slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Send a request through `limiter`, retrying on HTTP 429 after `retry_wait`.
pub(crate) async fn send_with_retry(
    client: &Client,
    limiter: &RateLimiter,
    builder: RequestBuilder,
    provider: &str,
    retry_wait: Duration,
) -> Result<Response, ValuationError> {
    let request = builder
        .build()
        .map_err(|e| ValuationError::DataProvider(e.to_string()))?;

    for attempt in 0..MAX_ATTEMPTS {
        limiter.acquire().await;
        let req_clone = request
            .try_clone()
            .ok_or_else(|| ValuationError::DataProvider("Cannot clone request".to_string()))?;
        let response = client
            .execute(req_clone)
            .await
            .map_err(|e| ValuationError::DataProvider(format!("{} request failed: {}", provider, e)))?;

        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        tracing::warn!(
            "{} 429 rate limited, waiting {:.0}s before retry {}/{}",
            provider,
            retry_wait.as_secs_f64(),
            attempt + 1,
            MAX_ATTEMPTS
        );
        tokio::time::sleep(retry_wait).await;
    }

    Err(ValuationError::DataProvider(format!(
        "Rate limited by {} after {} retries",
        provider, MAX_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_within_budget_is_immediate() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_acquire_waits_for_window_to_slide() {
        let limiter = RateLimiter::new(2, Duration::from_millis(120));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_zero_budget_is_treated_as_one() {
        let limiter = RateLimiter::new(0, Duration::from_millis(50));
        limiter.acquire().await;
        assert_eq!(limiter.timestamps.lock().await.len(), 1);
    }
}
