use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::token_bucket::TokenBucket;
use crate::domain::errors::{Dimension, RateLimitExhausted};
use crate::domain::models::RateLimitConfig;

/// Multi-dimension admission control shared by every worker.
///
/// Requests are admitted against a request-count bucket and, when enabled,
/// an estimated-token bucket. Buckets are acquired in that order; a grant on
/// the first dimension is not refunded when the second one times out.
#[derive(Debug)]
pub struct RateLimiter {
    requests: TokenBucket,
    tokens: Option<TokenBucket>,
    acquire_timeout: Duration,
    chars_per_token: f64,
}

impl RateLimiter {
    /// Create a limiter from explicit buckets.
    pub const fn new(
        requests: TokenBucket,
        tokens: Option<TokenBucket>,
        acquire_timeout: Duration,
        chars_per_token: f64,
    ) -> Self {
        Self {
            requests,
            tokens,
            acquire_timeout,
            chars_per_token,
        }
    }

    /// Build per-minute buckets from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let tokens = (config.tokens_per_minute > 0)
            .then(|| TokenBucket::per_minute(config.tokens_per_minute as f64));
        Self::new(
            TokenBucket::per_minute(f64::from(config.requests_per_minute)),
            tokens,
            Duration::from_secs(config.acquire_timeout_secs),
            config.chars_per_token,
        )
    }

    /// Estimated token cost of a payload, clamped to the token bucket's
    /// capacity so an oversized prompt can still be admitted.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn estimate_tokens(&self, chars: usize) -> u64 {
        let raw = (chars as f64 / self.chars_per_token).ceil().max(0.0);
        let clamped = self.tokens.as_ref().map_or(raw, |bucket| raw.min(bucket.capacity()));
        clamped as u64
    }

    /// Admit one model call costing `estimated_tokens`.
    pub async fn admit(&self, estimated_tokens: u64) -> Result<(), RateLimitExhausted> {
        self.acquire(Dimension::Requests, &self.requests, 1).await?;
        if let Some(bucket) = &self.tokens {
            self.acquire(Dimension::Tokens, bucket, estimated_tokens).await?;
        }
        Ok(())
    }

    async fn acquire(
        &self,
        dimension: Dimension,
        bucket: &TokenBucket,
        amount: u64,
    ) -> Result<(), RateLimitExhausted> {
        let start = Instant::now();
        if bucket.acquire(amount as f64, self.acquire_timeout).await {
            let waited = start.elapsed();
            if waited > Duration::from_millis(100) {
                debug!(%dimension, amount, waited_ms = waited.as_millis() as u64, "rate limit wait");
            }
            return Ok(());
        }

        let waited = start.elapsed();
        warn!(%dimension, amount, waited_ms = waited.as_millis() as u64, "rate limit exhausted");
        Err(RateLimitExhausted {
            dimension,
            requested: amount,
            waited,
        })
    }

    /// Available budget per dimension.
    pub async fn available(&self) -> Vec<(Dimension, f64)> {
        let mut out = vec![(Dimension::Requests, self.requests.available().await)];
        if let Some(bucket) = &self.tokens {
            out.push((Dimension::Tokens, bucket.available().await));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(requests: f64, tokens: Option<f64>, timeout_ms: u64) -> RateLimiter {
        RateLimiter::new(
            TokenBucket::new(requests, 0.0),
            tokens.map(|t| TokenBucket::new(t, 0.0)),
            Duration::from_millis(timeout_ms),
            4.0,
        )
    }

    #[test]
    fn test_estimate_rounds_up_and_clamps() {
        let l = limiter(1.0, Some(100.0), 10);
        assert_eq!(l.estimate_tokens(9), 3);
        assert_eq!(l.estimate_tokens(0), 0);
        assert_eq!(l.estimate_tokens(10_000), 100);

        let unbounded = limiter(1.0, None, 10);
        assert_eq!(unbounded.estimate_tokens(10_000), 2500);
    }

    #[tokio::test]
    async fn test_admit_consumes_both_dimensions() {
        let l = limiter(2.0, Some(100.0), 10);
        l.admit(40).await.unwrap();

        let available = l.available().await;
        assert_eq!(available[0].0, Dimension::Requests);
        assert!((available[0].1 - 1.0).abs() < 1e-9);
        assert!((available[1].1 - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_request_permit_not_refunded_on_token_denial() {
        let l = limiter(2.0, Some(10.0), 50);
        l.admit(10).await.unwrap();

        let err = l.admit(5).await.unwrap_err();
        assert_eq!(err.dimension, Dimension::Tokens);
        assert_eq!(err.requested, 5);

        // The second request permit stays consumed.
        let available = l.available().await;
        assert!(available[0].1.abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_request_dimension_denial() {
        let l = limiter(1.0, None, 30);
        l.admit(0).await.unwrap();
        let err = l.admit(0).await.unwrap_err();
        assert_eq!(err.dimension, Dimension::Requests);
        assert!(err.waited >= Duration::from_millis(25));
    }

    #[test]
    fn test_from_config_disables_token_dimension() {
        let config = RateLimitConfig {
            tokens_per_minute: 0,
            ..RateLimitConfig::default()
        };
        let l = RateLimiter::from_config(&config);
        assert!(l.tokens.is_none());
        assert!((l.requests.capacity() - 15.0).abs() < f64::EPSILON);
        assert!((l.requests.refill_rate() - 0.25).abs() < f64::EPSILON);
    }
}
