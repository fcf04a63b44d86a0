/// Per-client rate limiting for anonymous endpoints
///
/// `POST /v1/users/token/code` accepts a 6-digit code, so it is throttled per
/// client IP to keep brute-forcing the code space impractical. State lives in
/// process memory: one token bucket per IP behind a mutex.
///
/// The key is the socket peer unless `API_TRUSTED_PROXY_HOPS` is set, so a
/// client cannot pick a fresh bucket by sending its own `X-Forwarded-For`.
///
/// # Algorithm
///
/// Uses token bucket algorithm:
/// - Tokens refill at constant rate
/// - Each request consumes 1 token
/// - Request blocked if bucket empty
///
/// # Headers
///
/// Response includes rate limit headers:
/// - `X-RateLimit-Limit`: Total requests allowed per minute
/// - `X-RateLimit-Remaining`: Tokens remaining
/// - `Retry-After`: Seconds to wait (429 responses only)

use crate::app::AppState;
use crate::client::client_ip;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Buckets idle this long are full again and can be forgotten
const IDLE_EVICTION: Duration = Duration::from_secs(600);

/// Start evicting idle buckets past this many tracked clients
const EVICTION_THRESHOLD: usize = 10_000;

/// Rate limit configuration
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        RateLimit {
            requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }
}

/// Token bucket state for one client
#[derive(Debug, Clone)]
struct TokenBucket {
    /// Current number of tokens
    tokens: f64,

    /// Last refill time
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a new full bucket
    fn new(capacity: u32, now: Instant) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Refills tokens based on elapsed time
    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed_secs = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed_secs * rate).min(capacity as f64);
        self.last_refill = now;
    }

    /// Attempts to consume N tokens
    fn try_consume(&mut self, count: f64) -> bool {
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    /// Calculates seconds until N tokens available
    fn seconds_until_available(&self, count: f64, rate: f64) -> u64 {
        let deficit = count - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Result of rate limit check
#[derive(Debug, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub ok: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Seconds until the next request would be allowed
    pub retry_after: u64,
}

/// In-memory limiter keyed by client
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    pub fn check(&self, key: &str) -> RateLimitResult {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
        let RateLimit {
            refill_rate,
            bucket_capacity,
            ..
        } = self.limit;

        // A poisoned map only holds counters; keep using it
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if buckets.len() >= EVICTION_THRESHOLD {
            buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < IDLE_EVICTION);
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(bucket_capacity, now));
        bucket.refill(refill_rate, bucket_capacity, now);

        if bucket.try_consume(1.0) {
            RateLimitResult {
                ok: true,
                remaining: bucket.tokens.floor() as u32,
                retry_after: 0,
            }
        } else {
            RateLimitResult {
                ok: false,
                remaining: 0,
                retry_after: bucket.seconds_until_available(1.0, refill_rate).max(1),
            }
        }
    }
}

/// Throttles the wrapped routes per client IP
///
/// # Errors
///
/// - 429 Too Many Requests: Rate limit exceeded
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_ip(&request).unwrap_or_else(|| "unknown".to_string());
    let result = state.limiter.check(&key);

    if !result.ok {
        tracing::warn!(client = %key, retry_after = result.retry_after, "Rate limit exceeded");
        return Err(create_rate_limit_error(result));
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(state.limiter.limit().requests_per_minute),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));

    Ok(response)
}

/// Creates a rate limit exceeded error response
fn create_rate_limit_error(result: RateLimitResult) -> ApiError {
    ApiError::RateLimitExceeded {
        retry_after: result.retry_after,
        message: format!(
            "Rate limit exceeded. Try again in {} seconds",
            result.retry_after
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_per_minute() {
        let limit = RateLimit::per_minute(60);
        assert_eq!(limit.bucket_capacity, 60);
        assert_eq!(limit.refill_rate, 1.0);

        let limit = RateLimit::per_minute(10);
        assert!((limit.refill_rate - 0.1667).abs() < 0.001);
    }

    #[test]
    fn test_token_bucket_consume() {
        let mut bucket = TokenBucket::new(10, Instant::now());
        assert!(bucket.try_consume(1.0));
        assert_eq!(bucket.tokens, 9.0);
        assert!(bucket.try_consume(5.0));
        assert_eq!(bucket.tokens, 4.0);
        assert!(!bucket.try_consume(10.0));
        assert_eq!(bucket.tokens, 4.0); // Unchanged after failed attempt
    }

    #[test]
    fn test_token_bucket_refill_capped() {
        let start = Instant::now();
        let mut bucket = TokenBucket {
            tokens: 5.0,
            last_refill: start,
        };

        bucket.refill(1.0, 100, start + Duration::from_secs(10));
        assert!((bucket.tokens - 15.0).abs() < 0.01);

        bucket.refill(1.0, 100, start + Duration::from_secs(1000));
        assert_eq!(bucket.tokens, 100.0);
    }

    #[test]
    fn test_token_bucket_seconds_until_available() {
        let bucket = TokenBucket {
            tokens: 2.0,
            last_refill: Instant::now(),
        };

        // Need 5 tokens, have 2, rate is 1/sec -> need 3 seconds
        assert_eq!(bucket.seconds_until_available(5.0, 1.0), 3);
        assert_eq!(bucket.seconds_until_available(1.0, 1.0), 0);
    }

    #[test]
    fn test_limiter_blocks_after_burst_and_recovers() {
        let limiter = RateLimiter::new(RateLimit::per_minute(3));
        let start = Instant::now();

        for remaining in [2, 1, 0] {
            let result = limiter.check_at("10.0.0.1", start);
            assert!(result.ok);
            assert_eq!(result.remaining, remaining);
        }

        let blocked = limiter.check_at("10.0.0.1", start);
        assert!(!blocked.ok);
        assert_eq!(blocked.retry_after, 20);

        // Other clients have their own bucket
        assert!(limiter.check_at("10.0.0.2", start).ok);

        // One token back after 20 seconds at 3/min
        assert!(limiter.check_at("10.0.0.1", start + Duration::from_secs(20)).ok);
    }
}
