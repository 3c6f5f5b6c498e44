// crates/waypost-api/src/limiter.rs
// ============================================================================
// Module: Request Limiter
// Description: Per-client token-bucket limiting for the HTTP surface.
// Purpose: Shed abusive request volume before handlers run.
// Dependencies: (none)
// ============================================================================

//! ## Overview
//! A transport-level token bucket keyed by client IP. This is in-memory by
//! design and distinct from the Visitor Registry's storage-derived cooldown:
//! losing limiter state on restart only briefly widens the request budget,
//! while the visit cooldown must survive restarts and therefore lives in
//! durable storage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Instant;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Token bucket parameters.
///
/// # Invariants
/// - `capacity` is at least 1 and `refill_per_sec` is positive.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    /// Maximum burst size in requests.
    pub capacity: f64,
    /// Sustained refill rate in requests per second.
    pub refill_per_sec: f64,
}

impl RateLimitPolicy {
    /// Builds a policy from a request budget over a window.
    ///
    /// Returns `None` when `request_limit` is zero, which disables limiting.
    #[must_use]
    pub fn from_window(request_limit: u32, window_secs: u64) -> Option<Self> {
        if request_limit == 0 {
            return None;
        }
        let capacity = f64::from(request_limit);
        #[allow(
            clippy::cast_precision_loss,
            reason = "Window seconds are far below f64 precision limits."
        )]
        let refill_per_sec = capacity / window_secs.max(1) as f64;
        Some(Self {
            capacity,
            refill_per_sec,
        })
    }
}

/// Per-client bucket state.
#[derive(Debug, Clone)]
struct Bucket {
    /// Remaining tokens.
    tokens: f64,
    /// Last refill instant.
    last_refill: Instant,
}

// ============================================================================
// SECTION: Limiter
// ============================================================================

/// Token-bucket request limiter keyed by client IP.
#[derive(Debug)]
pub struct RequestLimiter {
    /// Active policy; `None` disables limiting.
    policy: Option<RateLimitPolicy>,
    /// Bucket map guarded by a mutex.
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
}

impl RequestLimiter {
    /// Creates a limiter with the given policy.
    #[must_use]
    pub fn new(policy: Option<RateLimitPolicy>) -> Self {
        Self {
            policy,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true when the client may proceed, consuming one token.
    #[must_use]
    pub fn allow(&self, client: IpAddr) -> bool {
        let Some(policy) = self.policy else {
            return true;
        };
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets.entry(client).or_insert_with(|| Bucket {
            tokens: policy.capacity,
            last_refill: now,
        });
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * policy.refill_per_sec).min(policy.capacity);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use std::net::IpAddr;
    use std::net::Ipv4Addr;

    use super::RateLimitPolicy;
    use super::RequestLimiter;

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn burst_up_to_capacity_then_rejects() {
        let limiter = RequestLimiter::new(RateLimitPolicy::from_window(3, 60));
        assert!(limiter.allow(CLIENT));
        assert!(limiter.allow(CLIENT));
        assert!(limiter.allow(CLIENT));
        assert!(!limiter.allow(CLIENT));
    }

    #[test]
    fn clients_are_limited_independently() {
        let limiter = RequestLimiter::new(RateLimitPolicy::from_window(1, 60));
        assert!(limiter.allow(CLIENT));
        assert!(!limiter.allow(CLIENT));
        assert!(limiter.allow(OTHER));
    }

    #[test]
    fn zero_limit_disables_the_limiter() {
        assert!(RateLimitPolicy::from_window(0, 60).is_none());
        let limiter = RequestLimiter::new(None);
        for _ in 0 .. 1_000 {
            assert!(limiter.allow(CLIENT));
        }
    }
}
