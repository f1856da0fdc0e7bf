//! Fixed-window rate limiting.
//!
//! Grounded on `tuitbot-server::auth::routes::check_rate_limit`'s
//! `Mutex<HashMap<IpAddr, (u32, Instant)>>` shape, generalized here from a
//! boolean login-attempt gate to the full counter/reset/headers contract.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::types::HitCounter;

const WINDOW_MS: u64 = 60_000;
const MAX_PER_WINDOW: u64 = 10;

pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at_ms: u64,
    pub retry_after_secs: Option<u64>,
}

pub struct RateLimiter {
    hits: Mutex<HashMap<String, HitCounter>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit for `client_ip` and report the resulting decision.
    pub async fn hit(&self, client_ip: &str, now_ms: u64) -> Decision {
        let key = format!("ask:{client_ip}");
        let mut hits = self.hits.lock().await;
        let counter = hits.entry(key).or_insert(HitCounter { count: 0, reset_at_ms: 0 });

        if counter.reset_at_ms <= now_ms {
            counter.count = 1;
            counter.reset_at_ms = now_ms + WINDOW_MS;
        } else {
            counter.count += 1;
        }

        let remaining = MAX_PER_WINDOW.saturating_sub(counter.count);
        let allowed = counter.count <= MAX_PER_WINDOW;
        let retry_after_secs = if allowed {
            None
        } else {
            let remaining_ms = counter.reset_at_ms.saturating_sub(now_ms);
            Some(remaining_ms.div_ceil(1000).max(1))
        };

        Decision {
            allowed,
            limit: MAX_PER_WINDOW,
            remaining,
            reset_at_ms: counter.reset_at_ms,
            retry_after_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tenth_request_succeeds_eleventh_fails() {
        let limiter = RateLimiter::new();
        let mut last = None;
        for _ in 0..10 {
            last = Some(limiter.hit("1.2.3.4", 0).await);
        }
        assert!(last.unwrap().allowed);

        let eleventh = limiter.hit("1.2.3.4", 0).await;
        assert!(!eleventh.allowed);
        assert_eq!(eleventh.retry_after_secs, Some(60));
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            limiter.hit("5.6.7.8", 0).await;
        }
        let after_reset = limiter.hit("5.6.7.8", WINDOW_MS + 1).await;
        assert!(after_reset.allowed);
        assert_eq!(after_reset.remaining, MAX_PER_WINDOW - 1);
    }

    #[tokio::test]
    async fn remaining_floors_at_zero() {
        let limiter = RateLimiter::new();
        let mut decision = limiter.hit("9.9.9.9", 0).await;
        for _ in 0..15 {
            decision = limiter.hit("9.9.9.9", 0).await;
        }
        assert_eq!(decision.remaining, 0);
    }
}
