//! Admission control for incoming connections.
//!
//! A token bucket (`governor`) gates each connection before its frame is
//! read. An empty bucket rejects the connection at once unless a wait
//! bound is configured; either way the rejected connection is answered with
//! `Response{Code:700}` without decoding the request.
//!
//! # Configuration
//!
//! - `rate`: tokens added per second
//! - `burst`: bucket capacity
//! - `timeout`: longest wait for a token (default: zero, no wait)

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use crate::config::LimiterConfig;
use crate::error::{RpcError, Result};

/// Token-bucket gate shared by all connections of one server.
pub struct AdmissionControl {
    limiter: DefaultDirectRateLimiter,
    timeout: Duration,
}

impl std::fmt::Debug for AdmissionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionControl")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AdmissionControl {
    /// Build a limiter from its settings.
    ///
    /// `rate` and `burst` must both be positive.
    pub fn new(config: &LimiterConfig) -> Result<Self> {
        let rate = NonZeroU32::new(config.rate)
            .ok_or_else(|| RpcError::Registration("limiter rate must be positive".into()))?;
        let burst = NonZeroU32::new(config.burst)
            .ok_or_else(|| RpcError::Registration("limiter burst must be positive".into()))?;

        let quota = Quota::per_second(rate).allow_burst(burst);
        Ok(Self {
            limiter: RateLimiter::direct(quota),
            timeout: config.timeout,
        })
    }

    /// Take one token, waiting at most `timeout` for a refill.
    ///
    /// Returns `Err(RateLimited)` if no token became available in time.
    pub async fn acquire(&self) -> Result<()> {
        if self.try_acquire() {
            return Ok(());
        }
        if self.timeout.is_zero() {
            return Err(RpcError::RateLimited("no token available".into()));
        }

        tokio::time::timeout(self.timeout, self.limiter.until_ready())
            .await
            .map_err(|_| {
                RpcError::RateLimited(format!(
                    "no token available within {}ms",
                    self.timeout.as_millis()
                ))
            })
    }

    /// Take a token only if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
