//! Token-bucket gate for outbound calls to one upstream service.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default limits for a review server.
pub mod rate_limits {
    /// Requests allowed back-to-back before the steady rate applies.
    pub const DEFAULT_BURST: u32 = 20;
    /// Steady refill rate.
    pub const DEFAULT_RPS: u32 = 10;
}

/// The caller's cancellation fired while waiting for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cancelled while waiting for rate limit")]
pub struct Cancelled;

/// A shared token bucket backed by the governor crate.
///
/// Clones share the same bucket, so one instance (and its clones) should
/// front every call to a given upstream service.
///
/// # Example
///
/// ```ignore
/// use revlens::rate_limit::{ApiRateLimiter, rate_limits};
///
/// let limiter = ApiRateLimiter::new(rate_limits::DEFAULT_BURST, rate_limits::DEFAULT_RPS);
///
/// // Before each API call:
/// limiter.acquire(&cancel).await?;
/// client.query_changes(&query).await?;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
    burst: u32,
    requests_per_second: u32,
}

impl ApiRateLimiter {
    /// Create a limiter with `burst` capacity refilling at `requests_per_second`.
    ///
    /// Zero values are clamped to 1.
    pub fn new(burst: u32, requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);

        Self {
            inner: Arc::new(RateLimiter::direct(quota)),
            burst: burst.get(),
            requests_per_second: rps.get(),
        }
    }

    /// Wait until a token is available or `cancel` fires.
    ///
    /// Cancellation wins ties, so a cancelled caller never consumes a token
    /// it will not use.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            _ = self.inner.until_ready() => Ok(()),
        }
    }

    /// Take a token only if one is available right now.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }

    #[must_use]
    pub fn burst(&self) -> u32 {
        self.burst
    }

    #[must_use]
    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }
}

impl Default for ApiRateLimiter {
    fn default() -> Self {
        Self::new(rate_limits::DEFAULT_BURST, rate_limits::DEFAULT_RPS)
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("burst", &self.burst)
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

/// Acquire from an optional limiter.
pub async fn wait_for_rate_limit(
    limiter: Option<&ApiRateLimiter>,
    cancel: &CancellationToken,
) -> Result<(), Cancelled> {
    match limiter {
        Some(limiter) => limiter.acquire(cancel).await,
        None if cancel.is_cancelled() => Err(Cancelled),
        None => Ok(()),
    }
}
