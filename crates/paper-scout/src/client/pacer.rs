//! Minimum-interval pacing for rate-limited upstreams.

use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Enforces a minimum delay between consecutive calls.
///
/// Clones share one limiter, so a pacer handed to several tasks paces them
/// jointly. A zero delay never waits.
#[derive(Clone)]
pub struct Pacer {
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    delay: Duration,
}

impl Pacer {
    /// Pacer allowing one call per `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        let limiter = Quota::with_period(delay).map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { limiter, delay }
    }

    /// Pacer that never waits.
    #[must_use]
    pub const fn unpaced() -> Self {
        Self { limiter: None, delay: Duration::ZERO }
    }

    /// Wait until the next call is allowed.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer").field("delay", &self.delay).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn test_zero_delay_never_waits() {
        let pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            pacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_clones_share_quota() {
        let pacer = Pacer::new(Duration::from_millis(100));
        let other = pacer.clone();
        let start = Instant::now();
        pacer.wait().await;
        other.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(180));
    }
}
