use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of a token acquisition. The limiter never errors: it either
/// grants the tokens or is interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Granted,
    Cancelled,
}

/// Token bucket rate limiter.
///
/// Tokens mint continuously at one per `interval`; at most `burst` tokens
/// bank unused. The bank starts full, so the first `burst` acquisitions are
/// instantaneous from a cold start. A zero `interval` disables limiting.
///
/// The limiter is owned by the single transform stage, which is what gives
/// `rate` its one-global-throughput-ceiling meaning.
#[derive(Debug)]
pub struct TokenLimiter {
    interval: Duration,
    burst: u32,
    available: f64,
    last_refill: Instant,
    cancel: CancellationToken,
}

impl TokenLimiter {
    pub fn new(interval: Duration, burst: u32, cancel: CancellationToken) -> Self {
        let burst = burst.max(1);
        Self {
            interval,
            burst,
            available: burst as f64,
            last_refill: Instant::now(),
            cancel,
        }
    }

    /// Block until `n` tokens are available, or until cancellation fires
    /// while waiting. Requests above the burst capacity are clamped to it;
    /// they could never be satisfied otherwise.
    pub async fn acquire(&mut self, n: u32) -> Acquire {
        if self.interval.is_zero() {
            return Acquire::Granted;
        }

        let wanted = n.min(self.burst) as f64;
        loop {
            self.refill();
            if self.available >= wanted {
                self.available -= wanted;
                return Acquire::Granted;
            }

            let deficit = wanted - self.available;
            // floor at timer granularity so float rounding can't produce a
            // zero-length sleep and spin
            let wait = self.interval.mul_f64(deficit).max(Duration::from_millis(1));
            tokio::select! {
                _ = self.cancel.cancelled() => return Acquire::Cancelled,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let minted = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        self.available = (self.available + minted).min(self.burst as f64);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_tokens_granted_immediately() {
        let cancel = CancellationToken::new();
        let mut limiter = TokenLimiter::new(Duration::from_millis(100), 5, cancel);

        let start = Instant::now();
        for _ in 0..5 {
            assert_eq!(limiter.acquire(1).await, Acquire::Granted);
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_rate_bounds_elapsed_time() {
        let cancel = CancellationToken::new();
        let mut limiter = TokenLimiter::new(Duration::from_millis(100), 1, cancel);

        // 5 acquisitions with a bank of 1: at least (5 - 1) * 100ms elapse.
        let start = Instant::now();
        for _ in 0..5 {
            assert_eq!(limiter.acquire(1).await, Acquire::Granted);
        }
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_token_acquire_waits_for_full_amount() {
        let cancel = CancellationToken::new();
        let mut limiter = TokenLimiter::new(Duration::from_millis(10), 4, cancel);

        assert_eq!(limiter.acquire(4).await, Acquire::Granted);

        let start = Instant::now();
        assert_eq!(limiter.acquire(3).await, Acquire::Granted);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_disables_limiting() {
        let cancel = CancellationToken::new();
        let mut limiter = TokenLimiter::new(Duration::ZERO, 1, cancel);

        let start = Instant::now();
        for _ in 0..1000 {
            assert_eq!(limiter.acquire(1).await, Acquire::Granted);
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_unblocks_acquire() {
        let cancel = CancellationToken::new();
        let mut limiter = TokenLimiter::new(Duration::from_secs(3600), 1, cancel.clone());

        assert_eq!(limiter.acquire(1).await, Acquire::Granted);

        let blocked = tokio::spawn(async move { limiter.acquire(1).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        assert_eq!(blocked.await.unwrap(), Acquire::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_above_burst_is_clamped() {
        let cancel = CancellationToken::new();
        let mut limiter = TokenLimiter::new(Duration::from_millis(10), 2, cancel);

        // Asking for more than the bank can ever hold still completes.
        assert_eq!(limiter.acquire(100).await, Acquire::Granted);
    }
}
