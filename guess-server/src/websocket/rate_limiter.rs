use std::time::{Duration, Instant};

/// Token bucket: `max_tokens` burst, one token back every `refill_rate`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: u32,
    max_tokens: u32,
    refill_rate: Duration,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::new_with_limits(30, Duration::from_millis(500))
    }

    pub fn new_with_limits(max_tokens: u32, refill_rate: Duration) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    pub fn check_rate_limit(&mut self) -> bool {
        self.refill_tokens(Instant::now());

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill_tokens(&mut self, now: Instant) {
        let time_passed = now.saturating_duration_since(self.last_refill);
        if self.refill_rate.is_zero() || time_passed < self.refill_rate {
            return;
        }

        let intervals = time_passed.as_nanos() / self.refill_rate.as_nanos();
        let tokens_to_add = u32::try_from(intervals).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(tokens_to_add).min(self.max_tokens);
        if self.tokens == self.max_tokens {
            self.last_refill = now;
        } else {
            // Keep the partial interval so slow trickles still earn tokens.
            self.last_refill += self.refill_rate * tokens_to_add;
        }
    }

    pub fn get_remaining_tokens(&mut self) -> u32 {
        self.refill_tokens(Instant::now());
        self.tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_refused() {
        let mut limiter = RateLimiter::new_with_limits(3, Duration::from_secs(60));
        assert!(limiter.check_rate_limit());
        assert!(limiter.check_rate_limit());
        assert!(limiter.check_rate_limit());
        assert!(!limiter.check_rate_limit());
        assert_eq!(limiter.get_remaining_tokens(), 0);
    }

    #[test]
    fn test_sub_second_refill() {
        let mut limiter = RateLimiter::new_with_limits(2, Duration::from_millis(100));
        let start = limiter.last_refill;
        limiter.tokens = 0;

        limiter.refill_tokens(start + Duration::from_millis(250));
        assert_eq!(limiter.tokens, 2);
    }

    #[test]
    fn test_partial_interval_is_carried() {
        let mut limiter = RateLimiter::new_with_limits(10, Duration::from_millis(100));
        let start = limiter.last_refill;
        limiter.tokens = 0;

        limiter.refill_tokens(start + Duration::from_millis(150));
        assert_eq!(limiter.tokens, 1);
        limiter.refill_tokens(start + Duration::from_millis(210));
        assert_eq!(limiter.tokens, 2);
    }
}
