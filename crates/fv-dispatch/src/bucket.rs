//! Fixed-window token bucket.

/// Token bucket that refills completely once per second.
///
/// Tokens stay within `[0, capacity]`. Refill is a full reset, not a
/// continuous drip: once at least 1000 ms have elapsed since the last refill,
/// the bucket is topped up to capacity.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: u32,
    capacity: u32,
    last_refill_ms: u64,
}

const REFILL_INTERVAL_MS: u64 = 1_000;

impl TokenBucket {
    /// Create a full bucket.
    #[must_use]
    pub fn new(capacity: u32, now_ms: u64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            last_refill_ms: now_ms,
        }
    }

    /// Reset to capacity if a full interval has elapsed. Returns whether a
    /// refill happened.
    pub fn refill_if_due(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_refill_ms) >= REFILL_INTERVAL_MS {
            self.tokens = self.capacity;
            self.last_refill_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Take one token. Returns `false` when empty.
    pub fn try_consume(&mut self) -> bool {
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    #[inline]
    pub fn available(&self) -> u32 {
        self.tokens
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
