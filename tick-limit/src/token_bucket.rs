use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::Admission;
use crate::AllOrNothing;
use crate::ConfigError;
use crate::DebitError;
use crate::Rate;

/// A lock-free token bucket driven by caller-supplied virtual time.
///
/// The bucket never stores a token count. Its only mutable state is the
/// virtual instant at which it would read empty, held in a single
/// `AtomicI64` as `ticks * rate.tokens()`. The tokens available at `now` are
/// derived on demand as `min(capacity, floor(rate * (now - last_update)))`,
/// and a debit commits by moving that instant forward with one
/// compare-and-swap. There is no background refill and no internal clock.
///
/// A new bucket starts empty at tick zero.
pub struct TokenBucket<P = AllOrNothing> {
    capacity: u64,
    rate: Rate,
    last_update: AtomicI64,
    max_retries: Option<u32>,
    policy: P,
}

impl TokenBucket {
    /// Creates an empty bucket.
    ///
    /// Fails only if `capacity * rate.period()` does not fit the 64-bit
    /// virtual time domain.
    pub fn new(rate: Rate, capacity: NonZeroU64) -> Result<Self, ConfigError> {
        Self::with_tokens(rate, capacity, 0, 0)
    }

    /// Creates an empty bucket from raw integers: `tokens` every `period`
    /// ticks, holding at most `capacity`.
    pub fn try_new(tokens: u64, period: u64, capacity: u64) -> Result<Self, ConfigError> {
        let rate = Rate::try_new(tokens, period)?;
        let capacity = NonZeroU64::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        Self::new(rate, capacity)
    }

    /// Creates a bucket holding `tokens` at tick `at`.
    pub fn with_tokens(
        rate: Rate,
        capacity: NonZeroU64,
        tokens: u64,
        at: u64,
    ) -> Result<Self, ConfigError> {
        let capacity = capacity.get();
        if tokens > capacity {
            return Err(ConfigError::InitialTokensExceedCapacity { tokens, capacity });
        }
        let overflow = || ConfigError::Overflow { capacity };
        rate.span(capacity).ok_or_else(overflow)?;
        let start = rate.scale(at).ok_or_else(overflow)?;
        let loaded = rate.span(tokens).ok_or_else(overflow)?;

        Ok(Self {
            capacity,
            rate,
            last_update: AtomicI64::new(start - loaded),
            max_retries: None,
            policy: AllOrNothing,
        })
    }
}

impl<P> TokenBucket<P> {
    /// Replaces the admission policy.
    pub fn with_policy<Q: Admission>(self, policy: Q) -> TokenBucket<Q> {
        TokenBucket {
            capacity: self.capacity,
            rate: self.rate,
            last_update: self.last_update,
            max_retries: self.max_retries,
            policy,
        }
    }

    /// Caps how many lost compare-and-swap races a single debit tolerates.
    ///
    /// Without a cap a debit retries until it commits.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Tokens available at `now`, without taking any.
    ///
    /// This is a point-in-time snapshot: a concurrent debit may already have
    /// superseded it. Returns zero if `now` is behind the bucket.
    pub fn available(&self, now: u64) -> u64 {
        let Some(now) = self.rate.scale(now) else {
            return 0;
        };
        self.tokens_at(self.last_update.load(Ordering::Acquire), now)
            .unwrap_or(0)
    }

    /// Ticks from `now` until `amount` tokens will be available, assuming no
    /// other debits. `None` if `amount` exceeds the capacity.
    pub fn ticks_until(&self, amount: u64, now: u64) -> Option<u64> {
        if amount > self.capacity {
            return None;
        }
        let last = self.last_update.load(Ordering::Acquire) as i128;
        let needed = last + amount as i128 * self.rate.period() as i128;
        let tokens = self.rate.tokens() as i128;
        let ready_at = needed.div_euclid(tokens) + i128::from(needed.rem_euclid(tokens) != 0);
        let wait = ready_at - now as i128;
        Some(wait.clamp(0, u64::MAX as i128) as u64)
    }

    /// Whole tokens between the empty instant `last` and `now`, both in
    /// fixed-point. `None` if `now` is behind `last`.
    #[inline]
    fn tokens_at(&self, last: i64, now: i64) -> Option<u64> {
        let elapsed = now as i128 - last as i128;
        if elapsed < 0 {
            return None;
        }
        let whole = elapsed / self.rate.period() as i128;
        Some(whole.min(self.capacity as i128) as u64)
    }
}

impl<P: Admission> TokenBucket<P> {
    /// Takes up to `amount` tokens at virtual time `now` and returns how many
    /// were granted.
    ///
    /// Never blocks. A request that cannot be served right now is granted
    /// zero, as is a stale `now` or a debit that exhausted its retry cap.
    /// Use [`try_debit`](Self::try_debit) to tell those apart.
    #[inline]
    pub fn debit(&self, amount: u64, now: u64) -> u64 {
        self.try_debit(amount, now).unwrap_or(0)
    }

    /// Like [`debit`](Self::debit), but reports why nothing was granted when
    /// the attempt was abandoned rather than refused by the policy.
    pub fn try_debit(&self, amount: u64, now: u64) -> Result<u64, DebitError> {
        if amount == 0 {
            return Ok(0);
        }
        let now_scaled = self
            .rate
            .scale(now)
            .ok_or(DebitError::TimeOverflow { now })?;

        let mut failures = 0u32;
        let mut last = self.last_update.load(Ordering::Acquire);
        loop {
            let Some(available) = self.tokens_at(last, now_scaled) else {
                let last_update = self.rate.unscale_ceil(last);
                debug!(now, last_update, "debit behind bucket time");
                return Err(DebitError::Stale { now, last_update });
            };
            if available == 0 {
                return Ok(0);
            }

            let granted = self.admit(amount, available);
            if granted == 0 {
                return Ok(0);
            }

            // Reconcile the remainder back into an empty instant. Cannot
            // overflow: remaining * period <= capacity * period, checked at
            // construction, and the result never precedes `last`.
            let remaining = (available - granted) as i128;
            let next = (now_scaled as i128 - remaining * self.rate.period() as i128) as i64;

            match self.last_update.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(granted),
                // Spurious failure: nobody else committed, so it is not contention.
                Err(current) if current == last => continue,
                Err(current) => {
                    failures += 1;
                    if let Some(max) = self.max_retries
                        && failures > max
                    {
                        debug!(attempts = failures, "debit gave up under contention");
                        return Err(DebitError::Contended { attempts: failures });
                    }
                    trace!(attempts = failures, "debit lost race, retrying");
                    last = current;
                }
            }
        }
    }

    #[inline]
    fn admit(&self, requested: u64, available: u64) -> u64 {
        let granted = self.policy.admit(requested, available);
        let ceiling = requested.min(available);
        if granted > ceiling {
            warn!(
                requested,
                available, granted, "admission policy over-granted, clamping"
            );
            return ceiling;
        }
        granted
    }
}

impl<P> fmt::Debug for TokenBucket<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("rate", &self.rate)
            .field("last_update", &self.last_update.load(Ordering::Relaxed))
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
