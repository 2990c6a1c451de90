/// Reasons a bucket cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The bucket must be able to hold at least one token.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    /// The refill rate must add at least one token per period.
    #[error("refill rate must add at least one token")]
    ZeroRateTokens,

    /// The refill period must last at least one tick.
    #[error("refill period must be at least one tick")]
    ZeroRatePeriod,

    /// A pre-loaded bucket cannot start above its capacity.
    #[error("initial tokens ({tokens}) exceed capacity ({capacity})")]
    InitialTokensExceedCapacity { tokens: u64, capacity: u64 },

    /// Capacity and rate together do not fit the 64-bit virtual time domain.
    #[error("capacity {capacity} at this rate overflows the virtual time domain")]
    Overflow { capacity: u64 },
}

/// Reasons a debit attempt was abandoned without granting anything.
///
/// [`TokenBucket::debit`](crate::TokenBucket::debit) maps all of these to a
/// zero grant; [`TokenBucket::try_debit`](crate::TokenBucket::try_debit)
/// reports them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DebitError {
    /// `now` is earlier than the bucket's virtual time.
    ///
    /// Under real concurrency this is usually a caller whose clock reading
    /// lost a race with a more recent update. `last_update` is the first
    /// tick that would not be stale.
    #[error("time {now} is behind the bucket's virtual time {last_update}")]
    Stale { now: u64, last_update: i64 },

    /// The compare-and-swap lost more races than the configured retry cap.
    #[error("gave up after {attempts} contended attempts")]
    Contended { attempts: u32 },

    /// `now` cannot be represented in the bucket's fixed-point domain.
    #[error("time {now} overflows the virtual time domain")]
    TimeOverflow { now: u64 },
}
