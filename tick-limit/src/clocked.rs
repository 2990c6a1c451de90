use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

use crate::Admission;
use crate::AllOrNothing;
use crate::Reason;
use crate::Strategy;
use crate::TokenBucket;

/// Drives a [`TokenBucket`] from a real clock.
///
/// Ticks are counted from the moment the `ClockedBucket` is created, at a
/// fixed resolution (one microsecond unless set otherwise), so the bucket's
/// rate must be expressed in the same unit.
pub struct ClockedBucket<P = AllOrNothing> {
    bucket: TokenBucket<P>,
    clock: Clock,
    /// A fixed point in time (TSC tick) that maps to virtual tick zero.
    anchor: Instant,
    resolution: Duration,
}

impl<P> ClockedBucket<P> {
    pub fn new(bucket: TokenBucket<P>) -> Self {
        Self::with_clock(bucket, Clock::new())
    }

    pub fn with_clock(bucket: TokenBucket<P>, clock: Clock) -> Self {
        let anchor = clock.now();
        Self {
            bucket,
            clock,
            anchor,
            resolution: Duration::from_micros(1),
        }
    }

    /// Sets the length of one tick. Clamped to at least one nanosecond.
    pub fn with_resolution(mut self, resolution: Duration) -> Self {
        self.resolution = resolution.max(Duration::from_nanos(1));
        self
    }

    pub fn bucket(&self) -> &TokenBucket<P> {
        &self.bucket
    }

    /// Current virtual time in ticks.
    pub fn now(&self) -> u64 {
        let elapsed = self.clock.now().duration_since(self.anchor).as_nanos();
        (elapsed / self.resolution.as_nanos()) as u64
    }

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let nanos = self.resolution.as_nanos().saturating_mul(ticks as u128);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl<P: Admission> ClockedBucket<P> {
    /// Takes up to `amount` tokens at the current clock time.
    pub fn debit(&self, amount: u64) -> u64 {
        self.bucket.debit(amount, self.now())
    }
}

impl<P: Admission> Strategy for ClockedBucket<P> {
    #[inline]
    fn process(&self) -> ControlFlow<Reason> {
        let now = self.now();
        if self.bucket.debit(1, now) == 1 {
            return ControlFlow::Continue(());
        }
        // A capacity of at least one token means a wait always exists.
        let wait = self.bucket.ticks_until(1, now).unwrap_or(u64::MAX);
        ControlFlow::Break(Reason::Overloaded {
            retry_after: self.ticks_to_duration(wait.max(1)),
        })
    }
}

impl<P> fmt::Debug for ClockedBucket<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockedBucket")
            .field("bucket", &self.bucket)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}
