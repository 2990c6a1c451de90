use std::fmt;
use std::num::NonZeroU64;

use crate::ConfigError;

/// A refill rate of `tokens` per `period` ticks.
///
/// The fraction is kept in lowest terms so that the fixed-point virtual time
/// used by [`TokenBucket`](crate::TokenBucket) stays as small as possible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rate {
    tokens: u64,
    period: u64,
}

impl Rate {
    /// `tokens` added every `period` ticks.
    pub fn new(tokens: NonZeroU64, period: NonZeroU64) -> Self {
        let divisor = gcd(tokens.get(), period.get());
        Self {
            tokens: tokens.get() / divisor,
            period: period.get() / divisor,
        }
    }

    /// `tokens` added every tick.
    pub fn per_tick(tokens: NonZeroU64) -> Self {
        Self {
            tokens: tokens.get(),
            period: 1,
        }
    }

    /// Validating constructor for raw integers.
    pub fn try_new(tokens: u64, period: u64) -> Result<Self, ConfigError> {
        let tokens = NonZeroU64::new(tokens).ok_or(ConfigError::ZeroRateTokens)?;
        let period = NonZeroU64::new(period).ok_or(ConfigError::ZeroRatePeriod)?;
        Ok(Self::new(tokens, period))
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// Tokens per tick as a float. Display only.
    pub fn as_f64(&self) -> f64 {
        self.tokens as f64 / self.period as f64
    }

    /// Converts ticks into the fixed-point domain (`ticks * tokens`).
    pub(crate) fn scale(&self, ticks: u64) -> Option<i64> {
        i64::try_from(ticks as u128 * self.tokens as u128).ok()
    }

    /// Fixed-point width of `count` whole tokens (`count * period`).
    pub(crate) fn span(&self, count: u64) -> Option<i64> {
        i64::try_from(count as u128 * self.period as u128).ok()
    }

    /// Converts a fixed-point value back to whole ticks, rounding up: the
    /// first tick at or after `scaled`.
    pub(crate) fn unscale_ceil(&self, scaled: i64) -> i64 {
        let tokens = self.tokens as i64;
        scaled.div_euclid(tokens) + i64::from(scaled.rem_euclid(tokens) != 0)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ticks", self.tokens, self.period)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reduces_to_lowest_terms() {
        let rate = Rate::try_new(10, 4).unwrap();
        assert_eq!(rate.tokens(), 5);
        assert_eq!(rate.period(), 2);
        assert_eq!(rate, Rate::try_new(5, 2).unwrap());
        assert_eq!(rate.to_string(), "5/2 ticks");
    }

    #[test]
    fn it_rejects_zero_components() {
        assert_eq!(Rate::try_new(0, 1), Err(ConfigError::ZeroRateTokens));
        assert_eq!(Rate::try_new(1, 0), Err(ConfigError::ZeroRatePeriod));
    }

    #[test]
    fn test_fixed_point_conversions() {
        let rate = Rate::try_new(3, 2).unwrap();
        assert_eq!(rate.scale(4), Some(12));
        assert_eq!(rate.span(5), Some(10));
        assert_eq!(rate.unscale_ceil(12), 4);
        assert_eq!(rate.unscale_ceil(13), 5);
        assert_eq!(rate.unscale_ceil(-1), 0);
        assert_eq!(rate.unscale_ceil(-4), -1);
        assert_eq!(rate.scale(u64::MAX), None);
        assert!((rate.as_f64() - 1.5).abs() < f64::EPSILON);
    }
}
