use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

use crate::ConfigError;
use crate::Rate;
use crate::TokenBucket;

/// Serializable description of a bucket.
///
/// ```rust
/// use tick_limit::BucketConfig;
///
/// let config = BucketConfig {
///     tokens: 5,
///     period: 1,
///     capacity: 100,
///     initial_tokens: 0,
///     max_retries: None,
/// };
/// let bucket = config.build().unwrap();
/// assert_eq!(bucket.debit(10, 2), 10);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    /// Tokens added every `period` ticks.
    pub tokens: u64,
    #[serde(default = "default_period")]
    pub period: u64,
    pub capacity: u64,
    /// Tokens held at tick zero.
    #[serde(default)]
    pub initial_tokens: u64,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

fn default_period() -> u64 {
    1
}

impl BucketConfig {
    pub fn build(&self) -> Result<TokenBucket, ConfigError> {
        let rate = Rate::try_new(self.tokens, self.period)?;
        let capacity = NonZeroU64::new(self.capacity).ok_or(ConfigError::ZeroCapacity)?;
        let bucket = TokenBucket::with_tokens(rate, capacity, self.initial_tokens, 0)?;
        Ok(match self.max_retries {
            Some(max) => bucket.with_max_retries(max),
            None => bucket,
        })
    }
}
