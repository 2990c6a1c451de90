//! Replays a fixed debit at every virtual tick and reports how much got through.
//!
//! ```text
//! cargo run -p tick-limit --example simulate -- --tokens 5 --capacity 100 --amount 10
//! ```

use std::ops::Range;

use clap::Parser;
use clap::ValueEnum;
use tick_limit::Admission;
use tick_limit::BucketConfig;
use tick_limit::Partial;
use tick_limit::Rate;
use tick_limit::TokenBucket;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    AllOrNothing,
    Partial,
}

#[derive(Debug, Parser)]
#[command(about = "Debit a token bucket once per virtual tick")]
struct Args {
    /// Tokens added every `period` ticks
    #[arg(long, default_value_t = 5)]
    tokens: u64,

    #[arg(long, default_value_t = 1)]
    period: u64,

    #[arg(long, default_value_t = 100)]
    capacity: u64,

    /// Tokens in the bucket at tick zero
    #[arg(long, default_value_t = 0)]
    initial: u64,

    /// Tokens requested at each tick
    #[arg(long, default_value_t = 10)]
    amount: u64,

    #[arg(long, default_value_t = 100)]
    steps: u64,

    #[arg(long, value_enum, default_value_t = Policy::AllOrNothing)]
    policy: Policy,
}

#[derive(Debug, Default)]
struct Tally {
    requested: u64,
    granted: u64,
    full: u64,
}

fn run<P: Admission>(bucket: &TokenBucket<P>, amount: u64, ticks: Range<u64>) -> Tally {
    let mut tally = Tally::default();
    for now in ticks {
        let granted = bucket.debit(amount, now);
        tally.requested = tally.requested.saturating_add(amount);
        tally.granted = tally.granted.saturating_add(granted);
        if granted == amount {
            tally.full += 1;
        }
    }
    tally
}

/// Ticks to debit at, starting once the first request could have been filled.
fn schedule(rate: Rate, amount: u64, steps: u64) -> Option<Range<u64>> {
    let begin = amount.checked_mul(rate.period())? / rate.tokens();
    Some(begin..begin.checked_add(steps)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = BucketConfig {
        tokens: args.tokens,
        period: args.period,
        capacity: args.capacity,
        initial_tokens: args.initial,
        max_retries: None,
    };
    let bucket = config.build()?;
    info!(rate = %bucket.rate(), capacity = bucket.capacity(), "bucket ready");

    let ticks = schedule(bucket.rate(), args.amount, args.steps)
        .ok_or("--amount and --steps overflow the tick range for this rate")?;

    let tally = match args.policy {
        Policy::AllOrNothing => run(&bucket, args.amount, ticks),
        Policy::Partial => run(&bucket.with_policy(Partial), args.amount, ticks),
    };

    println!(
        "granted {} of {} tokens ({:.2}%), {} of {} requests served in full",
        tally.granted,
        tally.requested,
        tally.granted as f64 * 100.0 / tally.requested.max(1) as f64,
        tally.full,
        args.steps,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_starts_after_first_fill() {
        let rate = Rate::try_new(5, 1).unwrap();
        assert_eq!(schedule(rate, 10, 100), Some(2..102));

        let rate = Rate::try_new(1, 4).unwrap();
        assert_eq!(schedule(rate, 3, 1), Some(12..13));
    }

    #[test]
    fn test_schedule_rejects_overflow() {
        let rate = Rate::try_new(1, 2).unwrap();
        assert_eq!(schedule(rate, u64::MAX, 1), None);

        let rate = Rate::try_new(5, 1).unwrap();
        assert_eq!(schedule(rate, 10, u64::MAX), None);
    }
}
