//! Exponential backoff with optional jitter.

use std::time::Duration;
use rand::Rng;

/// Upper bound on the attempt exponent; keeps `2^(attempt-1)` far from overflow.
pub const MAX_BACKOFF_EXPONENT: u32 = 20;

/// Calculate the delay before retry number `attempt` (1-based).
///
/// The delay is `base_ms * 2^(attempt-1)`, capped at `max_ms`. With `jitter`,
/// up to 10% of the capped delay is added on top.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter: bool) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponent = (attempt - 1).min(MAX_BACKOFF_EXPONENT);
    let exponential_base = 2u64.saturating_pow(exponent);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_ms = if jitter {
        let jitter_range = capped_delay / 10;
        if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        }
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence_doubles() {
        let delays: Vec<u128> = (1..=4)
            .map(|attempt| calculate_backoff(attempt, 100, 30_000, false).as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800]);
    }

    #[test]
    fn test_backoff_is_capped() {
        let capped = calculate_backoff(10, 100, 1000, false);
        assert_eq!(capped.as_millis(), 1000);
    }

    #[test]
    fn test_backoff_large_attempt_does_not_overflow() {
        let delay = calculate_backoff(u32::MAX, 1_000, u64::MAX, false);
        assert_eq!(delay.as_millis(), 1_000u128 << MAX_BACKOFF_EXPONENT);
    }

    #[test]
    fn test_backoff_jitter_stays_within_ten_percent() {
        for _ in 0..50 {
            let delay = calculate_backoff(3, 100, 30_000, true).as_millis();
            assert!((400..440).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_zero_attempt_has_no_delay() {
        assert_eq!(calculate_backoff(0, 100, 1000, true), Duration::ZERO);
    }
}
