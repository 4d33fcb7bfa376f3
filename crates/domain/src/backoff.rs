//! Retry delay policies with jitter.
//!
//! All strategies are bounded by `max_seconds` and multiplied by a symmetric
//! jitter factor: `jitter = 0.2` spreads the delay over `[0.8, 1.2] × base`.
//! Jitter is derived from a deterministic per-attempt hash so tests stay
//! reproducible without threading an RNG through call sites.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay growth curve across attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base · 2^attempt`
    #[default]
    Exponential,
    /// `base · (1 + attempt)`
    Linear,
    /// `base · log2(attempt + 2)`
    Logarithmic,
}

/// Compute the delay in seconds for a 0-indexed attempt.
pub fn backoff_delay(
    strategy: BackoffStrategy,
    attempt: u32,
    base: f64,
    max_seconds: f64,
    jitter: f64,
) -> f64 {
    let raw = match strategy {
        BackoffStrategy::Exponential => base * 2f64.powi(attempt as i32),
        BackoffStrategy::Linear => base * (1.0 + attempt as f64),
        BackoffStrategy::Logarithmic => base * (attempt as f64 + 2.0).log2(),
    };
    let capped = raw.min(max_seconds);
    if jitter <= 0.0 {
        return capped;
    }
    // Symmetric jitter in [1 - jitter, 1 + jitter].
    let factor = 1.0 + jitter * (2.0 * pseudo_random_fraction(attempt) - 1.0);
    (capped * factor).min(max_seconds).max(0.0)
}

/// Same as [`backoff_delay`] but as a [`Duration`].
pub fn backoff_duration(
    strategy: BackoffStrategy,
    attempt: u32,
    base: f64,
    max_seconds: f64,
    jitter: f64,
) -> Duration {
    Duration::from_secs_f64(backoff_delay(strategy, attempt, base, max_seconds, jitter))
}

/// Cheap deterministic fraction in [0, 1) from the attempt number.
/// Not cryptographic — just enough to spread retry storms.
fn pseudo_random_fraction(attempt: u32) -> f64 {
    let hash = attempt.wrapping_add(1).wrapping_mul(2654435761); // Knuth multiplicative hash
    (hash as f64) / (u32::MAX as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles() {
        let delays: Vec<f64> = (0..5)
            .map(|a| backoff_delay(BackoffStrategy::Exponential, a, 1.0, 100.0, 0.0))
            .collect();
        assert_eq!(delays, vec![1.0, 2.0, 4.0, 8.0, 16.0]);
    }

    #[test]
    fn exponential_attempt_zero_is_base() {
        assert_eq!(
            backoff_delay(BackoffStrategy::Exponential, 0, 2.5, 100.0, 0.0),
            2.5
        );
    }

    #[test]
    fn linear_grows_by_base() {
        let delays: Vec<f64> = (0..5)
            .map(|a| backoff_delay(BackoffStrategy::Linear, a, 1.0, 100.0, 0.0))
            .collect();
        assert_eq!(delays, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn logarithmic_follows_log2() {
        for attempt in 0..5u32 {
            let expected = (attempt as f64 + 2.0).log2();
            let actual = backoff_delay(BackoffStrategy::Logarithmic, attempt, 1.0, 100.0, 0.0);
            assert!((actual - expected).abs() < 1e-9, "attempt {attempt}");
        }
    }

    #[test]
    fn capped_at_max_seconds() {
        assert_eq!(
            backoff_delay(BackoffStrategy::Exponential, 10, 1.0, 5.0, 0.0),
            5.0
        );
    }

    #[test]
    fn jitter_stays_symmetric_and_bounded() {
        for attempt in 0..8u32 {
            let jittered = backoff_delay(BackoffStrategy::Exponential, attempt, 1.0, 100.0, 0.2);
            let unjittered = backoff_delay(BackoffStrategy::Exponential, attempt, 1.0, 100.0, 0.0);
            assert!(jittered >= unjittered * 0.8 - 1e-9);
            assert!(jittered <= unjittered * 1.2 + 1e-9);
        }
    }

    #[test]
    fn jitter_never_exceeds_cap() {
        for attempt in 0..32u32 {
            let d = backoff_delay(BackoffStrategy::Exponential, attempt, 1.0, 5.0, 0.5);
            assert!(d <= 5.0);
        }
    }
}
