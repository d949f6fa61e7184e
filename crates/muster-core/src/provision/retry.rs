// SPDX-License-Identifier: Apache-2.0

//! Backoff configuration for installation retries.
//!
//! Wraps `backon`'s exponential builder: delay for attempt *i* is
//! `min(max_delay, base_delay * exponential_base^i)`, with optional jitter
//! so concurrently-installing plugins do not retry in lockstep.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

use crate::config::RetrySettings;

/// Retry policy for one installation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor applied per attempt.
    pub exponential_base: f32,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Desynchronize concurrent retriers.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            exponential_base: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            exponential_base: settings.exponential_base,
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter: settings.jitter,
        }
    }
}

impl RetryConfig {
    /// The delay sequence for this policy, one entry per retry.
    ///
    /// The sequence is exhausted after `max_retries` entries; the caller
    /// performs its first attempt before consuming any delay.
    #[must_use]
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(self.exponential_base)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);
        if self.jitter {
            builder = builder.with_jitter();
        }
        builder.build()
    }

    /// A policy without jitter, for deterministic tests.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_sequence_matches_formula() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            exponential_base: 2.0,
            max_delay: Duration::from_millis(600),
            jitter: false,
        };

        let delays: Vec<_> = config.delays().collect();
        assert_eq!(delays.len(), 5);
        for (i, delay) in delays.iter().enumerate() {
            let raw = 100.0 * 2.0f64.powi(i32::try_from(i).unwrap());
            let expected = Duration::from_millis(raw.min(600.0) as u64);
            assert_eq!(*delay, expected, "attempt {i}");
        }
    }

    #[test]
    fn test_delay_is_capped_at_max() {
        let config = RetryConfig {
            max_retries: 8,
            base_delay: Duration::from_millis(500),
            exponential_base: 3.0,
            max_delay: Duration::from_secs(2),
            jitter: false,
        };

        for delay in config.delays() {
            assert!(delay <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_sequence_length_equals_max_retries() {
        let config = RetryConfig::default().without_jitter();
        assert_eq!(config.delays().count(), 3);
    }

    #[test]
    fn test_jitter_never_reduces_below_base_formula() {
        let config = RetryConfig {
            max_retries: 4,
            base_delay: Duration::from_millis(100),
            exponential_base: 2.0,
            max_delay: Duration::from_secs(10),
            jitter: true,
        };

        // Jitter only adds on top of the deterministic delay.
        let deterministic: Vec<_> = config.clone().without_jitter().delays().collect();
        for (jittered, base) in config.delays().zip(deterministic) {
            assert!(jittered >= base);
        }
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrySettings {
            max_retries: 7,
            base_delay_ms: 250,
            exponential_base: 1.5,
            max_delay_ms: 4_000,
            jitter: false,
        };
        let config = RetryConfig::from(&settings);
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(4));
        assert!(!config.jitter);
    }
}
