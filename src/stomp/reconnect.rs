use std::time::Duration;

use backoff::backoff::Backoff;

use crate::ws::config::ReconnectConfig;

/// Deterministic exponential backoff for reconnect attempts.
///
/// `delay(attempt) = min(initial * multiplier^(attempt - 1), max)` for `attempt >= 1`. The
/// attempt counter is advanced by [`Backoff::next_backoff`] on every connection loss and cleared
/// by [`Backoff::reset`] once the server acknowledges a handshake. When reconnection is disabled
/// [`Backoff::next_backoff`] yields `None` and the counter does not move.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of consecutive losses since the last acknowledged handshake.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Delay before the given attempt, counted from 1. Attempt 0 is treated as 1.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The multiplier is fractional; the result is truncated to whole milliseconds and clamped to the max"
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let max = self.config.max_backoff;
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.config.backoff_multiplier.powi(exponent);
        let millis = (self.config.initial_backoff.as_millis() as f64 * factor).floor();

        if !millis.is_finite() || millis < 0.0 {
            return max;
        }
        // `as` saturates, oversized values land on u64::MAX and are clamped below
        Duration::from_millis(millis as u64).min(max)
    }
}

impl Backoff for ReconnectPolicy {
    fn next_backoff(&mut self) -> Option<Duration> {
        if !self.config.enabled {
            return None;
        }
        self.attempt = self.attempt.saturating_add(1);
        Some(self.delay_for_attempt(self.attempt))
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}
