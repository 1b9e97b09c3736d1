use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::scheduler::Scheduler;
use crate::ws::config::Config;

/// Close code used when the client gives up on a silent server.
pub(crate) const GOING_AWAY: u16 = 1001;

/// Disconnect reason reported after a liveness timeout.
pub const SERVER_TIMEOUT_REASON: &str = "server timeout";

/// Disconnect reason reported when the handshake is never acknowledged.
pub const CONNECT_TIMEOUT_REASON: &str = "connect timeout";

/// Whether the server has been silent for longer than `timeout`. A zero timeout never expires.
#[must_use]
pub(crate) fn is_stale(last_activity: Instant, now: Instant, timeout: Duration) -> bool {
    !timeout.is_zero() && now.saturating_duration_since(last_activity) > timeout
}

/// Periodic heartbeat emission and liveness checking for one transport connection.
///
/// Holds one cancellation token per running task. Starting replaces whatever was running.
#[derive(Debug, Default)]
pub(crate) struct Monitor {
    heartbeat: Option<CancellationToken>,
    liveness: Option<CancellationToken>,
    handshake: Option<CancellationToken>,
}

impl Monitor {
    /// Start the outbound heartbeat and the liveness check. Each is skipped when its configured
    /// interval is zero.
    pub(crate) fn start<H, L>(
        &mut self,
        scheduler: &Scheduler,
        config: &Config,
        heartbeat: H,
        liveness: L,
    ) where
        H: Fn() + Send + Sync + 'static,
        L: Fn() + Send + Sync + 'static,
    {
        self.stop();

        if !config.heartbeat_interval.is_zero() {
            self.heartbeat = Some(scheduler.schedule_repeating(config.heartbeat_interval, heartbeat));
        }
        if !config.server_timeout.is_zero() && !config.liveness_check_interval.is_zero() {
            self.liveness =
                Some(scheduler.schedule_repeating(config.liveness_check_interval, liveness));
        }
    }

    /// Track a one-shot handshake deadline.
    pub(crate) fn watch_handshake(&mut self, token: CancellationToken) {
        if let Some(previous) = self.handshake.replace(token) {
            previous.cancel();
        }
    }

    /// The handshake was acknowledged, the deadline no longer applies.
    pub(crate) fn handshake_done(&mut self) {
        if let Some(token) = self.handshake.take() {
            token.cancel();
        }
    }

    /// Cancel every running task.
    pub(crate) fn stop(&mut self) {
        for token in [
            self.heartbeat.take(),
            self.liveness.take(),
            self.handshake.take(),
        ]
        .into_iter()
        .flatten()
        {
            token.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.heartbeat.is_some() || self.liveness.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::advance;

    use super::*;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn staleness_is_strictly_greater_than_timeout() {
        let start = Instant::now();
        let timeout = Duration::from_secs(30);

        assert!(!is_stale(start, start + timeout, timeout), "exactly at the limit");
        assert!(is_stale(start, start + timeout + Duration::from_millis(1), timeout), "past the limit");
        assert!(!is_stale(start, start + Duration::from_secs(3_600), Duration::ZERO), "disabled");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_intervals_start_nothing() {
        let scheduler = Scheduler::new();
        let config = Config::builder()
            .heartbeat_interval(Duration::ZERO)
            .server_timeout(Duration::ZERO)
            .build();
        let mut monitor = Monitor::default();

        monitor.start(&scheduler, &config, || {}, || {});

        assert!(!monitor.is_running(), "both halves are disabled");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_both_tasks() {
        let scheduler = Scheduler::new();
        let config = Config::builder()
            .heartbeat_interval(Duration::from_secs(1))
            .server_timeout(Duration::from_secs(10))
            .liveness_check_interval(Duration::from_secs(1))
            .build();
        let beats = Arc::new(AtomicUsize::new(0));
        let checks = Arc::new(AtomicUsize::new(0));
        let mut monitor = Monitor::default();

        let b = Arc::clone(&beats);
        let c = Arc::clone(&checks);
        monitor.start(
            &scheduler,
            &config,
            move || {
                b.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );
        settle().await;

        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(beats.load(Ordering::SeqCst), 1);
        assert_eq!(checks.load(Ordering::SeqCst), 1);

        monitor.stop();
        advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(beats.load(Ordering::SeqCst), 1);
        assert_eq!(checks.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_running(), "tokens were released");
    }
}
