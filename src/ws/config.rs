#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_SERVER_TIMEOUT_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_LIVENESS_CHECK_DURATION: Duration = Duration::from_secs(5);
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.7;
const DEFAULT_CONTENT_TYPE: &str = "application/json";
const DEFAULT_HOST: &str = "localhost";

/// Session configuration, fixed for the lifetime of a [`Client`](crate::stomp::Client).
///
/// A zero [`Duration`] for `heartbeat_interval` or `server_timeout` disables the corresponding
/// half of the heartbeat & liveness monitor.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// How often a bare newline heartbeat is sent while connected
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
    /// Maximum silence from the server before the connection is considered dead
    #[builder(default = DEFAULT_SERVER_TIMEOUT_DURATION)]
    pub server_timeout: Duration,
    /// Cadence of the staleness check, independent of the two values above
    #[builder(default = DEFAULT_LIVENESS_CHECK_DURATION)]
    pub liveness_check_interval: Duration,
    /// Give up on a handshake that has not been acknowledged this long after transport open.
    /// `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// Upper bound on frames buffered while disconnected. `None` is unbounded.
    pub max_queued_frames: Option<usize>,
    /// `content-type` header attached to every `SEND`
    #[builder(into, default = DEFAULT_CONTENT_TYPE.to_owned())]
    pub content_type: String,
    /// Default `host` header of the `CONNECT` frame
    #[builder(into, default = DEFAULT_HOST.to_owned())]
    pub host: String,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Config {
    /// Value of the `heart-beat` header offered in `CONNECT`: `<send>,<expect>` in milliseconds.
    #[must_use]
    pub fn heart_beat_header(&self) -> String {
        format!(
            "{},{}",
            self.heartbeat_interval.as_millis(),
            self.server_timeout.as_millis()
        )
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Whether a lost connection is retried automatically
    #[builder(default = true)]
    pub enabled: bool,
    /// Initial backoff duration for first reconnection attempt
    #[builder(default = DEFAULT_INITIAL_BACKOFF_DURATION)]
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    #[builder(default = DEFAULT_MAX_BACKOFF_DURATION)]
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    #[builder(default = DEFAULT_BACKOFF_MULTIPLIER)]
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();

        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.server_timeout, Duration::from_secs(30));
        assert_eq!(config.liveness_check_interval, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, None);
        assert_eq!(config.max_queued_frames, None);
        assert_eq!(config.content_type, "application/json");
        assert_eq!(config.host, "localhost");
        assert!(config.reconnect.enabled, "reconnect is on by default");
        assert_eq!(config.reconnect.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_backoff, Duration::from_secs(30));
    }

    #[test]
    fn heart_beat_header_uses_milliseconds() {
        let config = Config::builder()
            .heartbeat_interval(Duration::from_millis(2_500))
            .server_timeout(Duration::ZERO)
            .build();

        assert_eq!(config.heart_beat_header(), "2500,0");
    }

    #[test]
    fn builder_overrides_reconnect() {
        let config = Config::builder()
            .reconnect(ReconnectConfig::builder().enabled(false).build())
            .build();

        assert!(!config.reconnect.enabled, "override should stick");
        assert_eq!(config.reconnect.initial_backoff, Duration::from_secs(1));
    }
}
