//! Client configuration.

use std::time::Duration;

/// Default request/response base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Default push channel URL.
pub const DEFAULT_PUSH_URL: &str = "ws://localhost:8000/ws";

/// Reconnect schedule of the push channel.
///
/// The delay before attempt `n` (zero-based) is `min(base_delay * 2^n,
/// max_delay)`. After `max_attempts` consecutive failures the channel gives
/// up and reports [`ChannelStatus::Exhausted`](crate::ChannelStatus).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: 8,
        }
    }
}

/// What happens to an emit issued while the push channel is not open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitPolicy {
    /// Queue the emit and flush it, in order, once the channel opens.
    #[default]
    Queue,
    /// Fail the emit immediately with a disconnected error.
    FailFast,
}

/// Configuration shared by the request/response client and the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the request/response API.
    pub api_base_url: String,
    /// URL of the push channel.
    pub push_url: String,
    /// Timeout for a single request/response call.
    pub request_timeout: Duration,
    /// Push channel reconnect schedule.
    pub reconnect: ReconnectPolicy,
    /// Emit behavior while the push channel is not open.
    pub emit_policy: EmitPolicy,
    /// Maximum number of emits held while the channel is not open.
    pub max_queued_emits: usize,
}

impl ClientConfig {
    /// Create a configuration for the given endpoints with default tuning.
    pub fn new(api_base_url: impl Into<String>, push_url: impl Into<String>) -> Self {
        Self { api_base_url: api_base_url.into(), push_url: push_url.into(), ..Self::default() }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the reconnect schedule.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the emit policy.
    #[must_use]
    pub fn with_emit_policy(mut self, policy: EmitPolicy) -> Self {
        self.emit_policy = policy;
        self
    }

    /// Set the emit queue bound.
    #[must_use]
    pub fn with_max_queued_emits(mut self, max: usize) -> Self {
        self.max_queued_emits = max;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            push_url: DEFAULT_PUSH_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            emit_policy: EmitPolicy::default(),
            max_queued_emits: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn reconnect_delay_is_monotonic_and_capped(
            base_ms in 1u64..2_000,
            max_ms in 1u64..60_000,
            attempt in 0u32..64,
        ) {
            let policy = ReconnectPolicy {
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(max_ms),
                max_attempts: 8,
            };

            prop_assert!(policy.delay(attempt) <= policy.max_delay);
            prop_assert!(policy.delay(attempt) <= policy.delay(attempt + 1));
        }
    }

    #[test]
    fn reconnect_delay_doubles_then_caps() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(4), Duration::from_secs(8));
        assert_eq!(policy.delay(5), Duration::from_secs(10));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let config = ClientConfig::default();

        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.emit_policy, EmitPolicy::Queue);
        assert_eq!(config.max_queued_emits, 64);
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::new("https://play.example/api", "wss://play.example/ws")
            .with_emit_policy(EmitPolicy::FailFast)
            .with_max_queued_emits(4);

        assert_eq!(config.push_url, "wss://play.example/ws");
        assert_eq!(config.emit_policy, EmitPolicy::FailFast);
        assert_eq!(config.max_queued_emits, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }
}
