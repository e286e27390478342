//! Engine settings with environment overrides.
//!
//! Defaults are code-side; `from_env` layers `.env` and process environment
//! on top. Unparseable values fall back to the default rather than failing
//! startup, with a warning so misconfiguration is visible.

use std::time::Duration;

/// Tunable engine settings.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Per-session invocation ceiling. The admission check is evaluated on
    /// the pre-increment count, so one invocation past this value is let
    /// through.
    pub rate_limit: u32,
    /// Session idle timeout; the timer rearms on every access.
    pub idle_timeout: Duration,
    /// Number of trailing messages handed to the chat capability.
    pub chat_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit: 10,
            idle_timeout: Duration::from_secs(300),
            chat_window: 10,
        }
    }
}

impl EngineConfig {
    /// Load settings from the environment, reading a `.env` file when
    /// present. Recognized variables: `FLOWRUN_RATE_LIMIT`,
    /// `FLOWRUN_IDLE_TIMEOUT_MS`, `FLOWRUN_CHAT_WINDOW`.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            rate_limit: env_parse("FLOWRUN_RATE_LIMIT", defaults.rate_limit),
            idle_timeout: Duration::from_millis(env_parse(
                "FLOWRUN_IDLE_TIMEOUT_MS",
                defaults.idle_timeout.as_millis() as u64,
            )),
            chat_window: env_parse("FLOWRUN_CHAT_WINDOW", defaults.chat_window),
        }
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_chat_window(mut self, window: usize) -> Self {
        self.chat_window = window;
        self
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(%key, %raw, "unparseable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.chat_window, 10);
    }

    #[test]
    fn builder_overrides() {
        let config = EngineConfig::default()
            .with_rate_limit(3)
            .with_chat_window(4)
            .with_idle_timeout(Duration::from_millis(50));
        assert_eq!(config.rate_limit, 3);
        assert_eq!(config.chat_window, 4);
        assert_eq!(config.idle_timeout, Duration::from_millis(50));
    }
}
