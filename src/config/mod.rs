//! Client configuration (code > environment).

use chrono::Duration;

/// Session validity windows. Policy values are configuration, not
/// constants baked into the flow services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Window applied when the user asked to be remembered.
    pub remember_window: Duration,
    /// Window applied otherwise.
    pub short_window: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            remember_window: Duration::days(30),
            short_window: Duration::days(1),
        }
    }
}

impl SessionPolicy {
    /// The validity window selected by the remember flag.
    pub fn window(&self, remember: bool) -> Duration {
        if remember {
            self.remember_window
        } else {
            self.short_window
        }
    }
}

/// Configuration for the orchestration client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the identity backend, including the API prefix
    /// (e.g. `https://id.example.net/api/v0`).
    pub base_url: String,
    /// Route of the login entry point, used by the route gate.
    pub login_path: String,
    /// Landing route used when a consent denial has no redirect URI.
    pub landing_path: String,
    pub session: SessionPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: "/login".to_string(),
            landing_path: "/".to_string(),
            session: SessionPolicy::default(),
        }
    }

    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session = policy;
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    /// Load from environment variables, falling back to defaults.
    ///
    /// Recognized: `AUTHFLOW_BASE_URL`, `AUTHFLOW_LOGIN_PATH`,
    /// `AUTHFLOW_LANDING_PATH`, `AUTHFLOW_REMEMBER_DAYS`,
    /// `AUTHFLOW_SHORT_DAYS`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let base_url = std::env::var("AUTHFLOW_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/api/v0".to_string());
        let mut config = Self::new(base_url);

        if let Ok(path) = std::env::var("AUTHFLOW_LOGIN_PATH") {
            config.login_path = path;
        }
        if let Ok(path) = std::env::var("AUTHFLOW_LANDING_PATH") {
            config.landing_path = path;
        }
        if let Some(days) = env_days("AUTHFLOW_REMEMBER_DAYS") {
            config.session.remember_window = days;
        }
        if let Some(days) = env_days("AUTHFLOW_SHORT_DAYS") {
            config.session.short_window = days;
        }

        config
    }
}

fn env_days(var: &str) -> Option<Duration> {
    let raw = std::env::var(var).ok()?;
    match raw.parse::<i64>() {
        Ok(days) if days > 0 => Some(Duration::days(days)),
        _ => {
            tracing::warn!(var, raw = %raw, "ignoring invalid day count");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_selects_window_by_remember_flag() {
        let policy = SessionPolicy::default();
        assert_eq!(policy.window(true), Duration::days(30));
        assert_eq!(policy.window(false), Duration::days(1));
    }

    #[test]
    fn builder_overrides_paths() {
        let config = ClientConfig::new("https://id.example.net/api/v0")
            .with_login_path("/signin")
            .with_landing_path("/home");
        assert_eq!(config.login_path, "/signin");
        assert_eq!(config.landing_path, "/home");
    }
}
