use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppProfile {
    Dev,
    Prod,
}

impl AppProfile {
    pub fn from_env(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("prod") | Some("production") => Self::Prod,
            _ => Self::Dev,
        }
    }

    pub fn log_level(self) -> tracing::Level {
        match self {
            Self::Dev => tracing::Level::DEBUG,
            Self::Prod => tracing::Level::INFO,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub profile: AppProfile,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_token: None,
            profile: AppProfile::Dev,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        crate::config::load_dotenv();

        Self::from_lookup(read_env)
    }

    /// Builds a config from an arbitrary key lookup; unset or unparsable
    /// values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("CHART_CONSOLE_API_BASE_URL") {
            config.api_base_url = url;
        }

        if let Some(token) = lookup("CHART_CONSOLE_AUTH_TOKEN").filter(|t| !t.trim().is_empty()) {
            config.auth_token = Some(token);
        }

        config.profile = AppProfile::from_env(lookup("CHART_CONSOLE_PROFILE"));

        if let Some(secs) = lookup("CHART_CONSOLE_REQUEST_TIMEOUT_SECS")
            .and_then(|value| value.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }

        config
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.auth_token
            .as_ref()
            .map(|token| format!("Bearer {}", token.trim()))
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .or_else(|| option_env_from_build(key).map(|s| s.to_string()))
}

fn option_env_from_build(key: &str) -> Option<&'static str> {
    match key {
        "CHART_CONSOLE_API_BASE_URL" => option_env!("CHART_CONSOLE_API_BASE_URL"),
        "CHART_CONSOLE_AUTH_TOKEN" => option_env!("CHART_CONSOLE_AUTH_TOKEN"),
        "CHART_CONSOLE_PROFILE" => option_env!("CHART_CONSOLE_PROFILE"),
        "CHART_CONSOLE_REQUEST_TIMEOUT_SECS" => option_env!("CHART_CONSOLE_REQUEST_TIMEOUT_SECS"),
        _ => None,
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!("failed to load .env: {err}");
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[inline]
pub fn load_dotenv() {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.profile, AppProfile::Dev);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.bearer_token().is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CHART_CONSOLE_API_BASE_URL", "https://bi.example.com/api/"),
            ("CHART_CONSOLE_AUTH_TOKEN", " abc "),
            ("CHART_CONSOLE_PROFILE", "production"),
            ("CHART_CONSOLE_REQUEST_TIMEOUT_SECS", "0"),
        ]));
        assert_eq!(config.api_base_url, "https://bi.example.com/api/");
        assert_eq!(config.bearer_token().as_deref(), Some("Bearer abc"));
        assert_eq!(config.profile, AppProfile::Prod);
        assert_eq!(config.request_timeout, Duration::from_secs(1));
    }

    #[test]
    fn ignores_garbage_timeout_and_blank_token() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CHART_CONSOLE_REQUEST_TIMEOUT_SECS", "soon"),
            ("CHART_CONSOLE_AUTH_TOKEN", "   "),
        ]));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.auth_token.is_none());
    }
}
