use std::time::Duration;

use reqwest::Url;

use crate::{error::DashboardError, sync::DEFAULT_POLL_INTERVAL};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// HTTP method used to pull the analytics list.
///
/// The origin only answers POST on its analytics route; GET is for sources
/// that sit behind a plain static or proxied URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMethod {
    Get,
    #[default]
    Post,
}

impl std::str::FromStr for FetchMethod {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(DashboardError::ConfigurationInvalid(format!(
                "ANALYTICS_METHOD must be GET or POST, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Analytics list endpoint (origin route or the cache-busting proxy),
    /// e.g. "https://api.example.com/api/analytics". No trailing slash.
    pub analytics_url: String,

    /// Link-creation API origin, e.g. "https://ln.k". No trailing slash.
    /// Also the base for short links rendered in the table.
    pub api_url: String,

    pub analytics_method: FetchMethod,

    /// How often the sync engine polls for fresh analytics
    pub poll_interval: Duration,

    /// Upper bound on every outbound request
    pub request_timeout: Duration,
}

impl DashboardConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self, DashboardError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DashboardError> {
        let analytics_url = required_url(&lookup, "ANALYTICS_API_URL")?;
        let api_url = required_url(&lookup, "SHORTENER_API_URL")?;

        let analytics_method = match non_blank(&lookup, "ANALYTICS_METHOD") {
            Some(raw) => raw.parse()?,
            None => FetchMethod::default(),
        };

        Ok(Self {
            analytics_url,
            api_url,
            analytics_method,
            poll_interval: seconds(
                &lookup,
                "POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL.as_secs(),
            )?,
            request_timeout: seconds(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Analytics endpoint every proxied call is forwarded to
    pub upstream_url: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    pub request_timeout: Duration,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, DashboardError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DashboardError> {
        let port = non_blank(&lookup, "PORT")
            .unwrap_or_else(|| "3000".into())
            .parse::<u16>()
            .map_err(|_| {
                DashboardError::ConfigurationInvalid(
                    "PORT must be a valid port number (1–65535)".into(),
                )
            })?;

        Ok(Self {
            upstream_url: required_url(&lookup, "ANALYTICS_API_URL")?,
            host: non_blank(&lookup, "HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            request_timeout: seconds(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn non_blank(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn required_url(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, DashboardError> {
    let raw = non_blank(lookup, key).ok_or(DashboardError::ConfigurationMissing(key))?;

    let parsed = Url::parse(&raw).map_err(|e| {
        DashboardError::ConfigurationInvalid(format!("{key} is not a valid URL: {e}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DashboardError::ConfigurationInvalid(format!(
            "{key} must start with http:// or https://"
        )));
    }

    Ok(raw.trim_end_matches('/').to_owned())
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, DashboardError> {
    let secs = match non_blank(lookup, key) {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            DashboardError::ConfigurationInvalid(format!("{key} must be a whole number of seconds"))
        })?,
        None => default,
    };
    if secs == 0 {
        return Err(DashboardError::ConfigurationInvalid(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn dashboard_defaults() {
        let config = DashboardConfig::from_lookup(env(&[
            ("ANALYTICS_API_URL", "https://api.example.com/api/analytics/"),
            ("SHORTENER_API_URL", "https://ln.k/"),
        ]))
        .unwrap();

        assert_eq!(config.analytics_url, "https://api.example.com/api/analytics");
        assert_eq!(config.api_url, "https://ln.k");
        assert_eq!(config.analytics_method, FetchMethod::Post);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn missing_analytics_url_is_fatal() {
        let err = DashboardConfig::from_lookup(env(&[("SHORTENER_API_URL", "https://ln.k")]))
            .unwrap_err();
        assert_eq!(err, DashboardError::ConfigurationMissing("ANALYTICS_API_URL"));
    }

    #[test]
    fn blank_creation_url_counts_as_missing() {
        let err = DashboardConfig::from_lookup(env(&[
            ("ANALYTICS_API_URL", "https://api.example.com"),
            ("SHORTENER_API_URL", "   "),
        ]))
        .unwrap_err();
        assert_eq!(err, DashboardError::ConfigurationMissing("SHORTENER_API_URL"));
    }

    #[test]
    fn rejects_non_http_urls_and_zero_intervals() {
        let err = DashboardConfig::from_lookup(env(&[
            ("ANALYTICS_API_URL", "ftp://example.com"),
            ("SHORTENER_API_URL", "https://ln.k"),
        ]))
        .unwrap_err();
        assert!(matches!(err, DashboardError::ConfigurationInvalid(_)));

        let err = DashboardConfig::from_lookup(env(&[
            ("ANALYTICS_API_URL", "https://api.example.com"),
            ("SHORTENER_API_URL", "https://ln.k"),
            ("POLL_INTERVAL_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, DashboardError::ConfigurationInvalid(_)));
    }

    #[test]
    fn method_and_interval_overrides() {
        let config = DashboardConfig::from_lookup(env(&[
            ("ANALYTICS_API_URL", "https://api.example.com"),
            ("SHORTENER_API_URL", "https://ln.k"),
            ("ANALYTICS_METHOD", "get"),
            ("POLL_INTERVAL_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.analytics_method, FetchMethod::Get);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn proxy_config() {
        let config = ProxyConfig::from_lookup(env(&[
            ("ANALYTICS_API_URL", "https://api.example.com/api/analytics"),
            ("PORT", "8081"),
        ]))
        .unwrap();
        assert_eq!(config.upstream_url, "https://api.example.com/api/analytics");
        assert_eq!(config.bind_addr(), "0.0.0.0:8081");

        let err = ProxyConfig::from_lookup(env(&[])).unwrap_err();
        assert_eq!(err, DashboardError::ConfigurationMissing("ANALYTICS_API_URL"));

        let err = ProxyConfig::from_lookup(env(&[
            ("ANALYTICS_API_URL", "https://api.example.com"),
            ("PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, DashboardError::ConfigurationInvalid(_)));
    }
}
