use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid API base URL {raw:?}: {source}")]
    InvalidUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },
    #[error("API base URL must be http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("invalid timeout {0:?}")]
    InvalidTimeout(String),
}

/// Where the backend lives and how long to wait for it.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|source| ConfigError::InvalidUrl {
            raw: base_url.to_owned(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_owned()));
        }
        Ok(Self {
            base_url: parsed,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `LMS_API_URL` and `LMS_HTTP_TIMEOUT_SECS`, falling back to
    /// defaults when unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(None)
    }

    /// Like [`ApiConfig::from_env`], with `base_url` taking the place of
    /// `LMS_API_URL` when given. The timeout still comes from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL or a set variable is malformed.
    pub fn from_env_with(base_url: Option<&str>) -> Result<Self, ConfigError> {
        Self::from_vars(base_url, |key| env::var(key).ok())
    }

    fn from_vars(
        base_url: Option<&str>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let base = match base_url {
            Some(url) => url.to_owned(),
            None => var("LMS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
        };
        let mut config = Self::new(&base)?;
        if let Some(raw) = var("LMS_HTTP_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Absolute URL for an API path such as `/lessons/4`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let config = ApiConfig::new("http://localhost:8080/api/").unwrap();
        assert_eq!(
            config.endpoint("/lessons/4"),
            "http://localhost:8080/api/lessons/4"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            ApiConfig::new("ftp://example.com"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            ApiConfig::new("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn explicit_base_url_keeps_env_timeout() {
        let env = vars(&[
            ("LMS_API_URL", "http://ignored.example"),
            ("LMS_HTTP_TIMEOUT_SECS", "42"),
        ]);
        let config = ApiConfig::from_vars(Some("https://lms.example/api"), env).unwrap();
        assert_eq!(config.base_url.as_str(), "https://lms.example/api");
        assert_eq!(config.timeout, Duration::from_secs(42));
    }

    #[test]
    fn unset_vars_fall_back_to_defaults() {
        let config = ApiConfig::from_vars(None, vars(&[])).unwrap();
        assert_eq!(config.endpoint("x"), format!("{DEFAULT_API_URL}/x"));
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        let env = vars(&[("LMS_HTTP_TIMEOUT_SECS", "soon")]);
        assert!(matches!(
            ApiConfig::from_vars(None, env),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }
}
