//! Client configuration.

use serde::Deserialize;

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "TASKDECK_";

/// API client configuration loaded from environment variables.
///
/// Environment variables are prefixed with `TASKDECK_`:
/// - `TASKDECK_API_BASE_URL`: Backend origin (default: "http://localhost:8000").
///   `TASKDECK_API_URL` is accepted when the former is unset.
/// - `TASKDECK_CSRF_COOKIE_NAME`: Client-readable CSRF cookie (default: "csrf_token")
/// - `TASKDECK_CSRF_HEADER_NAME`: Header the backend reads the token from (default: "X-CSRF-Token")
/// - `TASKDECK_CSRF_BOOTSTRAP_PATH`: Endpoint that (re)sets the CSRF cookie (default: "/auth/csrf")
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Backend origin, optionally with a path prefix.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Name of the CSRF cookie set by the backend.
    #[serde(default = "default_csrf_cookie_name")]
    pub csrf_cookie_name: String,

    /// Name of the request header carrying the CSRF token.
    #[serde(default = "default_csrf_header_name")]
    pub csrf_header_name: String,

    /// Path of the CSRF bootstrap endpoint.
    #[serde(default = "default_csrf_bootstrap_path")]
    pub csrf_bootstrap_path: String,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_csrf_cookie_name() -> String {
    "csrf_token".to_string()
}

fn default_csrf_header_name() -> String {
    "X-CSRF-Token".to_string()
}

fn default_csrf_bootstrap_path() -> String {
    "/auth/csrf".to_string()
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, envy::Error> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of `(name, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let mut config: ClientConfig = envy::prefixed(ENV_PREFIX).from_iter(vars.clone())?;

        let has_base_url = vars
            .iter()
            .any(|(k, _)| k.as_str() == format!("{}API_BASE_URL", ENV_PREFIX));
        if !has_base_url {
            let legacy = format!("{}API_URL", ENV_PREFIX);
            if let Some((_, url)) = vars.iter().find(|(k, _)| *k == legacy) {
                config.api_base_url = url.clone();
            }
        }

        Ok(config)
    }

    /// Replace the backend origin.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            csrf_cookie_name: default_csrf_cookie_name(),
            csrf_header_name: default_csrf_header_name(),
            csrf_bootstrap_path: default_csrf_bootstrap_path(),
        }
    }
}
