//! Client configuration, read from the environment.

use std::env;
use std::path::PathBuf;

use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";

const API_URL_VAR: &str = "TASKFLOW_API_URL";
const TOKEN_PATH_VAR: &str = "TASKFLOW_TOKEN_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL including the API prefix, e.g. `http://127.0.0.1:5000/api`.
    pub api_base_url: String,
    /// File holding the persisted session token.
    pub token_path: PathBuf,
}

impl Config {
    pub fn new(api_base_url: impl Into<String>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            token_path: token_path.into(),
        }
    }

    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_base_url = var(&lookup, API_URL_VAR).unwrap_or_else(|| {
            info!("{API_URL_VAR} not set, using default: {DEFAULT_API_URL}");
            DEFAULT_API_URL.to_string()
        });
        let token_path = var(&lookup, TOKEN_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_token_path(lookup("HOME")));
        Self { api_base_url, token_path }
    }
}

fn var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        Some(_) => {
            warn!("{key} is empty, using default");
            None
        }
        None => None,
    }
}

fn default_token_path(home: Option<String>) -> PathBuf {
    match home.filter(|home| !home.is_empty()) {
        Some(home) => PathBuf::from(home).join(".taskflow").join("session.json"),
        None => {
            warn!("HOME not set, keeping the session next to the working directory");
            PathBuf::from(".taskflow-session.json")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_keeps_values() {
        let config = Config::new("http://example.test/api", "/tmp/token.json");
        assert_eq!(config.api_base_url, "http://example.test/api");
        assert_eq!(config.token_path, PathBuf::from("/tmp/token.json"));
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn unset_url_defaults_to_loopback() {
        let config = Config::from_lookup(env(&[("HOME", "/home/alice")]));
        assert_eq!(config.api_base_url, "http://127.0.0.1:5000/api");
        assert_eq!(config.token_path, PathBuf::from("/home/alice/.taskflow/session.json"));
    }

    #[test]
    fn empty_variables_fall_back_to_defaults() {
        let config = Config::from_lookup(env(&[(API_URL_VAR, "  "), (TOKEN_PATH_VAR, ""), ("HOME", "/home/bob")]));
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.token_path, PathBuf::from("/home/bob/.taskflow/session.json"));
    }

    #[test]
    fn set_variables_are_trimmed() {
        let config = Config::from_lookup(env(&[
            (API_URL_VAR, " http://tasks.test/api "),
            (TOKEN_PATH_VAR, "/var/lib/taskflow/token.json"),
        ]));
        assert_eq!(config.api_base_url, "http://tasks.test/api");
        assert_eq!(config.token_path, PathBuf::from("/var/lib/taskflow/token.json"));
    }

    #[test]
    fn missing_home_keeps_session_in_working_directory() {
        let config = Config::from_lookup(env(&[]));
        assert_eq!(config.token_path, PathBuf::from(".taskflow-session.json"));
    }
}
