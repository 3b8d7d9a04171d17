//! Configuration for the terminal client.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TODO_API_URL` | `http://localhost:8000` | Base URL of the todo API |
//! | `TODO_STATE_DIR` | platform data dir | Directory holding `session.json` |
//!
//! Command-line flags take precedence over both.

use std::env;
use std::path::PathBuf;

use directories::ProjectDirs;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

const API_URL_VAR: &str = "TODO_API_URL";
const STATE_DIR_VAR: &str = "TODO_STATE_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// No state directory was given and the platform has none to offer.
    #[error("failed to determine a data directory; set TODO_STATE_DIR or pass --state-dir")]
    NoDataDirectory,
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub state_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(Overrides::default())
    }

    pub fn from_env_with(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::from_sources(|key| env::var(key).ok(), overrides, default_state_dir)
    }

    /// Resolve each setting from the override, then `lookup`, then the default.
    /// Empty values count as unset.
    fn from_sources<L, D>(lookup: L, overrides: Overrides, default_dir: D) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
        D: FnOnce() -> Option<PathBuf>,
    {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let api_url = non_empty(overrides.api_url)
            .or_else(|| non_empty(lookup(API_URL_VAR)))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim().to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: API_URL_VAR.to_string(),
                message: format!("expected an http(s) URL, got '{api_url}'"),
            });
        }

        let state_dir = match overrides.state_dir {
            Some(dir) => dir,
            None => match non_empty(lookup(STATE_DIR_VAR)) {
                Some(dir) => PathBuf::from(dir),
                None => default_dir().ok_or(ConfigError::NoDataDirectory)?,
            },
        };

        Ok(Self { api_url, state_dir })
    }
}

fn default_state_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "todo").map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn resolve(vars: &[(&str, &str)], overrides: Overrides) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_sources(
            |key| vars.get(key).cloned(),
            overrides,
            || Some(PathBuf::from("/data/todo")),
        )
    }

    #[test]
    fn defaults() {
        let config = resolve(&[], Overrides::default()).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.state_dir, PathBuf::from("/data/todo"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = resolve(
            &[("TODO_API_URL", "https://todo.example"), ("TODO_STATE_DIR", "/tmp/state")],
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(config.api_url, "https://todo.example");
        assert_eq!(config.state_dir, PathBuf::from("/tmp/state"));
    }

    #[test]
    fn flags_override_environment() {
        let config = resolve(
            &[("TODO_API_URL", "https://todo.example"), ("TODO_STATE_DIR", "/tmp/state")],
            Overrides {
                api_url: Some("http://127.0.0.1:9000".into()),
                state_dir: Some(PathBuf::from("/flag/dir")),
            },
        )
        .unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:9000");
        assert_eq!(config.state_dir, PathBuf::from("/flag/dir"));
    }

    #[test]
    fn empty_variables_are_ignored() {
        let config = resolve(&[("TODO_API_URL", "  "), ("TODO_STATE_DIR", "")], Overrides::default())
            .unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.state_dir, PathBuf::from("/data/todo"));
    }

    #[test]
    fn rejects_non_http_url() {
        let err = resolve(&[("TODO_API_URL", "ftp://files")], Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TODO_API_URL"));
    }

    #[test]
    fn missing_data_directory() {
        let err = Config::from_sources(|_| None, Overrides::default(), || None).unwrap_err();
        assert!(matches!(err, ConfigError::NoDataDirectory));

        // An explicit directory makes the platform lookup irrelevant.
        let config = Config::from_sources(
            |_| None,
            Overrides {
                api_url: None,
                state_dir: Some(PathBuf::from("/x")),
            },
            || None,
        )
        .unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/x"));
    }
}
