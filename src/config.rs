//! Interpreter configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Limits and switches of one engine. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Nested calls allowed before `StackOverflow`.
    pub max_call_depth: usize,
    /// Native stack one execution may use before `StackOverflow`, in bytes.
    /// Keep it well below the stack size of the thread running scripts.
    pub max_stack_bytes: usize,
    /// Largest `new T[n]` a script may allocate.
    pub max_array_len: usize,
    /// Loop iterations plus calls allowed before `Interrupted`.
    pub max_steps: Option<u64>,
    /// Register the C standard-library subset.
    pub stdlib: bool,
    /// Keep script output in memory instead of writing to stdout.
    pub capture_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
            max_stack_bytes: 1 << 20,
            max_array_len: 1 << 24,
            max_steps: None,
            stdlib: true,
            capture_output: false,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Same settings with output captured, as tests and embedders want.
    pub fn captured() -> Self {
        Self {
            capture_output: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = Config::from_json(r#"{ "max_steps": 1000 }"#).unwrap();
        assert_eq!(config.max_steps, Some(1000));
        assert_eq!(config.max_call_depth, 200);
        assert_eq!(config.max_stack_bytes, 1 << 20);
        assert!(config.stdlib);
        assert!(!config.capture_output);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "stdlib": false, "capture_output": true }}"#).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(!config.stdlib);
        assert!(config.capture_output);

        let err = Config::load(Path::new("/nonexistent/eci.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ max_call_depth: }}").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
