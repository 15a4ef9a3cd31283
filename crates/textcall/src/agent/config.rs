//! Configuration for the [`Agent`](super::harness::Agent).
//!
//! Defaults: five turns, strict error handling, unbounded tool concurrency,
//! a 200-byte detection prefix and no run timeout.
//!
//! # Examples
//!
//! Builder methods:
//!
//! ```
//! use std::time::Duration;
//! use textcall::agent::config::AgentConfig;
//!
//! let config = AgentConfig::default()
//!     .with_max_turns(3)
//!     .with_timeout(Duration::from_secs(30))
//!     .with_lenient_errors(true)
//!     .with_max_concurrent(4);
//! assert!(config.validate().is_ok());
//! ```
//!
//! From a JSON file, where every field is optional:
//!
//! ```json
//! {
//!   "max_turns": 4,
//!   "timeout_secs": 60,
//!   "pass_through_on_error": true,
//!   "max_concurrent": 2,
//!   "include_original_text": false,
//!   "detection_buffer_bytes": 200
//! }
//! ```

use crate::error::ConfigError;
use crate::tools::executor::ExecutionPolicy;
use crate::{DEFAULT_DETECTION_BUFFER_BYTES, DEFAULT_MAX_TURNS};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration for one [`Agent`](super::harness::Agent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Model turns allowed before the run fails. At least 1.
    pub max_turns: u32,
    /// How tool batches are executed and reported.
    pub policy: ExecutionPolicy,
    /// Deadline for the whole run. `None` is unbounded.
    pub timeout: Option<Duration>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            policy: ExecutionPolicy::default(),
            timeout: None,
        }
    }
}

impl AgentConfig {
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Set the run deadline. A zero duration means unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report tool failures to the model instead of aborting the run.
    pub fn with_lenient_errors(mut self, enabled: bool) -> Self {
        self.policy.pass_through_on_error = enabled;
        self
    }

    /// Cap concurrent tool calls per turn. 0 means unbounded.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.policy.max_concurrent = max;
        self
    }

    pub fn with_include_original_text(mut self, enabled: bool) -> Self {
        self.policy.include_original_text = enabled;
        self
    }

    pub fn with_detection_buffer_bytes(mut self, bytes: usize) -> Self {
        self.policy.detection_buffer_bytes = bytes;
        self
    }

    /// Check the invariants the agent relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == 0 {
            return Err(ConfigError::Invalid {
                field: "max_turns",
                reason: "must be at least 1".into(),
            });
        }
        self.policy.validate()
    }

    /// Load and validate a config from a JSON file. Missing fields keep
    /// their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: AgentConfigFile =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let config = AgentConfig::from(file);
        config.validate()?;
        Ok(config)
    }
}

/// On-disk shape of [`AgentConfig`].
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AgentConfigFile {
    max_turns: u32,
    timeout_secs: u64,
    pass_through_on_error: bool,
    max_concurrent: usize,
    include_original_text: bool,
    detection_buffer_bytes: usize,
}

impl Default for AgentConfigFile {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            timeout_secs: 0,
            pass_through_on_error: false,
            max_concurrent: 0,
            include_original_text: false,
            detection_buffer_bytes: DEFAULT_DETECTION_BUFFER_BYTES,
        }
    }
}

impl From<AgentConfigFile> for AgentConfig {
    fn from(file: AgentConfigFile) -> Self {
        AgentConfig::default()
            .with_max_turns(file.max_turns)
            .with_timeout(Duration::from_secs(file.timeout_secs))
            .with_policy(ExecutionPolicy {
                pass_through_on_error: file.pass_through_on_error,
                max_concurrent: file.max_concurrent,
                include_original_text: file.include_original_text,
                detection_buffer_bytes: file.detection_buffer_bytes,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_turns, 5);
        assert_eq!(config.timeout, None);
        assert!(!config.policy.pass_through_on_error);
        assert_eq!(config.policy.max_concurrent, 0);
        assert_eq!(config.policy.detection_buffer_bytes, 200);
    }

    #[test]
    fn zero_timeout_is_unbounded() {
        let config = AgentConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_timeout(Duration::ZERO);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn zero_turns_rejected() {
        let err = AgentConfig::default().with_max_turns(0).validate().unwrap_err();
        assert!(err.to_string().contains("max_turns"));
    }

    #[test]
    fn loads_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_turns": 2, "timeout_secs": 3, "pass_through_on_error": true}}"#).unwrap();

        let config = AgentConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_turns, 2);
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
        assert!(config.policy.pass_through_on_error);
        assert_eq!(config.policy.detection_buffer_bytes, 200);
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_rounds": 2}}"#).unwrap();
        assert!(matches!(
            AgentConfig::from_json_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"detection_buffer_bytes": 0}}"#).unwrap();
        assert!(matches!(
            AgentConfig::from_json_file(file.path()),
            Err(ConfigError::Invalid { field: "detection_buffer_bytes", .. })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(
            AgentConfig::from_json_file("/nonexistent/textcall.json"),
            Err(ConfigError::Read { .. })
        ));
    }
}
