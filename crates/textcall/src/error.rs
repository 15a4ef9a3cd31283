//! Typed failures.
//!
//! Per-call tool problems are data ([`ToolResult`](crate::tools::executor::ToolResult)
//! errors) until strict mode escalates them into a [`ToolFailure`]. Everything
//! that ends a run is an [`AgentError`] carrying the turn it happened in.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A tool call that failed while the batch was running in strict mode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tool '{tool}' ({call_id}) failed: {message}")]
pub struct ToolFailure {
    /// Name of the failing tool as the model wrote it.
    pub tool: String,
    /// Id of the failing call.
    pub call_id: String,
    /// The formatted per-call error (`Tool '…' not found`, `Tool execution error: …`).
    pub message: String,
}

/// Fatal failure of an agent run or pipeline stage.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A tool failed in strict mode.
    #[error("turn {turn}: {source}")]
    Tool {
        turn: u32,
        #[source]
        source: ToolFailure,
    },
    /// The model kept requesting tools through the last allowed turn.
    #[error("iteration budget exceeded: no final answer after {max_turns} turn(s)")]
    IterationBudgetExceeded { max_turns: u32 },
    /// The run deadline elapsed.
    #[error("turn {turn}: timed out after {limit:?}")]
    Timeout { turn: u32, limit: Duration },
    /// The model provider failed. Not retried here.
    #[error("turn {turn}: model call failed: {message}")]
    Model { turn: u32, message: String },
    /// Reading the model stream or writing the output failed.
    #[error("turn {turn}: stream error: {source}")]
    Io {
        turn: u32,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AgentError {
    /// The turn the failure happened in, if it is tied to one.
    pub fn turn(&self) -> Option<u32> {
        match self {
            AgentError::Tool { turn, .. }
            | AgentError::Timeout { turn, .. }
            | AgentError::Model { turn, .. }
            | AgentError::Io { turn, .. } => Some(*turn),
            AgentError::IterationBudgetExceeded { max_turns } => Some(*max_turns),
            AgentError::Config(_) => None,
        }
    }

    /// Name of the failing tool for strict-mode tool failures.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            AgentError::Tool { source, .. } => Some(&source.tool),
            _ => None,
        }
    }

    pub(crate) fn io(turn: u32) -> impl FnOnce(std::io::Error) -> AgentError {
        move |source| AgentError::Io { turn, source }
    }
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_display_names_turn_and_tool() {
        let err = AgentError::Tool {
            turn: 2,
            source: ToolFailure {
                tool: "search".into(),
                call_id: "call_0".into(),
                message: "Tool 'search' not found".into(),
            },
        };
        let text = err.to_string();
        assert!(text.starts_with("turn 2:"));
        assert!(text.contains("not found"));
        assert_eq!(err.turn(), Some(2));
        assert_eq!(err.tool_name(), Some("search"));
    }

    #[test]
    fn budget_error_mentions_iteration_budget() {
        let err = AgentError::IterationBudgetExceeded { max_turns: 2 };
        assert!(err.to_string().contains("iteration budget exceeded"));
        assert_eq!(err.tool_name(), None);
    }

    #[test]
    fn config_error_has_no_turn() {
        let err: AgentError = ConfigError::Invalid {
            field: "max_turns",
            reason: "must be at least 1".into(),
        }
        .into();
        assert_eq!(err.turn(), None);
        assert!(err.to_string().contains("max_turns"));
    }
}
