//! Convenience re-exports for common `textcall` types.
//!
//! Meant to be glob-imported when building agents:
//!
//! ```ignore
//! use textcall::prelude::*;
//! ```
//!
//! This pulls in what most programs need: the [`Agent`] and its config, the
//! [`ModelProvider`] contract, the [`Tool`] trait with [`ToolSet`], event
//! handlers, and the stage types. Parser strategies and the detector are
//! left out; import those from their modules directly when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{AgentError, ConfigError, ToolDef, ToolFailure, json_schema_for};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentConfig, AgentEvent, AgentResult, CompositeEventHandler, EventHandler,
    FnEventHandler, LoggingHandler, NoopHandler, RunSummary,
};

// ── Providers ───────────────────────────────────────────────────────
pub use crate::api::{ModelProvider, ScriptedProvider};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{
    Calculator, ExecutionPolicy, FnTool, ThinkTool, Tool, ToolCall, ToolFuture, ToolResult,
    ToolSet,
};

// ── Stages ──────────────────────────────────────────────────────────
pub use crate::pipeline::{Pipeline, RunContext, Stage, ToolStage};
