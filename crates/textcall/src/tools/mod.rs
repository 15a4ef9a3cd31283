//! Tools the model can call, and everything between a model answer and the
//! text fed back to it.
//!
//! Every capability is a [`Tool`] implementor. Tools are collected into a
//! [`ToolSet`], the registry for one execution scope, which handles lookup,
//! validation, truncation, and timeouts.
//!
//! # Defining tools
//!
//! - **[`FnTool`]**: closure-based. [`FnTool::text`] for free-text
//!   arguments, [`FnTool::new`] for typed JSON arguments.
//! - **`impl Tool`**: full struct with manual [`Tool::definition()`] and
//!   [`Tool::execute()`]. Best for tools with state.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolSet`], [`FnTool`].
//! - [`parser`]: the three call syntaxes and [`ToolCallParser`].
//! - [`executor`]: bounded-concurrency batch execution with strict or
//!   lenient error handling.
//! - [`format`]: the results block fed back to the model.
//! - [`builtin`]: [`Calculator`] and [`ThinkTool`].

pub mod builtin;
pub mod core;
pub mod executor;
pub mod format;
pub mod parser;

// Re-export commonly used items at the module level.
pub use builtin::{Calculator, ThinkTool};
pub use core::{
    CallError, DEFAULT_MAX_RESULT_BYTES, FnTool, Tool, ToolFuture, ToolSet, run_blocking,
    truncate_result, validate_tool_arguments,
};
pub use executor::{ExecutionPolicy, ToolResult, execute};
pub use format::format_results;
pub use parser::{ToolCall, ToolCallParser, parse, render_envelope};
