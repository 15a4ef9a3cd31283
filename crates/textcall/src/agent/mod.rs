//! Agent runtime: the [`Agent`] loop and its supporting modules.
//!
//! - [`harness::Agent`]: the multi-turn text tool-calling loop. Start here.
//! - [`config::AgentConfig`]: turn budget, deadline and execution policy.
//! - [`events`]: [`EventHandler`] trait and [`AgentEvent`] enum for
//!   observing the loop. Includes [`LoggingHandler`], [`CompositeEventHandler`]
//!   and [`FnEventHandler`].
//! - [`prompt`]: turn prompt rendering with the tool catalogue.

pub mod config;
pub mod events;
pub mod harness;
pub mod prompt;

// Re-export commonly used items at the module level.
pub use config::AgentConfig;
pub use events::{
    AgentEvent, AgentResult, CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler,
    NoopHandler, RunSummary,
};
pub use harness::{Agent, AgentState};
pub use prompt::{PromptBuilder, render_turn_prompt};
