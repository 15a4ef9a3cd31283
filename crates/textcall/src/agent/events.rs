//! Events, handlers, and run results for the [`Agent`](super::harness::Agent).
//!
//! The agent reports every state transition of a run as an [`AgentEvent`].
//! Callers implement [`EventHandler`] to observe them for logging, metrics,
//! test assertions, or any other side effects. Handlers observe only; they
//! cannot steer the run.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//! | Custom `impl EventHandler` | Full control |

use crate::error::ToolFailure;
use crate::tools::executor::ToolResult;
use crate::tools::parser::ToolCall;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the agent during a run, in order.
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// A new turn is starting.
    TurnStart { turn: u32, max_turns: u32 },
    /// The prompt for this turn is ready to send.
    PromptBuilt { turn: u32, prompt: &'a str },
    /// The model answered and the detector picked a route
    /// (`"passthrough"` or `"buffered"`).
    ModelResponded { turn: u32, route: &'static str },
    /// The buffered answer contained these calls.
    ToolCallsParsed { turn: u32, calls: &'a [ToolCall] },
    /// A call is about to be executed.
    ToolExecuting { turn: u32, call: &'a ToolCall },
    /// A call finished (successfully or with a reported error).
    ToolResult { turn: u32, result: &'a ToolResult },
    /// A call failed in strict mode and the run is aborting.
    ToolFailed { turn: u32, failure: &'a ToolFailure },
    /// The model answered without tool calls; `bytes` were written out.
    Resolved { turn: u32, bytes: u64 },
    /// The model still wanted tools on the last allowed turn.
    BudgetExceeded { max_turns: u32 },
    /// The run deadline elapsed during `turn`.
    TimedOut { turn: u32, limit: Duration },
}

impl AgentEvent<'_> {
    /// The turn this event belongs to.
    pub fn turn(&self) -> u32 {
        match self {
            AgentEvent::TurnStart { turn, .. }
            | AgentEvent::PromptBuilt { turn, .. }
            | AgentEvent::ModelResponded { turn, .. }
            | AgentEvent::ToolCallsParsed { turn, .. }
            | AgentEvent::ToolExecuting { turn, .. }
            | AgentEvent::ToolResult { turn, .. }
            | AgentEvent::ToolFailed { turn, .. }
            | AgentEvent::Resolved { turn, .. }
            | AgentEvent::TimedOut { turn, .. } => *turn,
            AgentEvent::BudgetExceeded { max_turns } => *max_turns,
        }
    }
}

/// Handler for agent events.
///
/// # Example
///
/// ```ignore
/// struct CountingHandler(AtomicUsize);
///
/// impl EventHandler for CountingHandler {
///     fn on_event(&self, event: &AgentEvent<'_>) {
///         if let AgentEvent::ToolResult { .. } = event {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for each event during the run. The default does nothing.
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let AgentEvent::ModelResponded { route, .. } = event {
///         println!("route: {route}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers, in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(collect, recorder);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    /// Add a handler from an `Option`. `None` is a no-op.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

// ── Logging handler ────────────────────────────────────────────────

/// An event handler that maps events onto `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::TurnStart { turn, max_turns } => {
                info!("[turn {turn}/{max_turns}]");
            }
            AgentEvent::PromptBuilt { turn, prompt } => {
                let preview: String = prompt.chars().take(200).collect();
                trace!(
                    "Turn {turn} prompt: {preview}{}",
                    if prompt.len() > 200 { "..." } else { "" }
                );
            }
            AgentEvent::ModelResponded { turn, route } => {
                debug!("Turn {turn} model answer routed: {route}");
            }
            AgentEvent::ToolCallsParsed { turn, calls } => {
                debug!("{} tool call(s) in turn {turn}", calls.len());
            }
            AgentEvent::ToolExecuting { call, .. } => {
                debug!("Executing tool: {} ({})", call.name, call.id);
            }
            AgentEvent::ToolResult { result, .. } => match &result.error {
                Some(error) => debug!("Tool {} error: {error}", result.call.name),
                None => debug!(
                    "Tool {} result: {} bytes",
                    result.call.name,
                    result.output.len()
                ),
            },
            AgentEvent::ToolFailed { turn, failure } => {
                warn!("Turn {turn}: {failure}");
            }
            AgentEvent::Resolved { turn, bytes } => {
                info!("Agent resolved on turn {turn} ({bytes} bytes)");
            }
            AgentEvent::BudgetExceeded { max_turns } => {
                warn!("Iteration budget exceeded ({max_turns} turn(s))");
            }
            AgentEvent::TimedOut { turn, limit } => {
                warn!("Run timed out during turn {turn} (limit {limit:?})");
            }
        }
    }
}

// ── Run result ─────────────────────────────────────────────────────

/// The result of a successful [`Agent::run()`](super::harness::Agent::run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResult {
    /// Unique trace ID for this run.
    pub trace_id: String,
    /// The model's final answer.
    pub text: String,
    /// Turns used, including the resolving one. Each turn is one model call.
    pub turns_used: u32,
    /// Tool calls executed across all turns.
    pub tool_calls_executed: usize,
}

/// Summary of a run written to a caller-supplied writer by
/// [`Agent::run_into()`](super::harness::Agent::run_into).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub trace_id: String,
    pub turns_used: u32,
    pub tool_calls_executed: usize,
    /// Bytes of final answer written.
    pub bytes_written: u64,
}
