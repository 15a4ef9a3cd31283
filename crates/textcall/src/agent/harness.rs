//! The agent loop: a multi-turn text tool-calling conversation on top of any
//! [`ModelProvider`].
//!
//! Each turn renders a prompt (turn input plus tool catalogue), calls the
//! provider once, and routes the answer through the streaming detector. Plain
//! answers resolve the run and stream straight to the caller's writer.
//! Answers carrying tool calls are parsed, executed under the configured
//! [`ExecutionPolicy`], and the formatted results become the next turn's
//! input.
//!
//! ```text
//! Start → PromptBuilt → ModelResponded ─┬─ no calls ─→ Resolved → Done
//!           ↑                           └─ calls ───→ ToolsPending
//!           └──────────── ResultsReady ←──────────────────┘
//! ```
//!
//! A run fails, never returning a partial answer, when the model still asks
//! for tools on the last allowed turn, when the deadline elapses, when the
//! provider or the stream fails, or when a tool fails in strict mode.

use super::config::AgentConfig;
use super::events::{AgentEvent, AgentResult, EventHandler, NoopHandler, RunSummary};
use super::prompt::render_turn_prompt;
use crate::api::streaming::{Route, detect};
use crate::api::tracing::{generate_span_id, generate_trace_id};
use crate::api::{ModelProvider, ModelStream};
use crate::error::AgentError;
use crate::tools::core::ToolSet;
use crate::tools::executor::{ExecutionPolicy, execute};
use crate::tools::format::format_results;
use crate::tools::parser::ToolCallParser;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

// ── States ─────────────────────────────────────────────────────────

/// Where a run is in its lifecycle. Transitions are logged at DEBUG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Start,
    PromptBuilt,
    ModelResponded,
    ToolsPending,
    ResultsReady,
    Resolved,
    Failed,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentState::Start => "start",
            AgentState::PromptBuilt => "prompt-built",
            AgentState::ModelResponded => "model-responded",
            AgentState::ToolsPending => "tools-pending",
            AgentState::ResultsReady => "results-ready",
            AgentState::Resolved => "resolved",
            AgentState::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ── Agent ──────────────────────────────────────────────────────────

/// The multi-turn tool-calling loop.
///
/// ```ignore
/// let provider = ScriptedProvider::new(["TOOL:calculator:2+2", "The answer is 4."]);
/// let tools = ToolSet::new().with(Calculator);
///
/// let result = Agent::new(&provider, &tools, AgentConfig::default())
///     .run("What is 2+2?")
///     .await?;
/// assert_eq!(result.text, "The answer is 4.");
/// ```
///
/// # Lifetimes
///
/// `Agent<'a>` borrows the provider, tools, and event handler. Bind them to
/// `let` bindings before building the agent so they outlive `.run()`.
pub struct Agent<'a> {
    provider: &'a dyn ModelProvider,
    tools: &'a ToolSet,
    config: AgentConfig,
    event_handler: &'a dyn EventHandler,
    parser: ToolCallParser,
}

impl<'a> Agent<'a> {
    /// Create an agent with the default parser and no event handler.
    pub fn new(provider: &'a dyn ModelProvider, tools: &'a ToolSet, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
            event_handler: &NoopHandler,
            parser: ToolCallParser::default(),
        }
    }

    /// Attach an event handler.
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Replace the call-syntax parser, e.g. one with extra strategies.
    pub fn with_parser(mut self, parser: ToolCallParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run to completion and return the final answer as a string.
    pub async fn run(&self, question: &str) -> Result<AgentResult, AgentError> {
        let mut out: Vec<u8> = Vec::new();
        let summary = self.run_into(question, &mut out).await?;
        Ok(AgentResult {
            trace_id: summary.trace_id,
            text: String::from_utf8_lossy(&out).into_owned(),
            turns_used: summary.turns_used,
            tool_calls_executed: summary.tool_calls_executed,
        })
    }

    /// Run to completion, streaming the final answer into `writer`.
    ///
    /// Only the final turn's answer is ever written. If the deadline elapses
    /// while a passthrough answer is streaming, the bytes forwarded so far
    /// stay in `writer` and the run still fails with
    /// [`AgentError::Timeout`].
    pub async fn run_into<W>(&self, question: &str, writer: &mut W) -> Result<RunSummary, AgentError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        self.drive(self.tools, &self.config.policy, question, writer).await
    }

    /// The loop against an explicit registry and policy, under the deadline.
    pub(crate) async fn drive<W>(
        &self,
        tools: &ToolSet,
        policy: &ExecutionPolicy,
        question: &str,
        writer: &mut W,
    ) -> Result<RunSummary, AgentError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        self.config.validate()?;
        policy.validate()?;

        let trace_id = generate_trace_id();
        info!(
            "Agent run started: trace_id={trace_id}, max_turns={}, tools={:?}",
            self.config.max_turns,
            tools.names()
        );

        // The turn in progress, so a timeout can name it.
        let current_turn = AtomicU32::new(1);
        let turns = self.turn_loop(tools, policy, question, writer, &trace_id, &current_turn);

        let outcome = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, turns).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let turn = current_turn.load(Ordering::SeqCst);
                    self.transition(&trace_id, AgentState::Failed);
                    self.event_handler
                        .on_event(&AgentEvent::TimedOut { turn, limit });
                    Err(AgentError::Timeout { turn, limit })
                }
            },
            None => turns.await,
        };

        match &outcome {
            Ok(summary) => info!(
                "Agent run finished: trace_id={trace_id}, turns={}, tool_calls={}",
                summary.turns_used, summary.tool_calls_executed
            ),
            Err(e) => warn!("Agent run failed: trace_id={trace_id}: {e}"),
        }
        outcome
    }

    async fn turn_loop<W>(
        &self,
        tools: &ToolSet,
        policy: &ExecutionPolicy,
        question: &str,
        writer: &mut W,
        trace_id: &str,
        current_turn: &AtomicU32,
    ) -> Result<RunSummary, AgentError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let max_turns = self.config.max_turns;
        let mut input = question.to_string();
        let mut tool_calls_executed = 0;
        self.transition(trace_id, AgentState::Start);

        for turn in 1..=max_turns {
            current_turn.store(turn, Ordering::SeqCst);
            debug!("span_id={}", generate_span_id(trace_id, turn));
            self.event_handler
                .on_event(&AgentEvent::TurnStart { turn, max_turns });

            let prompt = render_turn_prompt(&input, tools);
            self.transition(trace_id, AgentState::PromptBuilt);
            self.event_handler.on_event(&AgentEvent::PromptBuilt {
                turn,
                prompt: &prompt,
            });

            let stream = self.call_model(turn, &prompt, tools).await?;
            let route = detect(stream, policy.detection_buffer_bytes)
                .await
                .map_err(AgentError::io(turn))?;
            self.transition(trace_id, AgentState::ModelResponded);
            self.event_handler.on_event(&AgentEvent::ModelResponded {
                turn,
                route: route.kind(),
            });

            let raw = match route {
                Route::Buffered(raw) => raw,
                passthrough @ Route::Passthrough { .. } => {
                    let bytes = passthrough
                        .forward(writer)
                        .await
                        .map_err(AgentError::io(turn))?;
                    return Ok(self.resolve(trace_id, turn, bytes, tool_calls_executed));
                }
            };

            let text = String::from_utf8_lossy(&raw);
            let calls = self.parser.parse(&text);
            if calls.is_empty() {
                writer.write_all(&raw).await.map_err(AgentError::io(turn))?;
                writer.flush().await.map_err(AgentError::io(turn))?;
                return Ok(self.resolve(
                    trace_id,
                    turn,
                    raw.len() as u64,
                    tool_calls_executed,
                ));
            }

            self.transition(trace_id, AgentState::ToolsPending);
            self.event_handler.on_event(&AgentEvent::ToolCallsParsed {
                turn,
                calls: &calls,
            });

            if turn == max_turns {
                break;
            }

            for call in &calls {
                self.event_handler
                    .on_event(&AgentEvent::ToolExecuting { turn, call });
            }
            let results = execute(calls, tools, policy).await.map_err(|failure| {
                self.transition(trace_id, AgentState::Failed);
                self.event_handler.on_event(&AgentEvent::ToolFailed {
                    turn,
                    failure: &failure,
                });
                AgentError::Tool {
                    turn,
                    source: failure,
                }
            })?;
            for result in &results {
                self.event_handler
                    .on_event(&AgentEvent::ToolResult { turn, result });
            }
            tool_calls_executed += results.len();

            input = format_results(
                &results,
                policy.include_original_text.then_some(&*text),
            );
            self.transition(trace_id, AgentState::ResultsReady);
        }

        self.transition(trace_id, AgentState::Failed);
        self.event_handler
            .on_event(&AgentEvent::BudgetExceeded { max_turns });
        Err(AgentError::IterationBudgetExceeded { max_turns })
    }

    async fn call_model(
        &self,
        turn: u32,
        prompt: &str,
        tools: &ToolSet,
    ) -> Result<ModelStream, AgentError> {
        let answer = if self.provider.supports_native_tools() {
            let definitions = tools.definitions();
            self.provider.chat_with_tools(prompt, &definitions).await
        } else {
            self.provider.chat(prompt).await
        };
        answer.map_err(|message| AgentError::Model { turn, message })
    }

    fn resolve(
        &self,
        trace_id: &str,
        turn: u32,
        bytes: u64,
        tool_calls_executed: usize,
    ) -> RunSummary {
        self.transition(trace_id, AgentState::Resolved);
        self.event_handler
            .on_event(&AgentEvent::Resolved { turn, bytes });
        RunSummary {
            trace_id: trace_id.to_string(),
            turns_used: turn,
            tool_calls_executed,
            bytes_written: bytes,
        }
    }

    fn transition(&self, trace_id: &str, state: AgentState) {
        debug!("{trace_id}: -> {state}");
    }
}
