//! Byte-stream stages and their per-invocation context.
//!
//! A [`Stage`] reads one input stream and writes one output stream. The tool
//! registry and execution policy travel in the [`RunContext`] handed to each
//! invocation, so two runs with different registries never share tool state
//! and there is no global registry.
//!
//! - [`ToolStage`]: one detector → parser → executor → formatter pass over a
//!   model answer. Plain answers pass through untouched; answers with calls
//!   are replaced by the formatted results.
//! - [`Agent`]: question in, final answer out.
//! - [`Pipeline`]: stages run one after another, each stage's output
//!   buffered and fed to the next.

use crate::agent::harness::Agent;
use crate::api::streaming::{Route, detect};
use crate::error::AgentError;
use crate::tools::core::ToolSet;
use crate::tools::executor::{ExecutionPolicy, execute};
use crate::tools::format::format_results;
use crate::tools::parser::ToolCallParser;
use std::future::Future;
use std::io::Cursor;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

// ── Context ────────────────────────────────────────────────────────

/// Everything one stage invocation needs besides its streams.
#[derive(Debug, Clone)]
pub struct RunContext<'a> {
    /// The registry for this invocation only.
    pub tools: &'a ToolSet,
    pub policy: ExecutionPolicy,
    /// Turn number reported in errors raised by the stage.
    pub turn: u32,
}

impl<'a> RunContext<'a> {
    pub fn new(tools: &'a ToolSet) -> Self {
        Self {
            tools,
            policy: ExecutionPolicy::default(),
            turn: 1,
        }
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_turn(mut self, turn: u32) -> Self {
        self.turn = turn;
        self
    }
}

// ── Stage ──────────────────────────────────────────────────────────

/// Boxed future returned by [`Stage::process`].
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AgentError>> + Send + 'a>>;

/// A handler from one byte stream to another.
///
/// Uses a boxed future so that the trait is dyn-compatible and stages can be
/// composed in a [`Pipeline`].
pub trait Stage: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn process<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        input: &'a mut (dyn AsyncRead + Unpin + Send),
        output: &'a mut (dyn AsyncWrite + Unpin + Send),
    ) -> StageFuture<'a>;
}

// ── ToolStage ──────────────────────────────────────────────────────

/// A single tool-calling pass over one model answer.
#[derive(Debug, Clone, Default)]
pub struct ToolStage {
    parser: ToolCallParser,
}

impl ToolStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parser(mut self, parser: ToolCallParser) -> Self {
        self.parser = parser;
        self
    }

    async fn run<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        input: &'a mut (dyn AsyncRead + Unpin + Send),
        output: &'a mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<(), AgentError> {
        let io_err = || AgentError::io(ctx.turn);

        let route = detect(input, ctx.policy.detection_buffer_bytes)
            .await
            .map_err(io_err())?;
        let raw = match route {
            Route::Buffered(raw) => raw,
            passthrough @ Route::Passthrough { .. } => {
                passthrough.forward(output).await.map_err(io_err())?;
                return Ok(());
            }
        };

        let calls = self.parser.parse(&String::from_utf8_lossy(&raw));
        debug!("Tool stage: {} call(s) parsed", calls.len());
        let rendered = if calls.is_empty() {
            raw
        } else {
            let text = String::from_utf8_lossy(&raw);
            let results = execute(calls, ctx.tools, &ctx.policy)
                .await
                .map_err(|source| AgentError::Tool {
                    turn: ctx.turn,
                    source,
                })?;
            format_results(
                &results,
                ctx.policy.include_original_text.then_some(&*text),
            )
            .into_bytes()
        };

        output
            .write_all(&rendered)
            .await
            .map_err(io_err())?;
        output.flush().await.map_err(io_err())
    }
}

impl Stage for ToolStage {
    fn name(&self) -> &str {
        "tools"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        input: &'a mut (dyn AsyncRead + Unpin + Send),
        output: &'a mut (dyn AsyncWrite + Unpin + Send),
    ) -> StageFuture<'a> {
        Box::pin(self.run(ctx, input, output))
    }
}

// ── Agent as a stage ───────────────────────────────────────────────

/// Reads the whole input as the question and streams the final answer out.
/// The registry and policy come from the context, not the agent's own.
impl Stage for Agent<'_> {
    fn name(&self) -> &str {
        "agent"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        input: &'a mut (dyn AsyncRead + Unpin + Send),
        output: &'a mut (dyn AsyncWrite + Unpin + Send),
    ) -> StageFuture<'a> {
        Box::pin(async move {
            let mut question = String::new();
            input
                .read_to_string(&mut question)
                .await
                .map_err(AgentError::io(ctx.turn))?;
            self.drive(ctx.tools, &ctx.policy, question.trim_end(), output)
                .await
                .map(|_| ())
        })
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

/// Stages run in order. The first stage reads the pipeline input, the last
/// writes the pipeline output, and every intermediate output is buffered in
/// full before the next stage starts.
///
/// ```ignore
/// let pipeline = Pipeline::new().with(agent).with(ToolStage::new());
/// let ctx = RunContext::new(&tools);
/// pipeline.process(&ctx, &mut input, &mut output).await?;
/// ```
#[derive(Default)]
pub struct Pipeline<'s> {
    stages: Vec<Box<dyn Stage + 's>>,
}

impl<'s> Pipeline<'s> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage.
    pub fn with(mut self, stage: impl Stage + 's) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Stage for Pipeline<'_> {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        input: &'a mut (dyn AsyncRead + Unpin + Send),
        output: &'a mut (dyn AsyncWrite + Unpin + Send),
    ) -> StageFuture<'a> {
        Box::pin(async move {
            let Some((last, init)) = self.stages.split_last() else {
                tokio::io::copy(input, output)
                    .await
                    .map_err(AgentError::io(ctx.turn))?;
                return Ok(());
            };

            let mut carried: Option<Vec<u8>> = None;
            for stage in init {
                debug!("Pipeline: running stage '{}'", stage.name());
                let mut buffer = Vec::new();
                match carried.take() {
                    None => stage.process(ctx, input, &mut buffer).await?,
                    Some(previous) => {
                        let mut reader = Cursor::new(previous);
                        stage.process(ctx, &mut reader, &mut buffer).await?
                    }
                }
                carried = Some(buffer);
            }

            debug!("Pipeline: running stage '{}'", last.name());
            match carried {
                None => last.process(ctx, input, output).await,
                Some(previous) => {
                    let mut reader = Cursor::new(previous);
                    last.process(ctx, &mut reader, output).await
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::core::FnTool;

    fn tools() -> ToolSet {
        ToolSet::new().with(FnTool::text("upper", "Uppercase", |s| Ok(s.to_uppercase())))
    }

    async fn run_stage(stage: &dyn Stage, ctx: &RunContext<'_>, input: &str) -> Result<String, AgentError> {
        let mut reader = input.as_bytes();
        let mut out: Vec<u8> = Vec::new();
        stage.process(ctx, &mut reader, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn tool_stage_passes_plain_text_through() {
        let tools = tools();
        let ctx = RunContext::new(&tools);
        let out = run_stage(&ToolStage::new(), &ctx, "nothing to do here").await.unwrap();
        assert_eq!(out, "nothing to do here");
    }

    #[tokio::test]
    async fn tool_stage_replaces_calls_with_results() {
        let tools = tools();
        let ctx = RunContext::new(&tools);
        let out = run_stage(&ToolStage::new(), &ctx, "TOOL:upper:abc").await.unwrap();
        assert_eq!(
            out,
            "Tool execution results:\n\nTool 1: upper\nArguments: abc\nResult: ABC\n"
        );
    }

    #[tokio::test]
    async fn tool_stage_returns_unparsable_answer_byte_for_byte() {
        let tools = tools();
        let ctx = RunContext::new(&tools);
        let input = b"<tool name=\"upper\">\xffno close tag".to_vec();
        let mut reader = &input[..];
        let mut out: Vec<u8> = Vec::new();
        ToolStage::new().process(&ctx, &mut reader, &mut out).await.unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn tool_stage_strict_failure_names_tool() {
        let tools = tools();
        let ctx = RunContext::new(&tools).with_turn(3);
        let err = run_stage(&ToolStage::new(), &ctx, "TOOL:missing:x").await.unwrap_err();
        assert_eq!(err.turn(), Some(3));
        assert_eq!(err.tool_name(), Some("missing"));
    }

    #[tokio::test]
    async fn empty_pipeline_copies_input() {
        let tools = tools();
        let ctx = RunContext::new(&tools);
        let out = run_stage(&Pipeline::new(), &ctx, "as is").await.unwrap();
        assert_eq!(out, "as is");
    }

    #[tokio::test]
    async fn pipeline_feeds_each_stage_the_previous_output() {
        let tools = tools();
        let ctx = RunContext::new(&tools);
        let pipeline = Pipeline::new().with(ToolStage::new()).with(ToolStage::new());
        assert_eq!(pipeline.len(), 2);
        // The second pass sees formatted results, which contain no call syntax.
        let out = run_stage(&pipeline, &ctx, "TOOL:upper:abc").await.unwrap();
        assert!(out.ends_with("Result: ABC\n"));
    }
}
