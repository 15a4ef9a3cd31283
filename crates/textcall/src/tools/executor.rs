//! Bounded-concurrency execution of a batch of parsed calls.
//!
//! Every call in a batch runs as its own future on the caller's task. A
//! [`tokio::sync::Semaphore`] caps how many of them are inside a tool at
//! once, and the batch is awaited as a whole: results come back in call order
//! no matter which call finished first.
//!
//! What a failing call does to the batch depends on
//! [`ExecutionPolicy::pass_through_on_error`]:
//!
//! - **Strict** (`false`, the default): the first failure resolves the batch
//!   to a [`ToolFailure`]. Calls still in flight are dropped and no partial
//!   results are returned.
//! - **Lenient** (`true`): failures are recorded in their [`ToolResult`] and
//!   the batch completes normally.

use crate::DEFAULT_DETECTION_BUFFER_BYTES;
use crate::error::{ConfigError, ToolFailure};
use crate::tools::core::ToolSet;
use crate::tools::parser::ToolCall;
use futures::future::{join_all, try_join_all};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

// ── Policy ─────────────────────────────────────────────────────────

/// How a batch of calls is executed and reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Report failures as results instead of failing the batch.
    pub pass_through_on_error: bool,
    /// Maximum calls in flight. 0 means unbounded.
    pub max_concurrent: usize,
    /// Prepend the model's own text to the formatted results.
    pub include_original_text: bool,
    /// How many leading response bytes the detector inspects.
    pub detection_buffer_bytes: usize,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            pass_through_on_error: false,
            max_concurrent: 0,
            include_original_text: false,
            detection_buffer_bytes: DEFAULT_DETECTION_BUFFER_BYTES,
        }
    }
}

impl ExecutionPolicy {
    pub fn with_pass_through_on_error(mut self, enabled: bool) -> Self {
        self.pass_through_on_error = enabled;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_include_original_text(mut self, enabled: bool) -> Self {
        self.include_original_text = enabled;
        self
    }

    pub fn with_detection_buffer_bytes(mut self, bytes: usize) -> Self {
        self.detection_buffer_bytes = bytes;
        self
    }

    /// Reject settings the detector cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection_buffer_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "detection_buffer_bytes",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

// ── Results ────────────────────────────────────────────────────────

/// Outcome of one call. Exactly one of `output` / `error` is meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub call: ToolCall,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(call: ToolCall, output: String) -> Self {
        Self {
            call,
            output,
            error: None,
        }
    }

    pub fn failure(call: ToolCall, error: String) -> Self {
        Self {
            call,
            output: String::new(),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    fn into_failure(self) -> ToolFailure {
        ToolFailure {
            tool: self.call.name,
            call_id: self.call.id,
            message: self.error.unwrap_or_default(),
        }
    }
}

// ── Execution ──────────────────────────────────────────────────────

/// Run `calls` against `tools` under `policy`.
///
/// On success the returned vector has one entry per call, index-aligned with
/// `calls`. In strict mode the first failing call is returned as the error
/// instead.
pub async fn execute(
    calls: Vec<ToolCall>,
    tools: &ToolSet,
    policy: &ExecutionPolicy,
) -> Result<Vec<ToolResult>, ToolFailure> {
    if calls.is_empty() {
        return Ok(Vec::new());
    }

    let total = calls.len();
    // A cap at or above the batch size never blocks anyone.
    let semaphore = (policy.max_concurrent > 0 && policy.max_concurrent < total)
        .then(|| Semaphore::new(policy.max_concurrent));

    info!(
        "Executing {total} tool call(s) (max concurrent: {}, {})",
        if semaphore.is_some() {
            policy.max_concurrent.to_string()
        } else {
            "unbounded".to_string()
        },
        if policy.pass_through_on_error { "lenient" } else { "strict" },
    );

    let pending = calls
        .into_iter()
        .map(|call| run_one(call, tools, semaphore.as_ref()));

    if policy.pass_through_on_error {
        let results = join_all(pending).await;
        let failed = results.iter().filter(|r| r.is_error()).count();
        debug!("Batch complete: {} ok, {failed} failed", total - failed);
        return Ok(results);
    }

    try_join_all(pending.map(|fut| async move {
        let result = fut.await;
        if result.is_error() {
            Err(result.into_failure())
        } else {
            Ok(result)
        }
    }))
    .await
    .inspect_err(|failure| warn!("Strict mode: aborting batch on {failure}"))
}

async fn run_one(call: ToolCall, tools: &ToolSet, semaphore: Option<&Semaphore>) -> ToolResult {
    // The semaphore is never closed, so acquire only fails if that changes.
    let _permit = match semaphore {
        Some(s) => s.acquire().await.ok(),
        None => None,
    };

    match tools.call(&call.name, &call.arguments).await {
        Ok(output) => ToolResult::success(call, output),
        Err(e) => ToolResult::failure(call, e.to_string()),
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolDef;
    use crate::tools::core::{FnTool, Tool, ToolFuture};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn calc_tools() -> ToolSet {
        ToolSet::new()
            .with(FnTool::text("echo", "Echo", |s| Ok(s.to_string())))
            .with(FnTool::text("boom", "Fails", |_| Err("kaboom".into())))
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let results = execute(vec![], &calc_tools(), &ExecutionPolicy::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn results_align_with_calls() {
        let calls = vec![
            ToolCall::new("call_0", "echo", "a"),
            ToolCall::new("call_1", "echo", "b"),
        ];
        let results = execute(calls.clone(), &calc_tools(), &ExecutionPolicy::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].call, calls[0]);
        assert_eq!(results[0].output, "a");
        assert_eq!(results[1].output, "b");
    }

    #[tokio::test]
    async fn strict_mode_fails_batch() {
        let calls = vec![
            ToolCall::new("call_0", "echo", "a"),
            ToolCall::new("call_1", "boom", ""),
        ];
        let failure = execute(calls, &calc_tools(), &ExecutionPolicy::default())
            .await
            .unwrap_err();
        assert_eq!(failure.tool, "boom");
        assert_eq!(failure.call_id, "call_1");
        assert_eq!(failure.message, "Tool execution error: kaboom");
    }

    #[tokio::test]
    async fn lenient_mode_keeps_errors_in_results() {
        let calls = vec![
            ToolCall::new("call_0", "boom", ""),
            ToolCall::new("call_1", "missing", ""),
            ToolCall::new("call_2", "echo", "fine"),
        ];
        let policy = ExecutionPolicy::default().with_pass_through_on_error(true);
        let results = execute(calls, &calc_tools(), &policy).await.unwrap();
        assert_eq!(results[0].error.as_deref(), Some("Tool execution error: kaboom"));
        assert_eq!(results[1].error.as_deref(), Some("Tool 'missing' not found"));
        assert!(!results[2].is_error());
        assert_eq!(results[2].output, "fine");
    }

    struct Tracked {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Tool for Tracked {
        fn definition(&self) -> ToolDef {
            ToolDef::text("tracked", "Sleeps for the given milliseconds")
        }

        fn execute(&self, arguments: &str) -> ToolFuture<'_> {
            let millis: u64 = arguments.parse().unwrap_or(1);
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(millis)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(format!("slept {millis}"))
            })
        }
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let peak = Arc::new(AtomicUsize::new(0));
        let tools = ToolSet::new().with(Tracked {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        });
        let calls = (0..6)
            .map(|i| ToolCall::new(format!("call_{i}"), "tracked", "10"))
            .collect();
        let policy = ExecutionPolicy::default().with_max_concurrent(2);
        let results = execute(calls, &tools, &policy).await.unwrap();
        assert_eq!(results.len(), 6);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unbounded_runs_everything_at_once() {
        let peak = Arc::new(AtomicUsize::new(0));
        let tools = ToolSet::new().with(Tracked {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        });
        let calls = (0..4)
            .map(|i| ToolCall::new(format!("call_{i}"), "tracked", "20"))
            .collect();
        execute(calls, &tools, &ExecutionPolicy::default()).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn zero_detection_buffer_is_invalid() {
        let policy = ExecutionPolicy::default().with_detection_buffer_bytes(0);
        assert!(policy.validate().is_err());
        assert!(ExecutionPolicy::default().validate().is_ok());
    }
}
