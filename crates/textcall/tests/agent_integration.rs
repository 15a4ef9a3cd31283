//! End-to-end tests for the agent loop.
//!
//! Every test drives a real [`Agent`] (or stage) against a
//! [`ScriptedProvider`], so the detector, parser, executor and formatter all
//! run exactly as they would behind a network model.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use textcall::prelude::*;
use textcall::tools::executor::execute;

/// Sleeps for the number of milliseconds given as its argument and tracks
/// how many invocations overlap.
struct Sleeper {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Sleeper {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        let tool = Self {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        };
        (tool, peak)
    }
}

impl Tool for Sleeper {
    fn definition(&self) -> ToolDef {
        ToolDef::text("sleep", "Sleep for the given milliseconds")
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let millis: u64 = arguments.trim().parse().unwrap_or(1);
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(millis)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("slept {millis}ms"))
        })
    }
}

fn lookup(value: &'static str) -> FnTool {
    FnTool::text("lookup", "Look up the configured value", move |_| Ok(value.to_string()))
}

// ── Conversation flow ────────────────────────────────────────────────

#[tokio::test]
async fn calculator_round_trip() {
    let provider = ScriptedProvider::new(["TOOL:calculator:2+2", "The answer is 4."]);
    let tools = ToolSet::new().with(Calculator).with(ThinkTool);

    let result = Agent::new(&provider, &tools, AgentConfig::default())
        .run("What is 2+2?")
        .await
        .unwrap();

    assert_eq!(result.text, "The answer is 4.");
    assert_eq!(provider.call_count(), 2);
    assert_eq!(result.tool_calls_executed, 1);
    assert!(provider.prompts()[1].contains("Result: 4"));
}

#[tokio::test]
async fn envelope_with_several_calls_runs_them_all() {
    let provider = ScriptedProvider::new([
        r#"{"tool_calls":[{"name":"calculator","arguments":"1+1","id":"a"},{"name":"think","arguments":"{\"reasoning\":\"check\"}","id":"b"}]}"#,
        "done",
    ]);
    let tools = ToolSet::new().with(Calculator).with(ThinkTool);

    let result = Agent::new(&provider, &tools, AgentConfig::default())
        .run("q")
        .await
        .unwrap();

    assert_eq!(result.tool_calls_executed, 2);
    let second = &provider.prompts()[1];
    let first_block = second.find("Tool 1: calculator").unwrap();
    let second_block = second.find("Tool 2: think").unwrap();
    assert!(first_block < second_block);
}

#[tokio::test]
async fn call_syntax_past_the_detection_prefix_streams_through() {
    let reply = format!("{}TOOL:calculator:1+1", "a".repeat(250));
    let provider = ScriptedProvider::new([reply.clone()]);
    let tools = ToolSet::new().with(Calculator);

    let result = Agent::new(&provider, &tools, AgentConfig::default())
        .run("q")
        .await
        .unwrap();

    assert_eq!(result.text, reply);
    assert_eq!(result.tool_calls_executed, 0);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn run_into_streams_to_writer() {
    let provider = ScriptedProvider::new(["TOOL:calculator:10/4", "2.5 it is"]);
    let tools = ToolSet::new().with(Calculator);
    let mut out: Vec<u8> = Vec::new();

    let summary = Agent::new(&provider, &tools, AgentConfig::default())
        .run_into("q", &mut out)
        .await
        .unwrap();

    assert_eq!(out, b"2.5 it is");
    assert_eq!(summary.bytes_written, 9);
    assert_eq!(summary.turns_used, 2);
}

// ── Failure modes ────────────────────────────────────────────────────

#[tokio::test]
async fn model_that_never_stops_calling_exhausts_budget() {
    let provider = ScriptedProvider::repeating("TOOL:calculator:1+1");
    let tools = ToolSet::new().with(Calculator);
    let config = AgentConfig::default().with_max_turns(2);

    let err = Agent::new(&provider, &tools, config)
        .run("q")
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::IterationBudgetExceeded { max_turns: 2 }));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn unknown_tool_is_fatal_in_strict_mode() {
    let provider = ScriptedProvider::new(["TOOL:nonexistent:x", "unreachable"]);
    let tools = ToolSet::new().with(Calculator);

    let err = Agent::new(&provider, &tools, AgentConfig::default())
        .run("q")
        .await
        .unwrap_err();

    assert_eq!(err.tool_name(), Some("nonexistent"));
    assert_eq!(err.turn(), Some(1));
    assert!(err.to_string().contains("not found"));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn unknown_tool_is_reported_back_in_lenient_mode() {
    let provider = ScriptedProvider::new(["TOOL:nonexistent:x", "sorry, no such tool"]);
    let tools = ToolSet::new().with(Calculator);
    let config = AgentConfig::default().with_lenient_errors(true);

    let result = Agent::new(&provider, &tools, config)
        .run("q")
        .await
        .unwrap();

    assert_eq!(result.text, "sorry, no such tool");
    assert!(
        provider.prompts()[1]
            .contains("Tool 1: nonexistent\nArguments: x\nError: Tool 'nonexistent' not found")
    );
}

#[tokio::test]
async fn slow_tool_hits_run_deadline() {
    let (sleeper, _) = Sleeper::new();
    let provider = ScriptedProvider::new(["TOOL:sleep:5000", "too late"]);
    let tools = ToolSet::new().with(sleeper);
    let config = AgentConfig::default().with_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let err = Agent::new(&provider, &tools, config)
        .run("q")
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Timeout { turn: 1, .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn blocking_tool_cannot_outlast_run_deadline() {
    let provider = ScriptedProvider::new(["TOOL:block:x", "finished after deadline"]);
    let tools = ToolSet::new().with(FnTool::text("block", "Blocks the thread", |_| {
        std::thread::sleep(Duration::from_millis(600));
        Ok("done".into())
    }));
    let config = AgentConfig::default().with_timeout(Duration::from_millis(50));

    let started = Instant::now();
    let err = Agent::new(&provider, &tools, config)
        .run("q")
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Timeout { turn: 1, .. }));
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn deep_calculator_input_fails_the_call_not_the_process() {
    let deep = format!("TOOL:calculator:0+{}1{}", "(".repeat(100_000), ")".repeat(100_000));
    let provider = ScriptedProvider::new([deep, "gave up".to_string()]);
    let tools = ToolSet::new().with(Calculator);
    let config = AgentConfig::default().with_lenient_errors(true);

    let result = Agent::new(&provider, &tools, config).run("q").await.unwrap();

    assert_eq!(result.text, "gave up");
    assert!(provider.prompts()[1].contains("Error: Tool execution error: expression nested too deeply"));
}

// ── Isolation and concurrency ────────────────────────────────────────

#[tokio::test]
async fn concurrent_runs_keep_their_own_registries() {
    let provider_a = ScriptedProvider::new(["TOOL:lookup:k", "A done"]);
    let provider_b = ScriptedProvider::new(["TOOL:lookup:k", "B done"]);
    let tools_a = ToolSet::new().with(lookup("alpha"));
    let tools_b = ToolSet::new().with(lookup("beta"));

    let agent_a = Agent::new(&provider_a, &tools_a, AgentConfig::default());
    let agent_b = Agent::new(&provider_b, &tools_b, AgentConfig::default());
    let (a, b) = tokio::join!(agent_a.run("q"), agent_b.run("q"));

    assert_eq!(a.unwrap().text, "A done");
    assert_eq!(b.unwrap().text, "B done");
    assert!(provider_a.prompts()[1].contains("Result: alpha"));
    assert!(provider_b.prompts()[1].contains("Result: beta"));
    assert!(!provider_a.prompts()[1].contains("beta"));
}

#[tokio::test]
async fn capped_batch_keeps_order_and_waits_for_slowest() {
    let (sleeper, peak) = Sleeper::new();
    let tools = ToolSet::new().with(sleeper);
    let calls = ["10", "200", "10", "10", "10"]
        .iter()
        .enumerate()
        .map(|(i, ms)| ToolCall::new(format!("call_{i}"), "sleep", *ms))
        .collect();
    let policy = ExecutionPolicy::default().with_max_concurrent(2);

    let started = Instant::now();
    let results = execute(calls, &tools, &policy).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(peak.load(Ordering::SeqCst) <= 2);
    let ids: Vec<_> = results.iter().map(|r| r.call.id.as_str()).collect();
    assert_eq!(ids, ["call_0", "call_1", "call_2", "call_3", "call_4"]);
    assert_eq!(results[1].output, "slept 200ms");
}

#[tokio::test]
async fn blocking_tools_in_one_batch_overlap() {
    let tools = ToolSet::new().with(FnTool::text("block", "Blocks the thread", |_| {
        std::thread::sleep(Duration::from_millis(300));
        Ok("done".into())
    }));
    let calls = (0..3)
        .map(|i| ToolCall::new(format!("call_{i}"), "block", "x"))
        .collect();

    let started = Instant::now();
    let results = execute(calls, &tools, &ExecutionPolicy::default()).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.output == "done"));
    assert!(started.elapsed() < Duration::from_millis(850));
}

// ── Config and stages ────────────────────────────────────────────────

#[tokio::test]
async fn config_file_drives_the_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"max_turns": 3, "pass_through_on_error": true, "include_original_text": true}}"#
    )
    .unwrap();
    let config = AgentConfig::from_json_file(file.path()).unwrap();

    let provider = ScriptedProvider::new(["TOOL:missing:1", "ok"]);
    let tools = ToolSet::new().with(Calculator);
    let result = Agent::new(&provider, &tools, config).run("q").await.unwrap();

    assert_eq!(result.text, "ok");
    let second = &provider.prompts()[1];
    assert!(second.starts_with("Original LLM Output:\nTOOL:missing:1\n\nTool execution results:"));
    assert!(second.contains("Error: Tool 'missing' not found"));
}

#[tokio::test]
async fn agent_stage_uses_the_context_registry() {
    let provider = ScriptedProvider::new(["TOOL:lookup:k", "finished"]);
    let own_tools = ToolSet::new().with(lookup("own"));
    let ctx_tools = ToolSet::new().with(lookup("from context"));
    let agent = Agent::new(&provider, &own_tools, AgentConfig::default());
    let ctx = RunContext::new(&ctx_tools);

    let mut input: &[u8] = b"the question\n";
    let mut output: Vec<u8> = Vec::new();
    agent.process(&ctx, &mut input, &mut output).await.unwrap();

    assert_eq!(output, b"finished");
    let prompts = provider.prompts();
    assert!(prompts[0].starts_with("the question\n\nAvailable tools:"));
    assert!(prompts[1].contains("Result: from context"));
}

#[tokio::test]
async fn tool_stage_pipeline_executes_buffered_calls() {
    let tools = ToolSet::new().with(Calculator);
    let pipeline = Pipeline::new().with(ToolStage::new());
    let ctx = RunContext::new(&tools);

    let mut input: &[u8] = b"<tool name=\"calculator\">3*3</tool>";
    let mut output: Vec<u8> = Vec::new();
    pipeline.process(&ctx, &mut input, &mut output).await.unwrap();

    assert_eq!(
        String::from_utf8(output).unwrap(),
        "Tool execution results:\n\nTool 1: calculator\nArguments: 3*3\nResult: 9\n"
    );
}
