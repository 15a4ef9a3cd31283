//! Tool abstraction and the per-invocation tool registry.
//!
//! The [`Tool`] trait defines the interface every tool implements: a static
//! definition (name, description, parameter schema) and an async `execute`
//! method. Tools are collected into a [`ToolSet`], the registry one agent
//! invocation resolves calls against. A built `ToolSet` is read-only; to add
//! or override tools for a narrower scope, [`ToolSet::layered`] creates a new
//! set that shadows the old one without touching it.

use crate::ToolDef;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Boxed future returned by [`Tool::execute`].
///
/// `Ok` carries the tool output, `Err` the failure cause in plain words.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A capability the model can invoke by name.
///
/// Implementors provide a definition ([`Tool::definition`]) whose name and
/// description are rendered into the prompt, and an async [`Tool::execute`]
/// that receives the raw argument text exactly as the model wrote it.
///
/// # Example
///
/// ```ignore
/// struct Lookup { table: HashMap<String, String> }
///
/// impl Tool for Lookup {
///     fn definition(&self) -> ToolDef {
///         ToolDef::text("lookup", "Look up a key in the table")
///     }
///
///     fn execute(&self, arguments: &str) -> ToolFuture<'_> {
///         let key = arguments.trim().to_string();
///         Box::pin(async move {
///             self.table.get(&key).cloned().ok_or_else(|| format!("no entry for {key}"))
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The definition shown to the model.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the raw argument text.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible. The future is
    /// polled on the caller's task and must not block; hand synchronous work
    /// to [`run_blocking`].
    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    /// The tool's name (delegates to the definition).
    fn name(&self) -> String {
        self.definition().function.name
    }
}

/// Run synchronous tool work on tokio's blocking pool.
///
/// Tools whose work does not yield (CPU-bound or blocking I/O) should go
/// through this instead of doing the work inside [`Tool::execute`]'s future,
/// which is polled on the caller's task. Dropping the returned future does
/// not stop the work; the thread finishes it and the result is discarded.
pub fn run_blocking<F>(work: F) -> ToolFuture<'static>
where
    F: FnOnce() -> Result<String, String> + Send + 'static,
{
    Box::pin(async move {
        tokio::task::spawn_blocking(work)
            .await
            .unwrap_or_else(|e| Err(format!("task failed: {e}")))
    })
}

// ── Call errors ────────────────────────────────────────────────────

/// Why a single call produced no output. The `Display` text is the exact
/// per-call error the formatter shows the model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("Tool '{0}' not found")]
    NotFound(String),
    #[error("Tool execution error: {0}")]
    Failed(String),
}

// ── ToolSet ────────────────────────────────────────────────────────

/// The tool registry for one execution scope.
///
/// Built once with the `with*` builder methods, then only read. Tools are
/// held as `Arc<dyn Tool>`, so layering scopes shares tool handles instead of
/// copying tools.
///
/// # Example
///
/// ```ignore
/// let base = ToolSet::new()
///     .with_default_timeout(Some(Duration::from_secs(30)))
///     .with(Calculator)
///     .with(ThinkTool);
///
/// // A narrower scope that overrides `calculator` and leaves `base` intact.
/// let scoped = base.layered([Arc::new(PreciseCalculator) as Arc<dyn Tool>]);
/// ```
#[derive(Clone)]
pub struct ToolSet {
    tools: HashMap<String, Arc<dyn Tool>>,
    max_result_bytes: usize,
    /// Whether to validate JSON arguments against the tool's schema first.
    validate_args: bool,
    /// Per-call timeout. `None` disables timeouts.
    default_timeout: Option<Duration>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .field("max_result_bytes", &self.max_result_bytes)
            .field("validate_args", &self.validate_args)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl ToolSet {
    /// Create an empty tool set.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: false,
            default_timeout: None,
        }
    }

    /// Set the maximum result size in bytes before truncation.
    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Enable JSON Schema argument validation before tool execution.
    /// Tools with a plain `{"type": "string"}` schema take free text and are
    /// never validated.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Set a timeout applied to every call. Pass `None` to disable.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool. A later tool with the same name replaces the earlier one.
    pub fn with(self, tool: impl Tool + 'static) -> Self {
        self.with_shared(Arc::new(tool))
    }

    /// Register an already shared tool handle.
    pub fn with_shared(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name(), tool);
        self
    }

    /// Conditionally register a tool (builder pattern).
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// Build an independent scope holding every tool of `self` plus `tools`,
    /// where `tools` shadow same-named entries. `self` is left untouched.
    pub fn layered(&self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> ToolSet {
        tools
            .into_iter()
            .fold(self.clone(), |set, tool| set.with_shared(tool))
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered tools, sorted by name.
    pub fn list(&self) -> Vec<&Arc<dyn Tool>> {
        let mut entries: Vec<(&String, &Arc<dyn Tool>)> = self.tools.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, tool)| tool).collect()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.list().into_iter().map(|t| t.definition()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve and invoke one call with validation, timeout, timing and
    /// truncation.
    pub async fn call(&self, name: &str, arguments: &str) -> Result<String, CallError> {
        let Some(tool) = self.tools.get(name) else {
            debug!("Tool lookup miss: {name}");
            return Err(CallError::NotFound(name.to_string()));
        };

        if self.validate_args {
            validate_tool_arguments(tool.as_ref(), arguments).map_err(CallError::Failed)?;
        }

        log_tool_call(name, arguments);
        let start = Instant::now();

        let result = match self.default_timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.execute(arguments)).await {
                Ok(r) => r,
                Err(_) => {
                    info!(
                        "Tool {name} timed out after {:.1}s (limit: {:.1}s)",
                        start.elapsed().as_secs_f64(),
                        limit.as_secs_f64(),
                    );
                    Err(format!("timed out after {:.1} seconds", limit.as_secs_f64()))
                }
            },
            None => tool.execute(arguments).await,
        };

        let elapsed = start.elapsed();
        match &result {
            Ok(output) => {
                debug!(
                    "Tool {name} completed in {:.0}ms ({} bytes)",
                    elapsed.as_secs_f64() * 1000.0,
                    output.len()
                );
                trace!(
                    "Tool {name} result preview: {}",
                    output.chars().take(300).collect::<String>()
                );
            }
            Err(cause) => debug!(
                "Tool {name} failed in {:.0}ms: {cause}",
                elapsed.as_secs_f64() * 1000.0
            ),
        }

        result
            .map(|output| truncate_result(output, self.max_result_bytes))
            .map_err(CallError::Failed)
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── FnTool ────────────────────────────────────────────────────────

/// Type-erased async handler for [`FnTool`].
type ErasedToolHandler =
    Box<dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>> + Send + Sync>;

/// A closure-backed tool.
///
/// [`FnTool::text`] wraps a synchronous function over the raw argument text,
/// which suits the inline and XML call syntaxes, and runs it on the blocking
/// pool. [`FnTool::new`] deserializes JSON
/// arguments into a typed struct first and runs an async handler.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct SearchArgs { query: String }
///
/// let search = FnTool::new(
///     ToolDef::new("search", "Search the knowledge base", json_schema_for::<SearchArgs>()),
///     |args: SearchArgs| async move { Ok(format!("results for {}", args.query)) },
/// );
/// let upper = FnTool::text("upper", "Uppercase the input", |s| Ok(s.to_uppercase()));
///
/// let tools = ToolSet::new().with(search).with(upper);
/// ```
pub struct FnTool {
    def: ToolDef,
    handler: ErasedToolHandler,
}

impl FnTool {
    /// Create a tool with JSON arguments parsed into `A`.
    ///
    /// Argument parse errors become invocation failures without calling the
    /// handler.
    pub fn new<A, F, Fut>(def: ToolDef, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        let erased = move |raw: String| -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>> {
            match serde_json::from_str::<A>(&raw) {
                Ok(args) => Box::pin(handler(args)),
                Err(e) => Box::pin(async move { Err(format!("invalid tool arguments: {e}")) }),
            }
        };

        Self {
            def,
            handler: Box::new(erased),
        }
    }

    /// Create a tool from a synchronous function over the raw argument text.
    ///
    /// `f` runs on the blocking thread pool, so it may block or burn CPU
    /// without stalling the agent's deadline or the other calls in a batch.
    pub fn text<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let erased = move |raw: String| -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>> {
            let f = Arc::clone(&f);
            run_blocking(move || f(&raw))
        };

        Self {
            def: ToolDef::text(name, description),
            handler: Box::new(erased),
        }
    }
}

impl Tool for FnTool {
    fn definition(&self) -> ToolDef {
        self.def.clone()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        (self.handler)(arguments.to_string())
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.def.function.name)
            .finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate JSON arguments against the tool's declared schema.
///
/// Free-text tools (schema `{"type": "string"}`) always pass.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Result<(), String> {
    let schema = tool.definition().function.parameters;
    if schema.get("type").and_then(|t| t.as_str()) == Some("string") {
        return Ok(());
    }

    let args_value: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| format!("invalid JSON arguments for tool '{}': {e}", tool.name()))?;

    // An invalid schema is the tool author's problem, not the model's.
    let Ok(validator) = jsonschema::validator_for(&schema) else {
        return Ok(());
    };

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "argument validation failed for tool '{}': {}",
            tool.name(),
            errors.join("; ")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {arguments}");
}

/// Truncate a string to at most `max` bytes on a char boundary, appending a
/// notice if trimmed.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    let head = s.get(..cut).unwrap_or_default();
    format!("{head}...\n[truncated: {} bytes total]", s.len())
}

// ── Tests ──────────────────────────────────────────────────────────
