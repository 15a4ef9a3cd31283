//! Model-facing layer: the provider contract, streaming detection, and
//! correlation ids.
//!
//! These modules handle everything between the [`Agent`](crate::agent::harness::Agent)
//! loop and whatever produces model text:
//!
//! - [`ModelProvider`]: one call in, one byte stream out. Concrete network
//!   clients live outside this crate and implement this trait.
//! - [`streaming`]: inspects a bounded prefix of the answer stream and decides
//!   whether to pass it straight through or buffer it for tool parsing.
//! - [`scripted`]: [`ScriptedProvider`](scripted::ScriptedProvider), which
//!   replays canned replies for tests and the CLI.
//! - [`tracing`]: `trace_id` / `span_id` correlation ids.

pub mod scripted;
pub mod streaming;
pub mod tracing;

use crate::ToolDef;
use std::future::Future;
use std::pin::Pin;
use tokio::io::AsyncRead;

// Re-export commonly used items at the module level.
pub use scripted::ScriptedProvider;
pub use streaming::{Route, detect};
pub use tracing::{generate_span_id, generate_trace_id};

/// The model's answer as a live byte stream.
pub type ModelStream = Pin<Box<dyn AsyncRead + Send>>;

/// Boxed future returned by [`ModelProvider`] calls.
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<ModelStream, String>> + Send + 'a>>;

/// Something that turns a prompt into a model answer stream.
///
/// Failures are reported as a plain message; the agent wraps them into
/// [`AgentError::Model`](crate::AgentError::Model) with the turn number and
/// never retries. Retrying belongs in the provider implementation.
///
/// Providers with native function calling override
/// [`supports_native_tools`](Self::supports_native_tools) and
/// [`chat_with_tools`](Self::chat_with_tools), and are expected to render any
/// structured calls they receive with
/// [`render_envelope`](crate::tools::parser::render_envelope) so the agent can
/// treat every answer the same way.
pub trait ModelProvider: Send + Sync {
    /// Complete `prompt`.
    fn chat<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a>;

    /// Complete `prompt` with structured tool definitions attached.
    fn chat_with_tools<'a>(&'a self, prompt: &'a str, _tools: &'a [ToolDef]) -> ProviderFuture<'a> {
        self.chat(prompt)
    }

    /// Whether [`chat_with_tools`](Self::chat_with_tools) should be used.
    fn supports_native_tools(&self) -> bool {
        false
    }
}
