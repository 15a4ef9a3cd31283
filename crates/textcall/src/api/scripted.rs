//! A [`ModelProvider`] that replays canned replies.
//!
//! Used by the integration tests and by the CLI's replay mode. Each call
//! pops the next reply and serves it as a byte stream; every prompt the
//! provider receives is recorded for later inspection.

use super::{ModelProvider, ModelStream, ProviderFuture};
use crate::ToolDef;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// One canned model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Served as the answer stream.
    Text(String),
    /// The provider call fails with this message.
    Fail(String),
}

impl From<&str> for ScriptedReply {
    fn from(text: &str) -> Self {
        ScriptedReply::Text(text.to_string())
    }
}

impl From<String> for ScriptedReply {
    fn from(text: String) -> Self {
        ScriptedReply::Text(text)
    }
}

/// Replays replies in order.
///
/// ```ignore
/// let provider = ScriptedProvider::new(["TOOL:calculator:2+2", "The answer is 4."]);
/// ```
///
/// When the script runs out the provider fails, unless a fallback reply was
/// set with [`with_fallback`](Self::with_fallback), which is then served
/// forever.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    native_tools: bool,
}

impl ScriptedProvider {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ScriptedReply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// A provider that answers every prompt with `reply`.
    pub fn repeating(reply: impl Into<ScriptedReply>) -> Self {
        Self::default().with_fallback(reply)
    }

    /// Reply served once the script is exhausted.
    pub fn with_fallback(mut self, reply: impl Into<ScriptedReply>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Wait this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report native tool support, so the agent calls `chat_with_tools`.
    pub fn with_native_tools(mut self, enabled: bool) -> Self {
        self.native_tools = enabled;
        self
    }

    /// Number of calls served so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_reply(&self, prompt: &str) -> Result<ModelStream, String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .or_else(|| self.fallback.clone());

        debug!("Scripted reply #{call}: {reply:?}");
        match reply {
            Some(ScriptedReply::Text(text)) => Ok(Box::pin(Cursor::new(text.into_bytes()))),
            Some(ScriptedReply::Fail(message)) => Err(message),
            None => Err(format!("script exhausted after {call} repl(ies)")),
        }
    }

    async fn answer(&self, prompt: &str) -> Result<ModelStream, String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_reply(prompt)
    }
}

impl ModelProvider for ScriptedProvider {
    fn chat<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a> {
        Box::pin(self.answer(prompt))
    }

    fn chat_with_tools<'a>(&'a self, prompt: &'a str, tools: &'a [ToolDef]) -> ProviderFuture<'a> {
        debug!("Scripted native-tools call with {} tool definition(s)", tools.len());
        Box::pin(self.answer(prompt))
    }

    fn supports_native_tools(&self) -> bool {
        self.native_tools
    }
}
