//! Call-syntax parsing.
//!
//! A model without native function calling asks for tools by writing one of
//! three textual conventions into its answer:
//!
//! | Encoding | Shape | Synthesized ids |
//! |----------|-------|-----------------|
//! | Envelope | `{"tool_calls":[{"name":…,"arguments":…,"id":…}]}` | `envelope_call_<i>` |
//! | Inline marker | `TOOL:<name>:<arguments>` (to end of line) | `call_<i>` |
//! | XML-like | `<tool name="<name>">…</tool>` | `xml_call_<i>` |
//!
//! [`ToolCallParser`] runs an ordered list of independent strategies over the
//! same text and concatenates their output in strategy order. Nothing is
//! deduplicated across strategies and text with no recognizable call yields an
//! empty list rather than an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// A parsed request to invoke one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument text, passed to the tool unchanged.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// One parsing strategy: a pure function from model text to the calls it finds.
pub type ParseStrategy = fn(&str) -> Vec<ToolCall>;

static ENVELOPE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"tool_calls"\s*:"#).expect("hardcoded regex is valid")
});

static INLINE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TOOL:([^:\s]+):([^\n]*)").expect("hardcoded regex is valid"));

static XML_TOOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<tool name="([^"]*)">(.*?)</tool>"#).expect("hardcoded regex is valid")
});

// ── Parser ─────────────────────────────────────────────────────────

/// An ordered list of named strategies.
///
/// `ToolCallParser::default()` carries the envelope, inline and XML
/// strategies in that order. Further conventions are appended with
/// [`with_strategy`](Self::with_strategy) and run after the built-ins.
///
/// ```
/// use textcall::tools::parser::{ToolCall, ToolCallParser};
///
/// fn shout(text: &str) -> Vec<ToolCall> {
///     text.lines()
///         .filter_map(|l| l.strip_prefix("!!"))
///         .enumerate()
///         .map(|(i, name)| ToolCall::new(format!("shout_{i}"), name.trim(), ""))
///         .collect()
/// }
///
/// let parser = ToolCallParser::default().with_strategy("shout", shout);
/// let calls = parser.parse("TOOL:calculator:1+1\n!!think");
/// assert_eq!(calls.len(), 2);
/// assert_eq!(calls[1].name, "think");
/// ```
#[derive(Debug, Clone)]
pub struct ToolCallParser {
    strategies: Vec<(&'static str, ParseStrategy)>,
}

impl ToolCallParser {
    /// A parser with no strategies.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy. It runs after every strategy already present.
    pub fn with_strategy(mut self, name: &'static str, strategy: ParseStrategy) -> Self {
        self.strategies.push((name, strategy));
        self
    }

    /// Names of the registered strategies, in run order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(name, _)| *name).collect()
    }

    /// Run every strategy and concatenate the results.
    ///
    /// Ids are unique within the returned list: a later call whose id was
    /// already taken gets a `_<n>` suffix.
    pub fn parse(&self, text: &str) -> Vec<ToolCall> {
        let calls = self
            .strategies
            .iter()
            .flat_map(|(_, strategy)| strategy(text))
            .collect();
        disambiguate_ids(calls)
    }
}

impl Default for ToolCallParser {
    fn default() -> Self {
        Self::empty()
            .with_strategy("envelope", parse_envelopes)
            .with_strategy("inline", parse_inline_markers)
            .with_strategy("xml", parse_xml_blocks)
    }
}

/// Parse `text` with the default strategies.
pub fn parse(text: &str) -> Vec<ToolCall> {
    ToolCallParser::default().parse(text)
}

fn disambiguate_ids(mut calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen: HashSet<String> = HashSet::with_capacity(calls.len());
    for call in &mut calls {
        if !seen.contains(&call.id) {
            seen.insert(call.id.clone());
            continue;
        }
        let mut n = 1;
        while seen.contains(&format!("{}_{n}", call.id)) {
            n += 1;
        }
        call.id = format!("{}_{n}", call.id);
        seen.insert(call.id.clone());
    }
    calls
}

// ── Envelope ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope {
    tool_calls: Vec<EnvelopeEntry>,
}

#[derive(Deserialize)]
struct EnvelopeEntry {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
    #[serde(default)]
    id: Option<String>,
}

/// Find every `{"tool_calls": [...]}` object in `text`, including ones
/// embedded in prose, and emit their entries in order.
pub fn parse_envelopes(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut search_from = 0;

    while let Some(m) = text
        .get(search_from..)
        .and_then(|rest| ENVELOPE_START.find(rest))
    {
        let start = search_from + m.start();
        let Some(candidate) = text.get(start..) else {
            break;
        };

        let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Envelope>();
        match stream.next() {
            Some(Ok(envelope)) => {
                for entry in envelope.tool_calls {
                    let index = calls.len();
                    let arguments = match entry.arguments {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    let id = entry
                        .id
                        .unwrap_or_else(|| format!("envelope_call_{index}"));
                    calls.push(ToolCall::new(id, entry.name, arguments));
                }
                search_from = start + stream.byte_offset().max(1);
            }
            // Malformed or truncated JSON: look for the next occurrence.
            _ => search_from = search_from + m.end(),
        }
    }

    calls
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    tool_calls: Vec<EnvelopeEntryOut<'a>>,
}

#[derive(Serialize)]
struct EnvelopeEntryOut<'a> {
    name: &'a str,
    arguments: &'a str,
    id: &'a str,
}

/// Render calls as the canonical envelope text, so structured calls from a
/// native-tools provider can take the same text path as everything else.
pub fn render_envelope(calls: &[ToolCall]) -> String {
    let envelope = EnvelopeOut {
        tool_calls: calls
            .iter()
            .map(|c| EnvelopeEntryOut {
                name: &c.name,
                arguments: &c.arguments,
                id: &c.id,
            })
            .collect(),
    };
    serde_json::to_string(&envelope).unwrap_or_default()
}

// ── Inline markers ─────────────────────────────────────────────────

/// `TOOL:<name>:<arguments>`; the name ends at the first `:` and the
/// arguments at the end of the line.
pub fn parse_inline_markers(text: &str) -> Vec<ToolCall> {
    INLINE_MARKER
        .captures_iter(text)
        .enumerate()
        .map(|(i, caps)| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let arguments = caps.get(2).map_or("", |m| m.as_str()).trim();
            ToolCall::new(format!("call_{i}"), name, arguments)
        })
        .collect()
}

// ── XML-like blocks ────────────────────────────────────────────────

/// `<tool name="<name>">…</tool>`; the body may span lines.
pub fn parse_xml_blocks(text: &str) -> Vec<ToolCall> {
    XML_TOOL
        .captures_iter(text)
        .enumerate()
        .map(|(i, caps)| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let body = caps.get(2).map_or("", |m| m.as_str()).trim();
            ToolCall::new(format!("xml_call_{i}"), name, body)
        })
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────
