//! Turn prompt rendering.
//!
//! Every turn's prompt is the turn input (the user's question on turn 1, the
//! formatted tool results afterwards) followed by the tool catalogue and the
//! call syntaxes the parser accepts. [`PromptBuilder`] assembles the pieces.

use crate::tools::core::ToolSet;

/// How the model is told to call tools.
pub const CALL_SYNTAX_INSTRUCTIONS: &str = "\
To call a tool, reply with one of these forms and nothing else on that line:
TOOL:<name>:<arguments>
<tool name=\"<name>\"><arguments></tool>
{\"tool_calls\":[{\"name\":\"<name>\",\"arguments\":\"<arguments>\",\"id\":\"<id>\"}]}
When you have the final answer, reply in plain text without any tool call.";

/// Builder for multi-section prompts.
///
/// Sections are joined with blank lines. Empty sections are skipped.
///
/// ```
/// use textcall::agent::prompt::PromptBuilder;
///
/// let prompt = PromptBuilder::new("What is 2+2?")
///     .section("Available tools:", "- calculator: Evaluate arithmetic")
///     .section("Unused:", "")
///     .raw_if(false, || "never".into())
///     .build();
///
/// assert_eq!(prompt, "What is 2+2?\n\nAvailable tools:\n- calculator: Evaluate arithmetic");
/// ```
pub struct PromptBuilder {
    sections: Vec<String>,
}

impl PromptBuilder {
    /// Start with a preamble, included as-is.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a titled section. Skipped if `content` is empty.
    pub fn section(mut self, title: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("{title}\n{content}"));
        }
        self
    }

    /// Append raw text. Skipped if empty.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(content);
        }
        self
    }

    /// Conditionally append raw text. `content_fn` only runs when `condition` holds.
    pub fn raw_if(self, condition: bool, content_fn: impl FnOnce() -> String) -> Self {
        if condition { self.raw(content_fn()) } else { self }
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

/// `- name: description` lines for every tool, sorted by name.
pub fn render_tool_catalogue(tools: &ToolSet) -> String {
    tools
        .definitions()
        .iter()
        .map(|def| format!("- {}: {}", def.name(), def.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The full prompt for one turn.
pub fn render_turn_prompt(input: &str, tools: &ToolSet) -> String {
    PromptBuilder::new(input)
        .section("Available tools:", render_tool_catalogue(tools))
        .raw_if(!tools.is_empty(), || CALL_SYNTAX_INSTRUCTIONS.to_string())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::{Calculator, ThinkTool};

    #[test]
    fn turn_prompt_lists_tools_and_syntax() {
        let tools = ToolSet::new().with(ThinkTool).with(Calculator);
        let prompt = render_turn_prompt("What is 2+2?", &tools);

        assert!(prompt.starts_with("What is 2+2?\n\nAvailable tools:\n- calculator: "));
        let calc = prompt.find("- calculator:").unwrap();
        let think = prompt.find("- think:").unwrap();
        assert!(calc < think);
        assert!(prompt.contains("TOOL:<name>:<arguments>"));
        assert!(prompt.contains("<tool name=\"<name>\">"));
        assert!(prompt.contains("{\"tool_calls\":"));
    }

    #[test]
    fn empty_toolset_leaves_input_alone() {
        assert_eq!(render_turn_prompt("hello", &ToolSet::new()), "hello");
    }
}
