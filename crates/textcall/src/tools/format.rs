//! Rendering executed calls into the next prompt.

use crate::tools::executor::ToolResult;
use std::fmt::Write;

/// Header that opens every results block.
pub const RESULTS_HEADER: &str = "Tool execution results:\n\n";

/// Render results as the text fed back to the model.
///
/// ```text
/// Original LLM Output:        (only with `original_text`)
/// <text>
///
/// Tool execution results:
///
/// Tool 1: calculator
/// Arguments: 2+2
/// Result: 4
///
/// Tool 2: search
/// Arguments: rust
/// Error: Tool 'search' not found
/// ```
pub fn format_results(results: &[ToolResult], original_text: Option<&str>) -> String {
    let mut out = String::new();

    if let Some(text) = original_text {
        let _ = write!(out, "Original LLM Output:\n{text}\n\n");
    }

    out.push_str(RESULTS_HEADER);

    for (i, result) in results.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "Tool {}: {}\nArguments: {}\n",
            i + 1,
            result.call.name,
            result.call.arguments
        );
        match &result.error {
            Some(message) => {
                let _ = writeln!(out, "Error: {message}");
            }
            None => {
                let _ = writeln!(out, "Result: {}", result.output);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parser::ToolCall;

    #[test]
    fn single_result_exact_format() {
        let results = vec![ToolResult::success(
            ToolCall::new("call_0", "calculator", "2+2"),
            "4".into(),
        )];
        assert_eq!(
            format_results(&results, None),
            "Tool execution results:\n\nTool 1: calculator\nArguments: 2+2\nResult: 4\n"
        );
    }

    #[test]
    fn mixed_results_separated_by_blank_line() {
        let results = vec![
            ToolResult::success(ToolCall::new("call_0", "calculator", "1+1"), "2".into()),
            ToolResult::failure(
                ToolCall::new("call_1", "search", "rust"),
                "Tool 'search' not found".into(),
            ),
        ];
        assert_eq!(
            format_results(&results, None),
            "Tool execution results:\n\n\
             Tool 1: calculator\nArguments: 1+1\nResult: 2\n\n\
             Tool 2: search\nArguments: rust\nError: Tool 'search' not found\n"
        );
    }

    #[test]
    fn original_text_is_prepended() {
        let results = vec![ToolResult::success(
            ToolCall::new("call_0", "think", "plan"),
            "plan".into(),
        )];
        let text = format_results(&results, Some("TOOL:think:plan"));
        assert!(text.starts_with("Original LLM Output:\nTOOL:think:plan\n\nTool execution results:\n\n"));
    }
}
