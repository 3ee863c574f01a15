//! System prompt assembly from the loaded documents.

use crate::config::PromptConfig;
use crate::models::DocumentSet;

/// Builds the system instruction for every conversation turn.
///
/// With no documents this is `generic_instruction` verbatim. Otherwise the
/// leading instruction is followed by one `=== <filename> ===` block per
/// document, in set order, and the trailing instruction. The full document
/// text is included; nothing is truncated here.
pub fn compose_system_prompt(docs: &DocumentSet, prompt: &PromptConfig) -> String {
    if docs.is_empty() {
        return prompt.generic_instruction.clone();
    }

    let mut out = String::new();
    out.push_str(&prompt.leading_instruction);
    out.push_str("\n\n");
    for doc in docs {
        out.push_str("=== ");
        out.push_str(&doc.name);
        out.push_str(" ===\n");
        out.push_str(&doc.text);
        out.push_str("\n\n");
    }
    out.push_str(&prompt.trailing_instruction);
    out
}
