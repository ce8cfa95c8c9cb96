//! System-prompt assembly for the writing assistant.
//!
//! The prompt is layered: a fixed preamble, the live document content, the
//! document's knowledge items, then the user's global and per-document
//! instructions, and finally a fixed closing directive. Optional layers are
//! omitted entirely when empty; no empty headings are emitted.

use std::fmt::Write as _;

use crate::document::KnowledgeItem;

/// Placeholder shown in place of an empty document.
pub const EMPTY_DOCUMENT: &str = "(Document is empty)";

const PREAMBLE: &str = "You are an intelligent writing assistant helping users write and edit \
documents. You have access to reference knowledge that the user has provided to inform your \
writing.";

const CLOSING: &str = "When the user asks you to write or edit content:
1. Consider the existing document content, any reference knowledge and any custom instructions provided
2. Match the tone and style of the existing document when adding content
3. Follow the custom instructions; document-specific instructions win where they conflict with global ones
4. If asked to edit specific sections, make targeted changes
5. Be helpful and provide well-structured, clear writing
6. You can suggest improvements or ask clarifying questions if needed

Respond with the text you've written or edited. If providing a full replacement or addition, \
make it clear where it should go in the document.";

/// Everything the assembler needs. Borrowed; assembly never allocates more
/// than the output string.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptContext<'a> {
  /// Live editor content as sent by the client, possibly empty.
  pub document_content:      &'a str,
  /// Knowledge items in display order.
  pub knowledge:             &'a [KnowledgeItem],
  /// The user's account-wide instructions, possibly empty.
  pub global_instructions:   &'a str,
  /// This document's own instructions, possibly empty.
  pub document_instructions: &'a str,
}

/// Build the system prompt for one chat turn.
pub fn assemble_system_prompt(ctx: &PromptContext<'_>) -> String {
  let content = if ctx.document_content.trim().is_empty() {
    EMPTY_DOCUMENT
  } else {
    ctx.document_content
  };

  let mut prompt = String::with_capacity(
    PREAMBLE.len() + CLOSING.len() + content.len() + 256,
  );
  prompt.push_str(PREAMBLE);
  prompt.push_str("\n\nCurrent document content:\n---\n");
  prompt.push_str(content);
  prompt.push_str("\n---\n");

  push_knowledge(&mut prompt, ctx.knowledge);
  push_instructions(&mut prompt, ctx.global_instructions, ctx.document_instructions);

  prompt.push('\n');
  prompt.push_str(CLOSING);
  prompt
}

fn push_knowledge(prompt: &mut String, items: &[KnowledgeItem]) {
  if items.is_empty() {
    return;
  }
  prompt.push_str("\n## Reference Knowledge:\n");
  for item in items {
    // Writing into a String cannot fail.
    let _ = write!(prompt, "\n### {}\n{}\n", item.title, item.content);
  }
}

fn push_instructions(prompt: &mut String, global: &str, document: &str) {
  let global = global.trim();
  let document = document.trim();
  if global.is_empty() && document.is_empty() {
    return;
  }
  prompt.push_str("\n## Custom Instructions:\n");
  if !global.is_empty() {
    let _ = write!(prompt, "\n### Global Instructions\n{global}\n");
  }
  if !document.is_empty() {
    let _ = write!(prompt, "\n### Document-Specific Instructions\n{document}\n");
  }
}
