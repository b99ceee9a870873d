//! Context block and system prompt assembly for RAG chat.
//!
//! Layout of the context block:
//! ```text
//! [USER PREFERENCES]
//! - likes street food
//!
//! [LOCATION] My Khe Beach:
//! Long sandy beach ...
//!
//! [FESTIVAL] Fireworks Festival:
//! ...
//! ```

use wayfinder_types::index::SearchResult;
use wayfinder_types::memory::UserMemory;

use crate::text::truncate_chars;

/// Maximum characters of an entity's content placed in the prompt.
pub const CONTEXT_CONTENT_CHARS: usize = 500;

/// Maximum characters of a source snippet returned to the caller.
pub const SOURCE_SNIPPET_CHARS: usize = 200;

const SYSTEM_TEMPLATE: &str = "You are a helpful travel assistant for Da Nang, Vietnam.
You help users discover locations, cultural items, festivals, and plan their trips.

Use the following context to answer questions. If the context doesn't contain
relevant information, use your general knowledge but mention that.

CONTEXT:
{context}

GUIDELINES:
- Be friendly and helpful
- Provide specific recommendations when possible
- Include practical information (hours, prices, tips)
- Respond in the same language as the user's question
- If asked about something not in context, say so honestly";

/// Display title of a hit, falling back to `"{type} #{id}"`.
pub fn result_title(result: &SearchResult) -> String {
    match result.title() {
        Some(title) if !title.trim().is_empty() => title.to_string(),
        _ => format!("{} #{}", result.entity_type, result.entity_id),
    }
}

/// Body text of a hit: `content`, else `description`, else empty.
pub fn result_content(result: &SearchResult) -> &str {
    ["content", "description"]
        .into_iter()
        .filter_map(|key| result.metadata.get_str(key))
        .find(|text| !text.trim().is_empty())
        .unwrap_or("")
}

/// Render one retrieved entity as a context item.
fn format_item(result: &SearchResult) -> String {
    format!(
        "[{}] {}:\n{}",
        result.entity_type.as_str().to_uppercase(),
        result_title(result),
        truncate_chars(result_content(result), CONTEXT_CONTENT_CHARS)
    )
}

/// Build the context block from retrieved entities and user memories.
///
/// The memory block, when any memory has content, comes first. Parts are
/// separated by a blank line.
pub fn build_context(results: &[SearchResult], memories: &[UserMemory]) -> String {
    let mut parts = Vec::with_capacity(results.len() + 1);

    let memory_lines: Vec<String> = memories
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| format!("- {}", m.content))
        .collect();
    if !memory_lines.is_empty() {
        parts.push(format!("[USER PREFERENCES]\n{}", memory_lines.join("\n")));
    }

    parts.extend(results.iter().map(format_item));
    parts.join("\n\n")
}

/// Embed the context block into the travel assistant system prompt.
pub fn system_prompt(context: &str) -> String {
    SYSTEM_TEMPLATE.replace("{context}", context)
}
