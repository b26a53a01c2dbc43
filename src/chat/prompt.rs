//! Outgoing prompt assembly.
//!
//! Merges retrieved chunks into the system message so the model answers with
//! the user's documents in view. Every request carries exactly one system
//! message and one user message.

use super::adapter::Message;
use crate::retrieval::SearchResult;
use crate::ui::lang::Messages;

/// Separator between spliced context chunks.
const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Build the message list for one user turn.
///
/// With no context the system message is just the base prompt; retrieved
/// chunks are appended under a localized header, joined by `---`.
pub fn build_messages(
    messages: &Messages,
    context: &[SearchResult],
    user_input: &str,
) -> Vec<Message> {
    let mut system_prompt = messages.system_prompt.to_string();

    if !context.is_empty() {
        system_prompt.push_str("\n\n");
        system_prompt.push_str(messages.context_header);
        system_prompt.push('\n');

        let joined = context
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        system_prompt.push_str(&joined);
    }

    vec![Message::system(system_prompt), Message::user(user_input)]
}
