//! Conversation transcript with a system-prompt anchor
//!
//! The transcript is an append-only sequence of [`ChatMessage`] with one
//! sanctioned mutation: the system prompt is removed and re-inserted at
//! index 0 on every turn, so repeated sends never accumulate system
//! messages and a mutated prompt takes effect immediately. Helpers exist
//! for tool-result bookkeeping so the agent can keep the transcript
//! well-formed: every tool-call id must eventually have a tool reply, or
//! the next LLM turn would be malformed.

use crate::chat::types::{ChatMessage, ToolCall, ROLE_ASSISTANT, ROLE_SYSTEM, ROLE_TOOL};

/// Ordered message history for one agent.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages, in order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Append a tool-result message bound to `tool_call_id`.
    pub fn push_tool_result(&mut self, tool_call_id: &str, content: impl Into<String>) {
        self.messages
            .push(ChatMessage::tool_result(tool_call_id, content));
    }

    /// Remove every system message and insert `prompt` at index 0.
    ///
    /// Idempotent: any number of calls leaves exactly one system message,
    /// first in the transcript.
    pub fn anchor_system_prompt(&mut self, prompt: &str) {
        self.messages.retain(|m| m.role != ROLE_SYSTEM);
        self.messages.insert(0, ChatMessage::system(prompt));
    }

    /// Remove every non-system message, preserving the anchor.
    pub fn clear_conversation(&mut self) {
        self.messages.retain(|m| m.role == ROLE_SYSTEM);
    }

    /// Tool calls of the most recent assistant message that have no
    /// matching tool reply yet, in call order.
    pub fn unanswered_calls_of_last_assistant(&self) -> Vec<ToolCall> {
        let answered: std::collections::HashSet<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == ROLE_TOOL)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ROLE_ASSISTANT)
            .map(|assistant| {
                assistant
                    .tool_calls()
                    .iter()
                    .filter(|call| !answered.contains(call.id.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether every tool-call id in every assistant message has a matching
    /// tool reply later in the transcript.
    pub fn is_balanced(&self) -> bool {
        for (index, message) in self.messages.iter().enumerate() {
            if message.role != ROLE_ASSISTANT {
                continue;
            }
            for call in message.tool_calls() {
                let answered = self.messages[index + 1..]
                    .iter()
                    .any(|m| m.role == ROLE_TOOL && m.tool_call_id.as_deref() == Some(&call.id));
                if !answered {
                    return false;
                }
            }
        }
        true
    }
}
