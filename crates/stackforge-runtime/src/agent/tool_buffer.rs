//! Per-index accumulation of streamed tool-call fragments.
//!
//! Providers split one tool call across many deltas: the name and call ID
//! arrive on the first fragment for an index, the JSON arguments arrive as
//! string pieces to concatenate. Nothing is executable until the stream's
//! finish reason says the calls are complete.

use stackforge_llm::types::{FunctionCall, ToolCallDelta, ToolCallRecord};

/// One call under construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BufferedCall {
    /// Provider-assigned call ID.
    pub id: String,
    /// Tool name (set once, by the first fragment for this index).
    pub name: String,
    /// Concatenated argument JSON.
    pub arguments: String,
}

impl BufferedCall {
    /// Completed-call record for the assistant message.
    pub fn to_record(&self) -> ToolCallRecord {
        ToolCallRecord {
            id: self.id.clone(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: self.name.clone(),
                arguments: self.arguments.clone(),
            },
        }
    }
}

/// Accumulates tool-call fragments keyed by index.
#[derive(Debug, Default)]
pub struct ToolCallBuffer {
    calls: Vec<BufferedCall>,
}

impl ToolCallBuffer {
    /// Fold one fragment into the buffer.
    pub fn apply(&mut self, delta: &ToolCallDelta) {
        if self.calls.len() <= delta.index {
            self.calls.resize_with(delta.index + 1, BufferedCall::default);
        }
        let call = &mut self.calls[delta.index];
        if let Some(id) = &delta.id {
            if call.id.is_empty() {
                call.id.clone_from(id);
            }
        }
        if let Some(name) = &delta.name {
            if call.name.is_empty() {
                call.name.clone_from(name);
            }
        }
        if let Some(arguments) = &delta.arguments {
            call.arguments.push_str(arguments);
        }
    }

    /// Whether any fragments were buffered.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Drain the buffered calls in index order.
    pub fn take(&mut self) -> Vec<BufferedCall> {
        std::mem::take(&mut self.calls)
    }
}
