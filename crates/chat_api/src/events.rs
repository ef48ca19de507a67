use serde_json::Value;

/// Token counts reported by a usage-bearing chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Content delta extracted from one chunk.
///
/// `Malformed` retains the raw delta object whenever `content` is present but
/// not resolvable to text, so callers can fail explicitly instead of dropping
/// the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatDelta {
    Text(String),
    Empty,
    Malformed(Value),
}

/// Stream event emitted by the SSE parser after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    /// One `chat.completion.chunk` frame reduced to the fields a streaming
    /// consumer needs. A single frame may carry content, a finish reason, and
    /// usage at once.
    Chunk {
        delta: ChatDelta,
        finish_reason: Option<String>,
        usage: Option<ChatUsage>,
    },
    /// `[DONE]` sentinel ending the stream.
    Done,
    /// Provider-reported error frame.
    Error {
        code: Option<String>,
        message: Option<String>,
    },
}

impl ChatStreamEvent {
    /// True when this event terminates the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}
