//! Transport-only client primitives for OpenAI-compatible chat completions.
//!
//! This crate owns request building, SSE parsing, retry policy, and error
//! normalization for streaming `chat/completions` endpoints. It intentionally
//! contains no provider-selection logic, no sequence-id bookkeeping, and no
//! runtime coupling; those concerns live with the adapter that consumes it.
//!
//! SSE normalization reduces each `chat.completion.chunk` frame to the fields
//! a streaming consumer needs, while preserving malformed delta payloads for
//! explicit caller-side failure handling.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::{ChatApiClient, StreamSummary};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use events::{ChatDelta, ChatStreamEvent, ChatUsage};
pub use payload::{ChatCompletionRequest, StreamOptions, WireMessage};
pub use sse::SseStreamParser;
pub use url::normalize_chat_base_url;
