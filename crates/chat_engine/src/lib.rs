//! Streaming-completion orchestration engine.
//!
//! The engine owns the turn lifecycle for one active conversation: it
//! dispatches a completion request to a pluggable [`chat_core::InferenceClient`],
//! restores logical order from out-of-order fragment delivery, accumulates the
//! final assistant message, tracks token accounting, supports mid-stream
//! cancellation with best-effort partial saves, and writes the finished turn
//! through to a [`session_store::SessionStore`] exactly once.
//!
//! Presentation concerns stay outside: the engine reports lifecycle changes
//! through fire-and-forget [`EngineNotification`]s and never renders anything.

pub mod accumulator;
pub mod notification;
pub mod orchestrator;
pub mod reassembler;

pub use accumulator::{build_final_message, AccumulateError};
pub use notification::{
    notification_channel, EngineNotification, NotificationReceiver, NotificationSender,
};
pub use orchestrator::{
    EngineError, Orchestrator, ProcessingMode, TurnOutcome, FRAGMENT_CHANNEL_CAPACITY,
};
pub use reassembler::FragmentReassembler;
