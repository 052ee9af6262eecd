//! Assistant session plumbing
//!
//! The assistant protocol client itself is an external process; this module
//! defines the events it produces, the [`EventSource`] seam the dispatcher
//! consumes, and the command hand-off plugins use to start conversations.

pub mod bridge;
pub mod conversation;
pub mod event;
pub mod source;

pub use bridge::{BridgeConfig, BridgeSession};
pub use conversation::{ConversationHandle, SessionCommand, command_channel};
pub use event::{Event, EventType};
pub use source::{EventSource, StreamSource};
