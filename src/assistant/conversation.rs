//! Conversation commands sent back to the assistant session
//!
//! [`ConversationHandle`] is the capability handed to plugins. Requests are a
//! non-blocking hand-off onto an unbounded channel drained by the session, so
//! it is safe to call from inside `process_event`, from a spawned task or from
//! a plain thread while a dispatch is in flight.

use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::NotKeyed};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Command for the assistant session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    /// Begin a new conversation turn as if the hotword was heard
    StartConversation,
    /// Abort the conversation turn in progress
    StopConversation,
}

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Cloneable handle for steering the assistant session
#[derive(Clone)]
pub struct ConversationHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
    limiter: Option<Arc<Limiter>>,
}

impl std::fmt::Debug for ConversationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationHandle")
            .field("connected", &self.is_connected())
            .field("debounced", &self.limiter.is_some())
            .finish()
    }
}

/// Create a handle and the receiving end drained by the session
///
/// A non-zero `cooldown` drops conversation requests arriving less than
/// `cooldown` after the previously accepted one.
#[must_use]
pub fn command_channel(
    cooldown: Duration,
) -> (ConversationHandle, mpsc::UnboundedReceiver<SessionCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let limiter = Quota::with_period(cooldown).map(|quota| Arc::new(RateLimiter::direct(quota)));
    (ConversationHandle { tx, limiter }, rx)
}

impl ConversationHandle {
    /// Ask the session to start a conversation turn
    ///
    /// Returns `false` if the request was debounced or the session is gone.
    pub fn request(&self) -> bool {
        if self.limiter.as_ref().is_some_and(|l| l.check().is_err()) {
            tracing::debug!("conversation request debounced");
            return false;
        }
        self.send(SessionCommand::StartConversation)
    }

    /// Ask the session to stop the current conversation turn
    pub fn stop(&self) -> bool {
        self.send(SessionCommand::StopConversation)
    }

    /// Whether the session is still accepting commands
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, command: SessionCommand) -> bool {
        if self.tx.send(command).is_err() {
            tracing::warn!(?command, "assistant session closed, command dropped");
            return false;
        }
        tracing::debug!(?command, "queued session command");
        true
    }
}
