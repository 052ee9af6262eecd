//! Conversation trigger
//!
//! Starts a conversation turn when the process receives `SIGUSR1`, e.g. from
//! a button handler running `pkill -USR1 kestrel`. Triggers arriving while a
//! turn is already running are ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use super::{Plugin, PluginContext};
use crate::assistant::{ConversationHandle, Event, EventType};
use crate::{Error, Result};

/// Shared trigger state, usable from any thread or task
#[derive(Debug, Clone)]
pub struct Trigger {
    conversation: ConversationHandle,
    in_turn: Arc<AtomicBool>,
}

impl Trigger {
    /// Request a new turn unless one is in progress
    ///
    /// Returns whether a request was sent.
    pub fn fire(&self) -> bool {
        if self.in_turn.load(Ordering::Acquire) {
            tracing::debug!("trigger ignored, conversation turn in progress");
            return false;
        }
        tracing::info!("trigger fired, requesting conversation");
        self.conversation.request()
    }
}

/// Plugin tracking conversation turns for the trigger
#[derive(Debug)]
pub struct TriggerPlugin {
    trigger: Trigger,
    listener: Option<JoinHandle<()>>,
}

impl TriggerPlugin {
    /// Registry name
    pub const NAME: &'static str = "trigger";

    /// Create a trigger without any signal listener attached
    #[must_use]
    pub fn new(conversation: ConversationHandle) -> Self {
        Self {
            trigger: Trigger {
                conversation,
                in_turn: Arc::new(AtomicBool::new(false)),
            },
            listener: None,
        }
    }

    /// Build the plugin and start listening for `SIGUSR1`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Plugin`] outside a Tokio runtime or if the signal
    /// handler cannot be installed
    pub fn from_context(ctx: &PluginContext) -> Result<Box<dyn Plugin>> {
        let mut plugin = Self::new(ctx.conversation.clone());
        plugin.listener = Some(spawn_signal_listener(plugin.trigger())?);
        Ok(Box::new(plugin))
    }

    /// Handle for firing the trigger
    #[must_use]
    pub fn trigger(&self) -> Trigger {
        self.trigger.clone()
    }
}

impl Drop for TriggerPlugin {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl Plugin for TriggerPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process_event(&mut self, event: &Event) -> Result<()> {
        if event.kind == EventType::ConversationTurnStarted {
            self.trigger.in_turn.store(true, Ordering::Release);
        } else if event.kind.ends_turn() || event.kind == EventType::StartFinished {
            self.trigger.in_turn.store(false, Ordering::Release);
        }
        Ok(())
    }
}

#[cfg(unix)]
fn spawn_signal_listener(trigger: Trigger) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| Error::Plugin(format!("no async runtime for signal listener: {e}")))?;
    let _guard = handle.enter();
    let mut signals = signal(SignalKind::user_defined1())
        .map_err(|e| Error::Plugin(format!("failed to listen for SIGUSR1: {e}")))?;

    tracing::info!(pid = std::process::id(), "send SIGUSR1 to start a conversation");

    Ok(handle.spawn(async move {
        while signals.recv().await.is_some() {
            trigger.fire();
        }
    }))
}

#[cfg(not(unix))]
fn spawn_signal_listener(_trigger: Trigger) -> Result<JoinHandle<()>> {
    Err(Error::Plugin("signal triggers need a unix host".to_string()))
}
