//! Hardware-reaction plugins
//!
//! A plugin sees every assistant event, in order, on the dispatch task.
//! Plugins that need to start conversations get a [`ConversationHandle`]
//! through the [`PluginContext`] they are built from.

pub mod event_log;
pub mod led;
pub mod registry;
pub mod trigger;
pub mod voicekit;

use crate::Result;
use crate::assistant::{ConversationHandle, Event};
use crate::config::PluginSettings;

pub use event_log::EventLogPlugin;
pub use led::{Led, LedState, LogLed, SysfsLed};
pub use registry::{PluginFactory, PluginRegistry};
pub use trigger::TriggerPlugin;
pub use voicekit::VoiceKitPlugin;

/// A module reacting to assistant events
pub trait Plugin: Send {
    /// Name the plugin was registered under
    fn name(&self) -> &str;

    /// Handle a single event
    ///
    /// Called synchronously; the next plugin only runs once this returns.
    ///
    /// # Errors
    ///
    /// Returns error if the plugin failed to react. The dispatcher logs it and
    /// carries on with the remaining plugins.
    fn process_event(&mut self, event: &Event) -> Result<()>;
}

/// Everything a plugin constructor may use
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Command handle for the running assistant session
    pub conversation: ConversationHandle,

    /// Per-plugin settings from the config file
    pub settings: PluginSettings,
}

impl PluginContext {
    /// Create a context with default plugin settings
    #[must_use]
    pub fn new(conversation: ConversationHandle) -> Self {
        Self {
            conversation,
            settings: PluginSettings::default(),
        }
    }

    /// Return this context with the given settings
    #[must_use]
    pub fn with_settings(mut self, settings: PluginSettings) -> Self {
        self.settings = settings;
        self
    }
}
