//! Voice kit status LED
//!
//! Mirrors the conversation state on a single LED: steady while listening,
//! pulsing while the assistant thinks, dark otherwise.

use std::path::Path;

use super::led::{Led, LedState, LogLed, SysfsLed};
use super::{Plugin, PluginContext};
use crate::Result;
use crate::assistant::{Event, EventType};

/// Status LED plugin
pub struct VoiceKitPlugin {
    led: Box<dyn Led>,
}

impl VoiceKitPlugin {
    /// Registry name
    pub const NAME: &'static str = "voicekit";

    /// Create the plugin around an LED backend
    #[must_use]
    pub fn new(led: Box<dyn Led>) -> Self {
        Self { led }
    }

    /// Build from config: the sysfs LED if one is configured, else a logging LED
    ///
    /// # Errors
    ///
    /// Returns error if the configured LED device cannot be opened
    pub fn from_context(ctx: &PluginContext) -> Result<Box<dyn Plugin>> {
        let settings = &ctx.settings.voicekit;
        let led: Box<dyn Led> = match (&settings.led, &settings.leds_dir) {
            (Some(name), Some(dir)) => Box::new(SysfsLed::open_at(&Path::new(dir).join(name))?),
            (Some(name), None) => Box::new(SysfsLed::open(name)?),
            (None, _) => {
                tracing::debug!("no status LED configured, logging LED state only");
                Box::new(LogLed::default())
            }
        };
        Ok(Box::new(Self::new(led)))
    }

    /// LED state an event calls for, if any
    #[must_use]
    pub const fn reaction(kind: &EventType) -> Option<LedState> {
        match kind {
            EventType::StartFinished
            | EventType::ConversationTurnFinished
            | EventType::ConversationTurnTimeout
            | EventType::NoResponse => Some(LedState::Off),
            EventType::ConversationTurnStarted => Some(LedState::On),
            EventType::EndOfUtterance => Some(LedState::Pulse),
            _ => None,
        }
    }
}

impl Plugin for VoiceKitPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process_event(&mut self, event: &Event) -> Result<()> {
        match Self::reaction(&event.kind) {
            Some(state) => self.led.set(state),
            None => Ok(()),
        }
    }
}
