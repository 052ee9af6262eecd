//! Logs every assistant event

use super::{Plugin, PluginContext};
use crate::Result;
use crate::assistant::Event;

/// Event logging plugin
#[derive(Debug, Default)]
pub struct EventLogPlugin {
    seen: u64,
}

impl EventLogPlugin {
    /// Registry name
    pub const NAME: &'static str = "log";

    /// Registry constructor
    ///
    /// # Errors
    ///
    /// Never fails
    #[allow(clippy::unnecessary_wraps)]
    pub fn from_context(_ctx: &PluginContext) -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Self::default()))
    }

    /// Number of events seen so far
    #[must_use]
    pub const fn seen(&self) -> u64 {
        self.seen
    }
}

impl Plugin for EventLogPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process_event(&mut self, event: &Event) -> Result<()> {
        self.seen += 1;
        tracing::info!(seq = self.seen, "{event}");
        Ok(())
    }
}
