//! Event dispatcher
//!
//! Pulls events from an [`EventSource`] one at a time and hands each to every
//! plugin in registration order. A plugin that errors or panics is logged and
//! skipped for that event only; the remaining plugins and later events are
//! unaffected.
//!
//! ```text
//! Created --run()--> Running --end of stream--> Draining --> Stopped
//!                       |                                      ^
//!                       +------------ shutdown ----------------+
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::assistant::{Event, EventSource};
use crate::plugins::Plugin;
use crate::{Error, Result};

/// Dispatcher lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Accepting plugins
    Created,
    /// Receiving and dispatching events; plugins frozen
    Running,
    /// Source ended, finishing up
    Draining,
    /// Source released
    Stopped,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Counters collected while running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events received from the source
    pub events: u64,
    /// Plugin invocations that failed
    pub plugin_failures: u64,
}

/// Fans assistant events out to plugins
pub struct Dispatcher<S> {
    source: Option<S>,
    plugins: Vec<Box<dyn Plugin>>,
    state: DispatcherState,
    stats: DispatchStats,
}

impl<S> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("plugins", &self.plugin_names())
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<S: EventSource> Dispatcher<S> {
    /// Create a dispatcher over `source` with no plugins
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self {
            source: Some(source),
            plugins: Vec::new(),
            state: DispatcherState::Created,
            stats: DispatchStats {
                events: 0,
                plugin_failures: 0,
            },
        }
    }

    /// Append a plugin
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryFrozen`] once [`run`](Self::run) has started
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        if self.state != DispatcherState::Created {
            return Err(Error::RegistryFrozen);
        }
        tracing::debug!(plugin = plugin.name(), position = self.plugins.len(), "plugin attached");
        self.plugins.push(plugin);
        Ok(())
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> DispatcherState {
        self.state
    }

    /// Counters so far
    #[must_use]
    pub const fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Dispatch events until the source ends or `shutdown` resolves
    ///
    /// An event already taken from the source is always delivered to every
    /// plugin before shutdown is noticed.
    ///
    /// # Errors
    ///
    /// Returns error if the source fails, or if the dispatcher already ran
    pub async fn run<F>(&mut self, shutdown: F) -> Result<DispatchStats>
    where
        F: Future<Output = ()>,
    {
        let Some(mut source) = self.source.take() else {
            return Err(Error::Session(format!(
                "dispatcher cannot run again from state {}",
                self.state
            )));
        };

        self.state = DispatcherState::Running;
        tracing::info!(plugins = ?self.plugin_names(), "dispatcher running");

        tokio::pin!(shutdown);
        let mut interrupted = false;
        let outcome = loop {
            let next = tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    interrupted = true;
                    break Ok(());
                }
                next = source.next_event() => next,
            };

            match next {
                Ok(Some(event)) => self.dispatch(&event),
                Ok(None) => {
                    self.state = DispatcherState::Draining;
                    tracing::info!("event stream ended");
                    break Ok(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "event source failed");
                    break Err(e);
                }
            }
        };

        let closed = if interrupted {
            source.shutdown().await
        } else {
            Ok(())
        };
        if let Err(e) = closed {
            tracing::warn!(error = %e, "event source did not shut down cleanly");
        }
        drop(source);
        self.state = DispatcherState::Stopped;
        tracing::info!(
            events = self.stats.events,
            plugin_failures = self.stats.plugin_failures,
            "dispatcher stopped"
        );

        outcome.map(|()| self.stats)
    }
}

impl<S> Dispatcher<S> {
    /// Names of attached plugins, in order
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    fn dispatch(&mut self, event: &Event) {
        self.stats.events += 1;
        tracing::debug!(event = %event.kind, seq = self.stats.events, "dispatching event");

        for plugin in &mut self.plugins {
            let outcome = catch_unwind(AssertUnwindSafe(|| plugin.process_event(event)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };

            self.stats.plugin_failures += 1;
            tracing::error!(
                plugin = plugin.name(),
                event = %event.kind,
                error = %failure,
                "plugin failed to process event"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
