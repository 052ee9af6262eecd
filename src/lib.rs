//! Kestrel - device controller for embedded voice assistants
//!
//! This library provides the core functionality for the Kestrel controller:
//! - Device identity reconciliation and cloud registration
//! - Assistant session bridge (events in, conversation commands out)
//! - Event dispatch to hardware-reaction plugins (status LED, triggers)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Assistant bridge process                │
//! │        events (stdout)  │  commands (stdin)          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Kestrel Daemon                      │
//! │   Identity  │  Registration  │  Dispatcher          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Plugins                          │
//! │        voicekit LED  │  trigger  │  log              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod daemon;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod plugins;

pub use assistant::{ConversationHandle, Event, EventSource, EventType};
pub use config::{Config, ConfigOverrides};
pub use daemon::Daemon;
pub use dispatcher::{DispatchStats, Dispatcher, DispatcherState};
pub use error::{Error, Result};
pub use identity::{DeviceRegistration, ReconciliationDecision, RegistrationRequest};
pub use plugins::{Plugin, PluginContext, PluginRegistry};
