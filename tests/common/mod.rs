//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kestrel_device::{
    ConversationHandle, Error, Event, EventSource, EventType, Plugin, Result,
    assistant::StreamSource,
    identity::{Registrar, RegistrationCall},
};

/// Event source yielding `kinds` in order, then ending
pub fn events(kinds: Vec<EventType>) -> impl EventSource {
    StreamSource::new(tokio_stream::iter(kinds.into_iter().map(Event::new)))
}

/// Log shared between recording plugins: `(plugin name, event type)` in call order
pub type CallLog = Arc<Mutex<Vec<(String, EventType)>>>;

/// Plugin recording every event into a shared log, optionally failing on one type
pub struct RecordingPlugin {
    name: String,
    log: CallLog,
    fail_on: Option<EventType>,
}

impl RecordingPlugin {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, kind: EventType) -> Self {
        self.fail_on = Some(kind);
        self
    }
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_event(&mut self, event: &Event) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push((self.name.clone(), event.kind.clone()));

        if self.fail_on.as_ref() == Some(&event.kind) {
            return Err(Error::Plugin(format!("{} rejected {}", self.name, event.kind)));
        }
        Ok(())
    }
}

/// Plugin requesting a conversation from inside `process_event`
pub struct RequestingPlugin {
    conversation: ConversationHandle,
    on: EventType,
    log: CallLog,
}

impl RequestingPlugin {
    pub fn new(conversation: ConversationHandle, on: EventType, log: &CallLog) -> Self {
        Self {
            conversation,
            on,
            log: Arc::clone(log),
        }
    }
}

impl Plugin for RequestingPlugin {
    fn name(&self) -> &str {
        "requester"
    }

    fn process_event(&mut self, event: &Event) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(("requester".to_string(), event.kind.clone()));

        if event.kind == self.on && !self.conversation.request() {
            return Err(Error::Plugin("conversation request dropped".to_string()));
        }
        Ok(())
    }
}

/// Registrar recording calls, succeeding unless told otherwise
#[derive(Default)]
pub struct MockRegistrar {
    pub calls: Mutex<Vec<RegistrationCall>>,
    pub fail: bool,
}

impl MockRegistrar {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Registrar for MockRegistrar {
    async fn register(&self, call: &RegistrationCall) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        if self.fail {
            return Err(Error::Registration("403 Forbidden".to_string()));
        }
        Ok(())
    }
}
