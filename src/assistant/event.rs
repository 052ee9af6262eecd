//! Assistant lifecycle events
//!
//! Events are delivered to plugins untouched. Types the controller does not
//! know are kept as [`EventType::Other`] so newer assistant versions keep
//! working.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of assistant event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Assistant finished starting and is ready for a conversation
    StartFinished,
    /// A conversation turn started (hotword or triggered)
    ConversationTurnStarted,
    /// The user stopped speaking
    EndOfUtterance,
    /// The assistant finished the current turn
    ConversationTurnFinished,
    /// The turn timed out waiting for speech
    ConversationTurnTimeout,
    /// The assistant had nothing to say
    NoResponse,
    /// Speech recognition produced its final text
    RecognizingSpeechFinished,
    /// The assistant started speaking its response
    RespondingStarted,
    /// The assistant finished speaking its response
    RespondingFinished,
    /// Microphone mute state changed
    MutedChanged,
    /// An alarm or timer started ringing
    AlertStarted,
    /// An alarm or timer stopped
    AlertFinished,
    /// A device action was requested by the assistant
    DeviceAction,
    /// The assistant reported an error
    AssistantError,
    /// Any event type not listed above, by wire name
    Other(String),
}

impl EventType {
    /// Wire name of the event type
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::StartFinished => "ON_START_FINISHED",
            Self::ConversationTurnStarted => "ON_CONVERSATION_TURN_STARTED",
            Self::EndOfUtterance => "ON_END_OF_UTTERANCE",
            Self::ConversationTurnFinished => "ON_CONVERSATION_TURN_FINISHED",
            Self::ConversationTurnTimeout => "ON_CONVERSATION_TURN_TIMEOUT",
            Self::NoResponse => "ON_NO_RESPONSE",
            Self::RecognizingSpeechFinished => "ON_RECOGNIZING_SPEECH_FINISHED",
            Self::RespondingStarted => "ON_RESPONDING_STARTED",
            Self::RespondingFinished => "ON_RESPONDING_FINISHED",
            Self::MutedChanged => "ON_MUTED_CHANGED",
            Self::AlertStarted => "ON_ALERT_STARTED",
            Self::AlertFinished => "ON_ALERT_FINISHED",
            Self::DeviceAction => "ON_DEVICE_ACTION",
            Self::AssistantError => "ON_ASSISTANT_ERROR",
            Self::Other(name) => name,
        }
    }

    /// Parse a wire name, keeping unknown names as [`EventType::Other`]
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "ON_START_FINISHED" => Self::StartFinished,
            "ON_CONVERSATION_TURN_STARTED" => Self::ConversationTurnStarted,
            "ON_END_OF_UTTERANCE" => Self::EndOfUtterance,
            "ON_CONVERSATION_TURN_FINISHED" => Self::ConversationTurnFinished,
            "ON_CONVERSATION_TURN_TIMEOUT" => Self::ConversationTurnTimeout,
            "ON_NO_RESPONSE" => Self::NoResponse,
            "ON_RECOGNIZING_SPEECH_FINISHED" => Self::RecognizingSpeechFinished,
            "ON_RESPONDING_STARTED" => Self::RespondingStarted,
            "ON_RESPONDING_FINISHED" => Self::RespondingFinished,
            "ON_MUTED_CHANGED" => Self::MutedChanged,
            "ON_ALERT_STARTED" => Self::AlertStarted,
            "ON_ALERT_FINISHED" => Self::AlertFinished,
            "ON_DEVICE_ACTION" => Self::DeviceAction,
            "ON_ASSISTANT_ERROR" => Self::AssistantError,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether this event closes a conversation turn
    #[must_use]
    pub const fn ends_turn(&self) -> bool {
        matches!(
            self,
            Self::ConversationTurnFinished | Self::ConversationTurnTimeout | Self::NoResponse
        )
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<EventType> for String {
    fn from(kind: EventType) -> Self {
        match kind {
            EventType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event from the assistant session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: EventType,

    /// Event arguments as reported by the assistant
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub args: serde_json::Value,
}

impl Event {
    /// Create an event without arguments
    #[must_use]
    pub const fn new(kind: EventType) -> Self {
        Self {
            kind,
            args: serde_json::Value::Null,
        }
    }

    /// Return this event with the given arguments
    #[must_use]
    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_null() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_parse() {
        assert_eq!(EventType::from_name("ON_END_OF_UTTERANCE"), EventType::EndOfUtterance);
        assert_eq!(EventType::from_name("ON_NO_RESPONSE"), EventType::NoResponse);
        assert_eq!(EventType::StartFinished.as_str(), "ON_START_FINISHED");
    }

    #[test]
    fn unknown_names_are_kept() {
        let kind = EventType::from_name("ON_SOMETHING_NEW");
        assert_eq!(kind, EventType::Other("ON_SOMETHING_NEW".to_string()));
        assert_eq!(kind.to_string(), "ON_SOMETHING_NEW");
    }

    #[test]
    fn decodes_event_with_args() {
        let event: Event = serde_json::from_str(
            r#"{"type": "ON_RECOGNIZING_SPEECH_FINISHED", "args": {"text": "what time is it"}}"#,
        )
        .unwrap();
        assert_eq!(event.kind, EventType::RecognizingSpeechFinished);
        assert_eq!(event.args["text"], "what time is it");
    }

    #[test]
    fn decodes_event_without_args() {
        let event: Event = serde_json::from_str(r#"{"type": "ON_START_FINISHED"}"#).unwrap();
        assert_eq!(event, Event::new(EventType::StartFinished));
    }

    #[test]
    fn unknown_event_survives_encoding() {
        let event = Event::new(EventType::from_name("ON_MEDIA_TRACK_LOAD"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ON_MEDIA_TRACK_LOAD");
        assert!(json.get("args").is_none());
    }

    #[test]
    fn turn_ending_events() {
        assert!(EventType::ConversationTurnFinished.ends_turn());
        assert!(EventType::ConversationTurnTimeout.ends_turn());
        assert!(EventType::NoResponse.ends_turn());
        assert!(!EventType::EndOfUtterance.ends_turn());
    }

    #[test]
    fn display_includes_args() {
        let event = Event::new(EventType::MutedChanged)
            .with_args(serde_json::json!({"is_muted": true}));
        assert_eq!(event.to_string(), r#"ON_MUTED_CHANGED: {"is_muted":true}"#);
    }
}
