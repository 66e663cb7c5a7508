//! The event model: a sealed tagged union of conversation events plus the
//! identity envelope every event carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{EventId, SessionName};

/// One accepted event in a session's log (or broadcast).
///
/// Identity fields are stamped by the session actor on ingest, never by the
/// producer — a [`crate::turn::TurnService`] emits [`EventPayload`] values
/// with placeholder identity that the actor re-stamps before persistence and
/// broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Globally-unique id, `{session_name}#{event_number}`.
    pub id: EventId,
    /// 0-based, dense, strictly-monotonic position in the log.
    pub event_number: u64,
    /// Wall-clock time the event was accepted.
    pub timestamp: DateTime<Utc>,
    /// The owning session.
    pub session_name: SessionName,
    /// The event this one logically follows, if any (e.g. a turn's terminal
    /// event points back at its `TurnStarted`).
    pub parent_id: Option<EventId>,
    /// Whether accepting this event should schedule a model turn.
    pub triggers_turn: bool,
    /// The tagged payload.
    pub payload: EventPayload,
}

impl Event {
    /// Construct an event with placeholder identity, to be stamped later by
    /// the session actor. Used by producers (callers, turn services) that
    /// don't know their position in the log yet.
    #[must_use]
    pub fn unstamped(payload: EventPayload) -> Self {
        let triggers_turn = payload.triggers_turn();
        Self {
            id: EventId::new(""),
            event_number: 0,
            timestamp: Utc::now(),
            session_name: SessionName::new(""),
            parent_id: None,
            triggers_turn,
            payload,
        }
    }

    /// Stamp identity fields in place, as the session actor does on ingest.
    pub fn stamp(
        &mut self,
        session_name: &SessionName,
        event_number: u64,
        parent_id: Option<EventId>,
    ) {
        self.id = EventId::for_position(session_name, event_number);
        self.event_number = event_number;
        self.timestamp = Utc::now();
        self.session_name = session_name.clone();
        self.parent_id = parent_id;
    }

    /// Whether this payload is persisted. Only `TextDelta` is ephemeral.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !matches!(self.payload, EventPayload::TextDelta { .. })
    }
}

/// An attachment reference carried on a `UserMessage`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Attachment identifier or URI, opaque to the core.
    pub reference: String,
    /// Optional MIME type.
    pub mime_type: Option<String>,
}

/// Which wire dialect the turn service should speak to the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum LlmApiFormat {
    /// OpenAI's Responses API.
    OpenAiResponses,
    /// OpenAI's Chat Completions API.
    OpenAiChatCompletions,
    /// Anthropic's Messages API.
    Anthropic,
    /// Google Gemini's generateContent API.
    Gemini,
}

/// A change to the active language-model configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmConfig {
    /// Wire dialect to speak.
    pub api_format: LlmApiFormat,
    /// Model identifier, provider-specific.
    pub model: String,
    /// Override base URL, if not the provider default.
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
}

/// Why a turn was interrupted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum InterruptReason {
    /// A new triggering event arrived while the turn was running.
    NewInput,
    /// `interrupt_turn` was called explicitly.
    Explicit,
    /// The session was ending.
    SessionEnding,
}

/// Why a session ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionEndReason {
    /// `end_session` was called, whether directly or via the registry's
    /// `shutdown`/`shutdown_all`, both of which route through it.
    Requested,
}

/// The sealed tag set of conversation events.
///
/// Internally tagged (`type` discriminator) so decoders reject unknown tags
/// by construction — there is no open class hierarchy to extend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
#[non_exhaustive]
pub enum EventPayload {
    /// Seeds the conversation with a system prompt.
    SystemPrompt {
        /// The system prompt text.
        content: String,
    },
    /// A message from the user. Always `triggers_turn`.
    UserMessage {
        /// The message text.
        content: String,
        /// Optional attachments.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
    },
    /// A durable final assistant reply for a turn.
    AssistantMessage {
        /// The reply text.
        content: String,
    },
    /// An ephemeral incremental chunk of an assistant reply. Broadcast but
    /// never persisted.
    TextDelta {
        /// The incremental text.
        delta: String,
    },
    /// A change to the active language-model configuration.
    SetLlmConfig(LlmConfig),
    /// The session actor attached and loaded its log.
    SessionStarted {
        /// Number of events loaded from the store before this one.
        loaded_event_count: u64,
    },
    /// The session actor is stopping.
    SessionEnded {
        /// Why the session ended.
        reason: SessionEndReason,
    },
    /// A new turn began.
    TurnStarted {
        /// 1-based turn counter value.
        turn_number: u64,
    },
    /// A turn finished successfully.
    TurnCompleted {
        /// The turn that completed.
        turn_number: u64,
        /// Wall-clock duration of the turn, in milliseconds.
        duration_ms: u64,
    },
    /// A turn failed after the turn service's own retries.
    TurnFailed {
        /// The turn that failed.
        turn_number: u64,
        /// Human-readable failure description.
        error: String,
    },
    /// A turn was cancelled before completion.
    TurnInterrupted {
        /// The turn that was cancelled.
        turn_number: u64,
        /// Text accumulated from `TextDelta`s before cancellation.
        partial_response: String,
        /// Why the turn was interrupted.
        reason: InterruptReason,
    },
}

impl EventPayload {
    /// Whether accepting this payload should schedule a model turn.
    #[must_use]
    pub fn triggers_turn(&self) -> bool {
        matches!(self, EventPayload::UserMessage { .. })
    }

    /// Short tag name, for logging.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            EventPayload::SystemPrompt { .. } => "SystemPrompt",
            EventPayload::UserMessage { .. } => "UserMessage",
            EventPayload::AssistantMessage { .. } => "AssistantMessage",
            EventPayload::TextDelta { .. } => "TextDelta",
            EventPayload::SetLlmConfig(_) => "SetLlmConfig",
            EventPayload::SessionStarted { .. } => "SessionStarted",
            EventPayload::SessionEnded { .. } => "SessionEnded",
            EventPayload::TurnStarted { .. } => "TurnStarted",
            EventPayload::TurnCompleted { .. } => "TurnCompleted",
            EventPayload::TurnFailed { .. } => "TurnFailed",
            EventPayload::TurnInterrupted { .. } => "TurnInterrupted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_envelope_roundtrips_through_json() {
        let mut event = Event::unstamped(EventPayload::UserMessage {
            content: "hi".into(),
            attachments: vec![],
        });
        event.stamp(&SessionName::new("alpha"), 3, None);

        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.event_number, 3);
        assert_eq!(decoded.session_name, SessionName::new("alpha"));
        assert_eq!(decoded.payload, event.payload);
    }

    #[test]
    fn unknown_tag_is_rejected_on_decode() {
        let json = r#"{"type":"NotARealVariant"}"#;
        let result: Result<EventPayload, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn user_message_triggers_turn_text_delta_does_not() {
        assert!(
            EventPayload::UserMessage {
                content: "x".into(),
                attachments: vec![],
            }
            .triggers_turn()
        );
        assert!(!EventPayload::TextDelta { delta: "x".into() }.triggers_turn());
    }

    #[test]
    fn only_text_delta_is_ephemeral() {
        let persisted = Event::unstamped(EventPayload::AssistantMessage { content: "hi".into() });
        let ephemeral = Event::unstamped(EventPayload::TextDelta { delta: "h".into() });
        assert!(persisted.is_persisted());
        assert!(!ephemeral.is_persisted());
    }
}
