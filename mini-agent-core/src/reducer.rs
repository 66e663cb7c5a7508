//! The pure reducer: folds accepted events into derived conversational state.

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventPayload, LlmConfig};
use crate::id::EventId;

/// One message in the model-prompt sequence, derived from the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptMessage {
    /// Role the message was reduced from.
    pub role: PromptRole,
    /// Message text.
    pub content: String,
}

/// The role a [`PromptMessage`] plays in the prompt sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    /// Seeded via `SystemPrompt`.
    System,
    /// Reduced from `UserMessage`.
    User,
    /// Reduced from `AssistantMessage`.
    Assistant,
}

/// State derived by folding a session's event log. Never persisted directly
/// — always rebuildable from the log via [`reduce`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DerivedState {
    /// Ordered prompt messages, ready to hand to a language model.
    pub messages: Vec<PromptMessage>,
    /// Count of events ever reduced; equals the next event's `event_number`.
    pub next_event_number: u64,
    /// The most recently completed turn's number, if any.
    pub current_turn_number: u64,
    /// Id of the `TurnStarted` event for the in-flight turn, if any.
    pub turn_in_progress_event_id: Option<EventId>,
    /// The active language-model configuration, if one has been set.
    pub llm_config: Option<LlmConfig>,
}

impl DerivedState {
    /// `true` iff no turn is currently in flight, per derived state.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.turn_in_progress_event_id.is_none()
    }
}

/// Fold one event into a (cloned) derived state. Total: every event this
/// crate's codec can decode is a known variant, so there is no failure case.
#[must_use]
pub fn reduce_one(state: &DerivedState, event: &Event) -> DerivedState {
    let mut next = state.clone();
    next.next_event_number = state.next_event_number + 1;

    match &event.payload {
        EventPayload::SystemPrompt { content } => next.messages.push(PromptMessage {
            role: PromptRole::System,
            content: content.clone(),
        }),
        EventPayload::UserMessage { content, .. } => next.messages.push(PromptMessage {
            role: PromptRole::User,
            content: content.clone(),
        }),
        EventPayload::AssistantMessage { content } => next.messages.push(PromptMessage {
            role: PromptRole::Assistant,
            content: content.clone(),
        }),
        EventPayload::TextDelta { .. } => {
            // No effect on messages; only next_event_number advances.
        }
        EventPayload::SetLlmConfig(config) => next.llm_config = Some(config.clone()),
        EventPayload::TurnStarted { .. } => {
            next.turn_in_progress_event_id = Some(event.id.clone());
        }
        EventPayload::TurnCompleted { turn_number, .. } => {
            next.turn_in_progress_event_id = None;
            next.current_turn_number = *turn_number;
        }
        EventPayload::TurnFailed { .. } | EventPayload::TurnInterrupted { .. } => {
            next.turn_in_progress_event_id = None;
        }
        EventPayload::SessionStarted { .. } | EventPayload::SessionEnded { .. } => {
            // No effect beyond the event count already advanced above.
        }
    }

    next
}

/// Fold a sequence of events left-to-right, starting from `state`.
///
/// `reduce(reduce(s, xs), ys) == reduce(s, xs ++ ys)` holds structurally:
/// both sides are the same left fold over `xs` followed by `ys`.
#[must_use]
pub fn reduce(state: &DerivedState, events: &[Event]) -> DerivedState {
    events
        .iter()
        .fold(state.clone(), |acc, event| reduce_one(&acc, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SessionName;

    fn stamped(payload: EventPayload, n: u64) -> Event {
        let mut event = Event::unstamped(payload);
        event.stamp(&SessionName::new("s"), n, None);
        event
    }

    #[test]
    fn next_event_number_advances_by_one_per_event() {
        let events = vec![
            stamped(EventPayload::SystemPrompt { content: "sys".into() }, 0),
            stamped(
                EventPayload::UserMessage { content: "hi".into(), attachments: vec![] },
                1,
            ),
        ];
        let state = reduce(&DerivedState::default(), &events);
        assert_eq!(state.next_event_number, 2);
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn text_delta_advances_count_but_not_messages() {
        let events = vec![stamped(EventPayload::TextDelta { delta: "h".into() }, 0)];
        let state = reduce(&DerivedState::default(), &events);
        assert_eq!(state.next_event_number, 1);
        assert!(state.messages.is_empty());
    }

    #[test]
    fn turn_lifecycle_tracks_in_progress_id() {
        let started = stamped(EventPayload::TurnStarted { turn_number: 1 }, 0);
        let started_id = started.id.clone();
        let state = reduce_one(&DerivedState::default(), &started);
        assert_eq!(state.turn_in_progress_event_id, Some(started_id));
        assert!(!state.is_idle());

        let completed = stamped(
            EventPayload::TurnCompleted { turn_number: 1, duration_ms: 5 },
            1,
        );
        let state = reduce_one(&state, &completed);
        assert!(state.is_idle());
        assert_eq!(state.current_turn_number, 1);
    }

    #[test]
    fn fold_is_associative_across_split_batches() {
        let events = vec![
            stamped(EventPayload::UserMessage { content: "a".into(), attachments: vec![] }, 0),
            stamped(EventPayload::AssistantMessage { content: "b".into() }, 1),
            stamped(EventPayload::UserMessage { content: "c".into(), attachments: vec![] }, 2),
        ];

        let whole = reduce(&DerivedState::default(), &events);

        let (xs, ys) = events.split_at(1);
        let split = reduce(&reduce(&DerivedState::default(), xs), ys);

        assert_eq!(whole, split);
    }
}
