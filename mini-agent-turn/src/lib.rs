#![deny(missing_docs)]
//! Test-double [`TurnService`] implementations.
//!
//! Neither type talks to a real language model — they exist so the rest of
//! the workspace (and downstream integrators wiring their own provider) can
//! exercise the session actor's turn lifecycle deterministically. A real
//! provider adapter would implement [`TurnService`] the same way these do:
//! build a [`TurnStream`] with [`async_stream::stream!`], yield zero or more
//! `TextDelta`s, then exactly one terminal `AssistantMessage`.

use std::sync::Mutex;

use mini_agent_core::{DerivedState, EventPayload, PromptRole, TurnError, TurnItem, TurnService, TurnStream};

/// Echoes the most recent user message back, one word at a time as
/// `TextDelta`s, followed by an `AssistantMessage` with the full text.
///
/// Grounded in the same idea as a Turn that returns its input message
/// unchanged, adapted here to the streaming oracle shape: the echo happens
/// incrementally instead of as a single reply.
pub struct EchoTurnService;

impl TurnService for EchoTurnService {
    fn execute(&self, state: &DerivedState) -> TurnStream {
        let reply = last_user_message(state).unwrap_or_default();
        Box::pin(async_stream::stream! {
            let mut acc = String::new();
            let mut words = reply.split_inclusive(' ').peekable();
            if words.peek().is_none() && !reply.is_empty() {
                yield Ok(EventPayload::TextDelta { delta: reply.clone() });
                acc = reply.clone();
            } else {
                for word in words {
                    acc.push_str(word);
                    yield Ok(EventPayload::TextDelta { delta: word.to_string() });
                }
            }
            yield Ok(EventPayload::AssistantMessage { content: acc });
        })
    }
}

fn last_user_message(state: &DerivedState) -> Option<String> {
    state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == PromptRole::User)
        .map(|m| m.content.clone())
}

/// One step of a [`ScriptedTurnService`]'s pre-built response.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Yield a successful event.
    Event(EventPayload),
    /// Yield a terminal error and stop the stream.
    Fail(TurnError),
}

/// A deterministic test double that replays a fixed sequence of steps,
/// ignoring the derived state entirely. Each call to `execute` consumes the
/// next queued script (FIFO); calling it more times than scripts were
/// queued panics, since that indicates a test invoked a turn it didn't
/// expect.
pub struct ScriptedTurnService {
    scripts: Mutex<std::collections::VecDeque<Vec<ScriptedStep>>>,
}

impl ScriptedTurnService {
    /// Build a scripted double from an ordered list of per-turn scripts.
    #[must_use]
    pub fn new(scripts: Vec<Vec<ScriptedStep>>) -> Self {
        Self { scripts: Mutex::new(scripts.into_iter().collect()) }
    }

    /// Convenience constructor for a single scripted turn, reused as many
    /// times as `execute` is called.
    #[must_use]
    pub fn repeating(script: Vec<ScriptedStep>) -> Self {
        Self { scripts: Mutex::new(std::iter::repeat(script).take(1024).collect()) }
    }
}

impl TurnService for ScriptedTurnService {
    fn execute(&self, _state: &DerivedState) -> TurnStream {
        let steps = {
            let mut scripts = self.scripts.lock().expect("scripted turn service mutex poisoned");
            scripts.pop_front().expect("ScriptedTurnService ran out of queued scripts")
        };
        Box::pin(async_stream::stream! {
            for step in steps {
                let item: TurnItem = match step {
                    ScriptedStep::Event(payload) => Ok(payload),
                    ScriptedStep::Fail(err) => Err(err),
                };
                let is_err = item.is_err();
                yield item;
                if is_err {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mini_agent_core::PromptMessage;

    fn state_with_user_message(text: &str) -> DerivedState {
        let mut state = DerivedState::default();
        state.messages.push(PromptMessage { role: PromptRole::User, content: text.to_string() });
        state
    }

    #[tokio::test]
    async fn echo_turn_streams_deltas_then_assistant_message() {
        let service = EchoTurnService;
        let state = state_with_user_message("hello world");
        let items: Vec<_> = service.execute(&state).collect().await;

        let deltas: Vec<_> = items
            .iter()
            .take(items.len() - 1)
            .map(|i| match i.as_ref().unwrap() {
                EventPayload::TextDelta { delta } => delta.clone(),
                other => panic!("expected TextDelta, got {other:?}"),
            })
            .collect();
        assert_eq!(deltas.join(""), "hello world");

        match items.last().unwrap().as_ref().unwrap() {
            EventPayload::AssistantMessage { content } => assert_eq!(content, "hello world"),
            other => panic!("expected AssistantMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn echo_turn_with_no_user_message_replies_empty() {
        let service = EchoTurnService;
        let state = DerivedState::default();
        let items: Vec<_> = service.execute(&state).collect().await;
        assert_eq!(items.len(), 1);
        match items[0].as_ref().unwrap() {
            EventPayload::AssistantMessage { content } => assert!(content.is_empty()),
            other => panic!("expected AssistantMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scripted_turn_replays_exact_sequence() {
        let service = ScriptedTurnService::new(vec![vec![
            ScriptedStep::Event(EventPayload::TextDelta { delta: "hi".into() }),
            ScriptedStep::Event(EventPayload::AssistantMessage { content: "hi".into() }),
        ]]);
        let state = DerivedState::default();
        let items: Vec<_> = service.execute(&state).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].as_ref().unwrap().tag() == "AssistantMessage");
    }

    #[tokio::test]
    async fn scripted_turn_stops_at_failure() {
        let service = ScriptedTurnService::new(vec![vec![
            ScriptedStep::Event(EventPayload::TextDelta { delta: "partial".into() }),
            ScriptedStep::Fail(TurnError::new("test-provider", "boom")),
            ScriptedStep::Event(EventPayload::AssistantMessage { content: "unreachable".into() }),
        ]]);
        let state = DerivedState::default();
        let items: Vec<_> = service.execute(&state).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }

    #[test]
    fn turn_services_implement_trait_object_safely() {
        fn _assert_turn_service<T: TurnService>() {}
        _assert_turn_service::<EchoTurnService>();
        _assert_turn_service::<ScriptedTurnService>();
    }
}
