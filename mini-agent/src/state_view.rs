//! The `GetState` response shape from the external interface — a flattened,
//! front-end-friendly projection of [`mini_agent_core::DerivedState`].

use mini_agent_core::DerivedState;
use serde::Serialize;

/// Snapshot of a session's derived state, shaped for the external
/// `GetState` operation.
#[derive(Debug, Clone, Serialize)]
pub struct StateView {
    /// Count of events ever reduced for this session.
    pub next_event_number: u64,
    /// The most recently completed turn's number.
    pub current_turn_number: u64,
    /// Ordered prompt messages, ready to hand to a language model.
    pub messages: Vec<mini_agent_core::PromptMessage>,
    /// Whether an LLM config has been set for this session.
    pub has_llm_config: bool,
    /// Whether a turn is currently in flight.
    pub turn_in_progress: bool,
}

impl From<DerivedState> for StateView {
    fn from(state: DerivedState) -> Self {
        Self {
            next_event_number: state.next_event_number,
            current_turn_number: state.current_turn_number,
            turn_in_progress: !state.is_idle(),
            has_llm_config: state.llm_config.is_some(),
            messages: state.messages,
        }
    }
}
