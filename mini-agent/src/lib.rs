#![deny(missing_docs)]
//! # mini-agent — a multi-tenant conversational agent runtime
//!
//! [`Service`] is the uniform surface any front-end (CLI, HTTP, voice,
//! embedded) drives: it wraps a [`mini_agent_registry::Registry`] and maps
//! every operation in the external interface to a [`ServiceError`]. Pick a
//! storage backend from [`mini_agent_store_memory`] or
//! [`mini_agent_store_fs`], plug in a [`mini_agent_core::TurnService`], and
//! hand both to [`Service::new`].
//!
//! See [`prelude`] for the common import set.

mod service;
mod state_view;

pub use mini_agent_core::{
    Attachment, DerivedState, Event, EventPayload, LlmApiFormat, LlmConfig, RuntimeConfig,
    ServiceError,
};
pub use service::Service;
pub use state_view::StateView;

/// Common imports for building a runtime around [`Service`].
pub mod prelude {
    pub use crate::{Service, StateView};
    pub use mini_agent_core::{Event, EventPayload, RuntimeConfig, ServiceError};
    pub use mini_agent_store_fs::FsEventStore;
    pub use mini_agent_store_memory::InMemoryEventStore;
    pub use mini_agent_turn::{EchoTurnService, ScriptedStep, ScriptedTurnService};
}
