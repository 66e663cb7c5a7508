#![deny(missing_docs)]
//! The per-session actor: a single-consumer task owning one conversation's
//! event log, derived state, mailbox, broadcast fan-out, debounced turn
//! scheduling, and interruption.
//!
//! [`spawn`] starts the actor task and returns a [`SessionHandle`] once the
//! conversation's log has been loaded and `SessionStarted` emitted. Every
//! other crate in the workspace talks to a running session only through a
//! `SessionHandle` clone — the actor's own state never crosses a task
//! boundary directly.

mod actor;
mod command;
mod handle;

pub use actor::spawn;
pub use handle::{ActorGone, SessionHandle};
