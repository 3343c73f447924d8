//! Per-user shopping dialogue state machine
//!
//! Elm Architecture: a pure transition function over (session, event)
//! producing a new session plus effects for the runtime to execute.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Action, ActionParseError, ActionPayload, Event, RemoteOp};
pub use state::{Session, SessionContext, ShopState};
pub use transition::{is_valid_email, transition, TransitionError};
