//! Session state: the per-session, in-memory key/value container of the host.
//!
//! - [`SessionState`]: trait the coordinator reads and writes through.
//! - [`InMemorySessionState`]: a single session's values.
//! - [`InMemorySessionStore`]: hands out one isolated state per [`SessionId`].

mod in_memory;
mod state;

pub use in_memory::{InMemorySessionState, InMemorySessionStore, SessionId};
pub use state::{SessionState, SessionStateHandle};
