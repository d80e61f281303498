//! Cookie/session synchronization.
//!
//! [`CookieSync`] ties one session's state to the cookie store:
//!
//! - **hydrate**: copy a key's cookie into session state, at most once per session.
//! - **persist**: write the session value back to its cookie.
//! - **load_all** / **remove_all**: bulk variants over every namespaced cookie.
//! - **sync**: a scoped block that hydrates on entry and persists on every exit path.
//!
//! # Key lifecycle
//!
//! A key starts *cold*. Hydration marks it *loaded* in session state (whether or not a
//! cookie existed), after which later hydration calls are no-ops. That marker is what
//! stops a stale cookie from overwriting a value the user changed during the session.
//! Only the host resets it, by starting a fresh session.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use session_cookies::cookies::{CookieStore, InMemoryCookieStore};
//! use session_cookies::session::{InMemorySessionState, SessionState};
//! use session_cookies::sync::CookieSync;
//! use session_cookies::SyncConfig;
//!
//! let cookies = Arc::new(InMemoryCookieStore::new());
//! let session = Arc::new(InMemorySessionState::new());
//! let sync = CookieSync::new(cookies.clone(), session.clone(), SyncConfig::default()).unwrap();
//!
//! {
//!     let _guard = sync.sync(["my_number"]).unwrap();
//!     // UI interaction writes the widget value into session state
//!     session.set("my_number", json!(42));
//! }
//!
//! assert_eq!(cookies.get_cookie("st_cookie__my_number").unwrap().as_deref(), Some("NDI="));
//! ```

mod coordinator;
mod filter;
mod guard;

pub use coordinator::{CookieSync, Hydration};
pub use filter::LoadFilter;
pub use guard::SyncGuard;
