//! Cookies: the [`CookieStore`] boundary and reference stores.
//!
//! The host environment owns the actual cookie transport. This crate only needs to list,
//! set and remove name/value pairs, which is what [`CookieStore`] describes. The stores
//! exported here cover tests and simple hosts:
//!
//! - [`InMemoryCookieStore`]: a plain map, optionally seeded from a request `Cookie` header.
//! - [`DeferredCookieStore`]: queues writes until flushed, like a browser that applies
//!   cookie writes after the current run has finished.
//! - [`SharedCookieStore`]: lazily creates one store handle and hands it to every session.

mod deferred;
mod in_memory;
mod shared;
mod store;

pub use deferred::DeferredCookieStore;
pub use in_memory::InMemoryCookieStore;
pub use shared::SharedCookieStore;
pub use store::{CookieStore, CookieStoreHandle};
