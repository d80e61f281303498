pub mod codec;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod namespace;
pub mod session;
pub mod sync;

pub use codec::Value;
pub use config::{DecodeFailurePolicy, SyncConfig};
pub use errors::{CodecError, Result, SyncError};
pub use namespace::{CookieKey, KeyNamespacer};
pub use sync::{CookieSync, Hydration, LoadFilter, SyncGuard};
