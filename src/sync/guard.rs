use crate::errors::Result;
use crate::namespace::CookieKey;
use crate::sync::CookieSync;

/// Scoped sync block returned by [`CookieSync::sync`].
///
/// The listed keys are persisted exactly once when the block ends: either through
/// [`finish`](Self::finish), which reports failures, or on drop (early return, `?`,
/// panic), where failures can only be logged.
#[must_use = "dropping the guard immediately persists the keys before any UI code runs"]
pub struct SyncGuard<'a> {
    sync: &'a CookieSync,
    keys: Vec<CookieKey>,
    finished: bool,
}

impl<'a> SyncGuard<'a> {
    pub(crate) fn new(sync: &'a CookieSync, keys: Vec<CookieKey>) -> Self {
        Self {
            sync,
            keys,
            finished: false,
        }
    }

    /// Cookie keys covered by this block, in persist order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(CookieKey::as_str)
    }

    /// Ends the block and persists every key, returning the first failure.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.sync.persist_keys(&self.keys)
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(e) = self.sync.persist_keys(&self.keys) {
            log::warn!("scoped sync could not persist on exit: {}", e);
        }
    }
}
