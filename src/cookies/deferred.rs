use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use indexmap::IndexMap;

use crate::cookies::{CookieStore, CookieStoreHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingWrite {
    Set { name: String, value: String },
    Remove { name: String },
}

/// A `CookieStore` decorator that holds back writes until [`flush`](Self::flush).
///
/// Reads are served by the inner store only, so a write is invisible until it has been
/// flushed. This mirrors hosts that ship cookie writes to the browser at the end of a
/// run and only see them in the next request.
pub struct DeferredCookieStore {
    inner: CookieStoreHandle,
    pending: Mutex<Vec<PendingWrite>>,
}

impl DeferredCookieStore {
    pub fn new(inner: CookieStoreHandle) -> Self {
        Self {
            inner,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Number of writes waiting to be applied.
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Applies all queued writes to the inner store, in the order they were made.
    ///
    /// Stops at the first failing write; that write and the ones after it stay queued.
    pub fn flush(&self) -> Result<usize> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut applied = 0;
        let mut failure = None;

        for write in pending.iter() {
            let outcome = match write {
                PendingWrite::Set { name, value } => self.inner.set_cookie(name, value),
                PendingWrite::Remove { name } => self.inner.remove_cookie(name),
            };
            if let Err(e) = outcome {
                failure = Some(e);
                break;
            }
            applied += 1;
        }

        pending.drain(..applied);
        match failure {
            Some(e) => Err(e),
            None => {
                log::debug!("flushed {} deferred cookie writes", applied);
                Ok(applied)
            }
        }
    }

    fn push(&self, write: PendingWrite) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(write);
    }
}

impl CookieStore for DeferredCookieStore {
    fn all_cookies(&self) -> Result<IndexMap<String, String>> {
        self.inner.all_cookies()
    }

    fn set_cookie(&self, name: &str, value: &str) -> Result<()> {
        self.push(PendingWrite::Set {
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_cookie(&self, name: &str) -> Result<()> {
        self.push(PendingWrite::Remove {
            name: name.to_string(),
        });
        Ok(())
    }

    fn get_cookie(&self, name: &str) -> Result<Option<String>> {
        self.inner.get_cookie(name)
    }
}
