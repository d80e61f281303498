use std::collections::HashSet;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{self, Value};
use crate::config::{DecodeFailurePolicy, SyncConfig};
use crate::cookies::CookieStoreHandle;
use crate::errors::{CodecError, Result, SyncError};
use crate::namespace::{CookieKey, KeyNamespacer};
use crate::session::{SessionState, SessionStateHandle};
use crate::sync::{LoadFilter, SyncGuard};

/// Result of a single [`CookieSync::hydrate`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Hydration {
    /// The key was hydrated earlier this session; the cookie was not read.
    AlreadyLoaded,
    /// The cookie was decoded and written into session state.
    Loaded(Value),
    /// No cookie exists for the key. Session state was left alone.
    Absent,
    /// The cookie could not be decoded. Session state was left alone.
    Corrupt,
}

/// Synchronizes one session's state with the namespaced cookies of its browser.
///
/// The coordinator keeps no state of its own: cookies live in the [`CookieStore`],
/// values and loaded markers in the [`SessionState`]. Constructing one per run is cheap.
///
/// Every method accepts raw state keys (`"volume"`) and namespaced cookie keys
/// (`"st_cookie__volume"`) interchangeably.
///
/// [`CookieStore`]: crate::cookies::CookieStore
pub struct CookieSync {
    cookies: CookieStoreHandle,
    session: SessionStateHandle,
    namespacer: KeyNamespacer,
    config: SyncConfig,
}

impl CookieSync {
    pub fn new(
        cookies: CookieStoreHandle,
        session: SessionStateHandle,
        config: SyncConfig,
    ) -> Result<Self> {
        let namespacer = KeyNamespacer::new(config.key_prefix.clone())?;
        Ok(Self {
            cookies,
            session,
            namespacer,
            config,
        })
    }

    pub fn namespacer(&self) -> &KeyNamespacer {
        &self.namespacer
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStateHandle {
        &self.session
    }

    pub fn cookies(&self) -> &CookieStoreHandle {
        &self.cookies
    }

    /// True once `key` has been hydrated (or found absent) in this session.
    pub fn is_loaded(&self, key: &str) -> Result<bool> {
        let cookie_key = self.namespacer.wrap(key)?;
        Ok(self.is_marked(&cookie_key))
    }

    /// Copies the cookie for `key` into session state, at most once per session.
    ///
    /// Absent and corrupt cookies leave session state untouched but still mark the key
    /// as loaded, so a later run never replaces a value the user has changed since.
    /// Under [`DecodeFailurePolicy::Raise`] a corrupt cookie is returned as an error
    /// instead and the key stays unloaded.
    pub fn hydrate(&self, key: &str) -> Result<Hydration> {
        let cookie_key = self.namespacer.wrap(key)?;
        if self.is_marked(&cookie_key) {
            return Ok(Hydration::AlreadyLoaded);
        }

        let raw = self
            .cookies
            .get_cookie(cookie_key.as_str())
            .map_err(SyncError::Store)?;
        self.hydrate_from(&cookie_key, raw.as_deref())
    }

    /// Hydrates every namespaced cookie that passes `filter` and returns the values that
    /// this call wrote into session state, in processing order.
    ///
    /// All selected cookies are decoded before session state is touched, so under
    /// [`DecodeFailurePolicy::Raise`] one corrupt cookie fails the whole call and no key
    /// is hydrated or marked.
    pub fn load_all(&self, filter: &LoadFilter) -> Result<IndexMap<String, Value>> {
        let cookies = self.cookies.all_cookies().map_err(SyncError::Store)?;

        let names: Vec<String> = match &filter.keep {
            Some(keep) => {
                let mut names = Vec::with_capacity(keep.len());
                for key in keep {
                    let cookie_key = self.namespacer.wrap(key)?;
                    if cookies.contains_key(cookie_key.as_str()) {
                        names.push(cookie_key.into_inner());
                    }
                }
                names
            }
            None => cookies
                .keys()
                .filter(|name| self.namespacer.is_namespaced(name))
                .cloned()
                .collect(),
        };

        let ignore: HashSet<&str> = filter
            .ignore
            .iter()
            .map(|key| self.namespacer.unwrap(key))
            .collect();

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            let cookie_key = match self.namespacer.wrap(&name) {
                Ok(cookie_key) => cookie_key,
                Err(e) => {
                    log::warn!("skipping cookie '{}': {}", name, e);
                    continue;
                }
            };
            let state_key = self.namespacer.unwrap(cookie_key.as_str());
            if ignore.contains(state_key)
                || self.is_marked(&cookie_key)
                || !seen.insert(cookie_key.clone())
            {
                continue;
            }

            let raw = cookies.get(cookie_key.as_str()).map(String::as_str);
            let outcome = self.resolve(&cookie_key, raw)?;
            resolved.push((cookie_key, outcome));
        }

        let mut loaded = IndexMap::new();
        for (cookie_key, outcome) in resolved {
            if let Hydration::Loaded(value) = self.commit(&cookie_key, outcome) {
                loaded.insert(self.namespacer.unwrap(cookie_key.as_str()).to_string(), value);
            }
        }

        log::debug!("loaded {} cookies into session state", loaded.len());
        Ok(loaded)
    }

    /// Writes the current session value of `key` to its cookie.
    pub fn persist(&self, key: &str) -> Result<()> {
        let cookie_key = self.namespacer.wrap(key)?;
        let state_key = self.namespacer.unwrap(cookie_key.as_str());
        let value = self
            .session
            .get(state_key)
            .ok_or_else(|| SyncError::MissingState(state_key.to_string()))?;
        self.write_cookie(&cookie_key, &codec::encode(&value)?)
    }

    /// Same as [`persist`](Self::persist).
    pub fn update(&self, key: &str) -> Result<()> {
        self.persist(key)
    }

    /// Reads and decodes the cookie for `key` without touching session state.
    ///
    /// A corrupt cookie reads as `None` (with a warning) unless the decode policy is
    /// [`DecodeFailurePolicy::Raise`].
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let cookie_key = self.namespacer.wrap(key)?;
        match self
            .cookies
            .get_cookie(cookie_key.as_str())
            .map_err(SyncError::Store)?
        {
            Some(raw) => self.decode_cookie(&cookie_key, &raw),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get), deserializing into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SyncError::Serialization(CodecError::Json(e))),
            None => Ok(None),
        }
    }

    /// Encodes `value` and writes it to the cookie for `key`. Session state is not changed.
    pub fn set(&self, key: &str, value: &Value) -> Result<()> {
        let cookie_key = self.namespacer.wrap(key)?;
        self.write_cookie(&cookie_key, &codec::encode(value)?)
    }

    /// Like [`set`](Self::set) for any serializable value.
    pub fn set_from<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let cookie_key = self.namespacer.wrap(key)?;
        self.write_cookie(&cookie_key, &codec::encode_from(value)?)
    }

    /// Removes the cookie for `key`. Session state is not changed.
    pub fn remove(&self, key: &str) -> Result<()> {
        let cookie_key = self.namespacer.wrap(key)?;
        self.cookies
            .remove_cookie(cookie_key.as_str())
            .map_err(SyncError::Store)?;
        log::debug!("removed cookie '{}'", cookie_key);
        Ok(())
    }

    /// Removes every namespaced cookie and returns their names. Cookies outside the
    /// namespace and session state are left alone.
    pub fn remove_all(&self) -> Result<Vec<String>> {
        let names: Vec<String> = self
            .cookies
            .all_cookies()
            .map_err(SyncError::Store)?
            .into_keys()
            .filter(|name| self.namespacer.is_namespaced(name))
            .collect();

        for name in &names {
            self.cookies.remove_cookie(name).map_err(SyncError::Store)?;
        }

        log::debug!("removed {} namespaced cookies", names.len());
        Ok(names)
    }

    /// Returns every namespaced cookie, decoded and keyed by state key. Corrupt cookies
    /// are skipped unless the decode policy is [`DecodeFailurePolicy::Raise`].
    pub fn get_all(&self) -> Result<IndexMap<String, Value>> {
        let mut all = IndexMap::new();
        for (name, raw) in self.cookies.all_cookies().map_err(SyncError::Store)? {
            if !self.namespacer.is_namespaced(&name) {
                continue;
            }
            let cookie_key = match self.namespacer.wrap(&name) {
                Ok(cookie_key) => cookie_key,
                Err(e) => {
                    log::warn!("skipping cookie '{}': {}", name, e);
                    continue;
                }
            };
            if let Some(value) = self.decode_cookie(&cookie_key, &raw)? {
                all.insert(self.namespacer.unwrap(cookie_key.as_str()).to_string(), value);
            }
        }
        Ok(all)
    }

    /// Opens a scoped sync block over `keys`.
    ///
    /// Each key is hydrated now; when the returned guard is finished or dropped, each
    /// key's session value is persisted, in the order given. Invalid keys are rejected
    /// before anything is hydrated.
    pub fn sync<I, S>(&self, keys: I) -> Result<SyncGuard<'_>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|key| self.namespacer.wrap(key.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        for cookie_key in &keys {
            self.hydrate(cookie_key.as_str())?;
        }

        Ok(SyncGuard::new(self, keys))
    }

    /// Runs `f` inside a scoped sync block over `keys`.
    ///
    /// The keys are persisted after `f` returns, whatever it returns (and during
    /// unwinding if it panics). An error from `f` is reported in preference to a
    /// persist error.
    pub fn with_sync<I, S, F, T, E>(&self, keys: I, f: F) -> std::result::Result<T, E>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnOnce(&dyn SessionState) -> std::result::Result<T, E>,
        E: From<SyncError>,
    {
        let guard = self.sync(keys)?;
        let result = f(self.session.as_ref());
        let persisted = guard.finish();
        let value = result?;
        persisted?;
        Ok(value)
    }

    /// Persists each key in order. Every key is attempted; the first error is returned.
    pub(crate) fn persist_keys(&self, keys: &[CookieKey]) -> Result<()> {
        let mut first_error = None;
        for cookie_key in keys {
            if let Err(e) = self.persist(cookie_key.as_str()) {
                log::warn!("failed to persist '{}': {}", cookie_key, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn hydrate_from(&self, cookie_key: &CookieKey, raw: Option<&str>) -> Result<Hydration> {
        let outcome = self.resolve(cookie_key, raw)?;
        Ok(self.commit(cookie_key, outcome))
    }

    /// Decodes a cookie into the hydration outcome without touching session state.
    fn resolve(&self, cookie_key: &CookieKey, raw: Option<&str>) -> Result<Hydration> {
        Ok(match raw {
            None => Hydration::Absent,
            Some(raw) => match self.decode_cookie(cookie_key, raw)? {
                Some(value) => Hydration::Loaded(value),
                None => Hydration::Corrupt,
            },
        })
    }

    /// Writes a resolved outcome into session state and marks the key loaded.
    fn commit(&self, cookie_key: &CookieKey, outcome: Hydration) -> Hydration {
        let state_key = self.namespacer.unwrap(cookie_key.as_str());
        if let Hydration::Loaded(value) = &outcome {
            self.session.set(state_key, value.clone());
        }

        self.session.set(&self.marker(cookie_key), Value::Bool(true));
        log::debug!("hydrated '{}': {:?}", state_key, outcome);
        outcome
    }

    fn decode_cookie(&self, cookie_key: &CookieKey, raw: &str) -> Result<Option<Value>> {
        match codec::decode(raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => match self.config.decode_failure {
                DecodeFailurePolicy::Ignore => {
                    log::warn!("ignoring corrupt cookie '{}': {}", cookie_key, e);
                    Ok(None)
                }
                DecodeFailurePolicy::Raise => Err(e.into()),
            },
        }
    }

    fn write_cookie(&self, cookie_key: &CookieKey, encoded: &str) -> Result<()> {
        self.cookies
            .set_cookie(cookie_key.as_str(), encoded)
            .map_err(SyncError::Store)?;
        log::debug!("persisted cookie '{}'", cookie_key);
        Ok(())
    }

    fn marker(&self, cookie_key: &CookieKey) -> String {
        self.namespacer
            .loaded_marker(cookie_key, &self.config.loaded_marker_suffix)
    }

    fn is_marked(&self, cookie_key: &CookieKey) -> bool {
        self.session.has(&self.marker(cookie_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{CookieStore, DeferredCookieStore, InMemoryCookieStore};
    use crate::session::{InMemorySessionState, InMemorySessionStore, SessionId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Counts reads so tests can tell whether the cookie store was consulted.
    #[derive(Default)]
    struct CountingCookieStore {
        inner: InMemoryCookieStore,
        reads: AtomicUsize,
    }

    impl CountingCookieStore {
        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl CookieStore for CountingCookieStore {
        fn all_cookies(&self) -> anyhow::Result<IndexMap<String, String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.all_cookies()
        }
        fn set_cookie(&self, name: &str, value: &str) -> anyhow::Result<()> {
            self.inner.set_cookie(name, value)
        }
        fn remove_cookie(&self, name: &str) -> anyhow::Result<()> {
            self.inner.remove_cookie(name)
        }
        fn get_cookie(&self, name: &str) -> anyhow::Result<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_cookie(name)
        }
    }

    struct BrokenCookieStore;

    impl CookieStore for BrokenCookieStore {
        fn all_cookies(&self) -> anyhow::Result<IndexMap<String, String>> {
            anyhow::bail!("cookie bridge unavailable")
        }
        fn set_cookie(&self, _name: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("cookie bridge unavailable")
        }
        fn remove_cookie(&self, _name: &str) -> anyhow::Result<()> {
            anyhow::bail!("cookie bridge unavailable")
        }
    }

    fn setup() -> (Arc<InMemoryCookieStore>, Arc<InMemorySessionState>, CookieSync) {
        init_logging();
        let cookies = Arc::new(InMemoryCookieStore::new());
        let session = Arc::new(InMemorySessionState::new());
        let sync = CookieSync::new(cookies.clone(), session.clone(), SyncConfig::default()).unwrap();
        (cookies, session, sync)
    }

    fn fresh_session(cookies: Arc<dyn CookieStore>) -> (Arc<InMemorySessionState>, CookieSync) {
        let session = Arc::new(InMemorySessionState::new());
        let sync = CookieSync::new(cookies, session.clone(), SyncConfig::default()).unwrap();
        (session, sync)
    }

    #[test]
    fn persisted_number_hydrates_as_integer_in_new_session() {
        let (cookies, session, sync) = setup();
        session.set("my_number", json!(42));
        sync.persist("my_number").unwrap();

        let raw = cookies.get_cookie("st_cookie__my_number").unwrap().unwrap();
        assert_eq!(raw, codec::encode(&json!(42)).unwrap());

        let (next_session, next_sync) = fresh_session(cookies);
        assert_eq!(next_sync.hydrate("my_number").unwrap(), Hydration::Loaded(json!(42)));
        let value = next_session.get("my_number").unwrap();
        assert!(value.is_u64());
        assert_eq!(value, json!(42));
    }

    #[test]
    fn hydrate_reads_cookie_only_once() {
        init_logging();
        let cookies = Arc::new(CountingCookieStore::default());
        cookies.set_cookie("st_cookie__k", &codec::encode(&json!("first")).unwrap()).unwrap();
        let (session, sync) = fresh_session(cookies.clone());

        assert_eq!(sync.hydrate("k").unwrap(), Hydration::Loaded(json!("first")));
        assert_eq!(cookies.reads(), 1);

        cookies.set_cookie("st_cookie__k", &codec::encode(&json!("second")).unwrap()).unwrap();
        assert_eq!(sync.hydrate("k").unwrap(), Hydration::AlreadyLoaded);
        assert_eq!(cookies.reads(), 1);
        assert_eq!(session.get("k"), Some(json!("first")));
    }

    #[test]
    fn stale_cookie_does_not_clobber_session_value() {
        let (cookies, session, sync) = setup();
        cookies.set_cookie("st_cookie__name", &codec::encode(&json!("stale")).unwrap()).unwrap();

        sync.hydrate("name").unwrap();
        session.set("name", json!("typed by user"));
        assert_eq!(sync.hydrate("name").unwrap(), Hydration::AlreadyLoaded);
        assert_eq!(session.get("name"), Some(json!("typed by user")));
    }

    #[test]
    fn absent_cookie_marks_key_loaded_without_default() {
        let (cookies, session, sync) = setup();

        assert_eq!(sync.hydrate("later").unwrap(), Hydration::Absent);
        assert!(!session.has("later"));
        assert!(sync.is_loaded("later").unwrap());

        // a cookie showing up later in the same session is not picked up
        cookies.set_cookie("st_cookie__later", &codec::encode(&json!(1)).unwrap()).unwrap();
        assert_eq!(sync.hydrate("later").unwrap(), Hydration::AlreadyLoaded);
        assert!(!session.has("later"));
    }

    #[test]
    fn corrupt_cookie_reads_as_absent() {
        let (cookies, session, sync) = setup();
        cookies.set_cookie("st_cookie__bad", "%%% not base64").unwrap();

        assert_eq!(sync.get("bad").unwrap(), None);
        assert_eq!(sync.hydrate("bad").unwrap(), Hydration::Corrupt);
        assert!(!session.has("bad"));
        assert!(sync.is_loaded("bad").unwrap());
    }

    #[test]
    fn corrupt_cookie_raises_when_configured() {
        init_logging();
        let cookies = Arc::new(InMemoryCookieStore::new());
        cookies.set_cookie("st_cookie__bad", "bm90IGpzb24=").unwrap();
        let session = Arc::new(InMemorySessionState::new());
        let config = SyncConfig::default().with_decode_failure(DecodeFailurePolicy::Raise);
        let sync = CookieSync::new(cookies, session, config).unwrap();

        assert!(matches!(
            sync.get("bad"),
            Err(SyncError::Serialization(CodecError::Json(_)))
        ));
        assert!(matches!(sync.hydrate("bad"), Err(SyncError::Serialization(_))));
        assert!(!sync.is_loaded("bad").unwrap());
        assert!(sync.get_all().is_err());
    }

    #[test]
    fn persist_without_session_value_is_an_error() {
        let (cookies, _session, sync) = setup();
        assert!(matches!(
            sync.persist("nothing"),
            Err(SyncError::MissingState(key)) if key == "nothing"
        ));
        assert!(cookies.is_empty());
    }

    #[test]
    fn raw_and_namespaced_keys_are_interchangeable() {
        let (cookies, session, sync) = setup();
        session.set("volume", json!(7));

        sync.persist("st_cookie__volume").unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(sync.get("volume").unwrap(), Some(json!(7)));
        assert_eq!(sync.get("st_cookie__volume").unwrap(), Some(json!(7)));

        sync.hydrate("volume").unwrap();
        assert_eq!(sync.hydrate("st_cookie__volume").unwrap(), Hydration::AlreadyLoaded);
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let (_cookies, _session, sync) = setup();
        assert!(matches!(sync.hydrate(""), Err(SyncError::InvalidKey { .. })));
        assert!(matches!(sync.set("a=b", &json!(1)), Err(SyncError::InvalidKey { .. })));
        assert!(matches!(sync.sync(["ok", "not ok"]), Err(SyncError::InvalidKey { .. })));
        assert!(!sync.is_loaded("ok").unwrap());
    }

    #[test]
    fn invalid_prefix_is_rejected() {
        let config = SyncConfig::default().with_key_prefix("a;b");
        let result = CookieSync::new(
            Arc::new(InMemoryCookieStore::new()),
            Arc::new(InMemorySessionState::new()),
            config,
        );
        assert!(matches!(result, Err(SyncError::InvalidKey { .. })));
    }

    #[test]
    fn set_get_and_remove_cookie_values() {
        let (cookies, session, sync) = setup();

        sync.set("prefs", &json!({"dark": true, "size": 3})).unwrap();
        sync.set_from("tags", &vec!["a", "b"]).unwrap();
        assert!(session.keys().is_empty());
        assert_eq!(sync.get("prefs").unwrap(), Some(json!({"dark": true, "size": 3})));
        assert_eq!(sync.get_as::<Vec<String>>("tags").unwrap(), Some(vec!["a".to_string(), "b".to_string()]));
        assert!(matches!(sync.get_as::<u32>("tags"), Err(SyncError::Serialization(_))));

        sync.remove("prefs").unwrap();
        assert_eq!(sync.get("prefs").unwrap(), None);
        assert!(cookies.contains("st_cookie__tags").unwrap());
    }

    #[test]
    fn update_persists_session_value() {
        let (_cookies, session, sync) = setup();
        session.set("flag", json!(false));
        sync.update("flag").unwrap();
        assert_eq!(sync.get("flag").unwrap(), Some(json!(false)));
    }

    #[test]
    fn scoped_sync_persists_value_set_inside_block() {
        let (cookies, session, sync) = setup();
        {
            let guard = sync.sync(["k"]).unwrap();
            assert_eq!(guard.keys().collect::<Vec<_>>(), vec!["st_cookie__k"]);
            session.set("k", json!("X"));
        }
        assert_eq!(
            cookies.get_cookie("st_cookie__k").unwrap(),
            Some(codec::encode(&json!("X")).unwrap())
        );
    }

    #[test]
    fn scoped_sync_hydrates_on_entry_once() {
        let (cookies, session, sync) = setup();
        cookies.set_cookie("st_cookie__text", &codec::encode(&json!("saved")).unwrap()).unwrap();

        // first run: value comes back from the cookie
        sync.with_sync(["text"], |state| {
            assert_eq!(state.get("text"), Some(json!("saved")));
            Ok::<_, SyncError>(())
        })
        .unwrap();

        // user edits, next run must keep the edit
        session.set("text", json!("edited"));
        sync.with_sync(["text"], |state| {
            assert_eq!(state.get("text"), Some(json!("edited")));
            Ok::<_, SyncError>(())
        })
        .unwrap();

        assert_eq!(sync.get("text").unwrap(), Some(json!("edited")));
    }

    #[test]
    fn scoped_sync_persists_when_block_fails() {
        let (_cookies, session, sync) = setup();
        let result: anyhow::Result<()> = sync.with_sync(["n"], |state| {
            state.set("n", json!(3));
            anyhow::bail!("widget callback failed")
        });

        assert_eq!(result.unwrap_err().to_string(), "widget callback failed");
        assert_eq!(session.get("n"), Some(json!(3)));
        assert_eq!(sync.get("n").unwrap(), Some(json!(3)));
    }

    #[test]
    fn scoped_sync_persists_when_block_panics() {
        let (_cookies, session, sync) = setup();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = sync.sync(["n"]).unwrap();
            session.set("n", json!(9));
            panic!("page script crashed");
        }));

        assert!(outcome.is_err());
        assert_eq!(sync.get("n").unwrap(), Some(json!(9)));
    }

    #[test]
    fn finish_reports_missing_key_but_persists_the_rest() {
        let (_cookies, session, sync) = setup();
        let guard = sync.sync(["a", "missing", "b"]).unwrap();
        session.set("a", json!(1));
        session.set("b", json!(2));

        assert!(matches!(guard.finish(), Err(SyncError::MissingState(key)) if key == "missing"));
        assert_eq!(sync.get("a").unwrap(), Some(json!(1)));
        assert_eq!(sync.get("b").unwrap(), Some(json!(2)));
    }

    #[test]
    fn scoped_sync_never_reads_back_its_own_write() {
        init_logging();
        let inner = Arc::new(InMemoryCookieStore::new());
        let deferred = Arc::new(DeferredCookieStore::new(inner.clone()));
        let (session, sync) = fresh_session(deferred.clone());

        sync.with_sync(["v"], |state| {
            state.set("v", json!(1));
            Ok::<_, SyncError>(())
        })
        .unwrap();
        assert_eq!(deferred.pending(), 1);
        assert_eq!(sync.get("v").unwrap(), None);

        // the write lands between runs; the session value is not replaced
        deferred.flush().unwrap();
        session.set("v", json!(2));
        let guard = sync.sync(["v"]).unwrap();
        assert_eq!(session.get("v"), Some(json!(2)));
        guard.finish().unwrap();
        deferred.flush().unwrap();
        assert_eq!(inner.get_cookie("st_cookie__v").unwrap(), Some(codec::encode(&json!(2)).unwrap()));
    }

    #[test]
    fn load_all_hydrates_namespaced_cookies_in_order() {
        let (cookies, session, sync) = setup();
        cookies.set_cookie("st_cookie__b", &codec::encode(&json!(2)).unwrap()).unwrap();
        cookies.set_cookie("theme", "dark").unwrap();
        cookies.set_cookie("st_cookie__a", &codec::encode(&json!(1)).unwrap()).unwrap();
        cookies.set_cookie("st_cookie__bad", "!!").unwrap();

        let loaded = sync.load_all(&LoadFilter::all()).unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(session.get("a"), Some(json!(1)));
        assert!(!session.has("theme"));
        assert!(!session.has("bad"));
        assert!(sync.is_loaded("bad").unwrap());

        // second call has nothing left to hydrate
        session.set("a", json!(100));
        assert!(sync.load_all(&LoadFilter::all()).unwrap().is_empty());
        assert_eq!(session.get("a"), Some(json!(100)));
    }

    #[test]
    fn load_all_is_all_or_nothing_when_decode_errors_raise() {
        init_logging();
        let cookies = Arc::new(InMemoryCookieStore::new());
        cookies.set_cookie("st_cookie__a", &codec::encode(&json!(1)).unwrap()).unwrap();
        cookies.set_cookie("st_cookie__bad", "!!").unwrap();
        cookies.set_cookie("st_cookie__c", &codec::encode(&json!(3)).unwrap()).unwrap();
        let session = Arc::new(InMemorySessionState::new());
        let config = SyncConfig::default().with_decode_failure(DecodeFailurePolicy::Raise);
        let sync = CookieSync::new(cookies.clone(), session.clone(), config).unwrap();

        assert!(matches!(
            sync.load_all(&LoadFilter::all()),
            Err(SyncError::Serialization(CodecError::Base64(_)))
        ));
        assert!(session.keys().is_empty());
        assert!(!sync.is_loaded("a").unwrap());

        // once the corrupt cookie is gone the whole set loads
        cookies.remove_cookie("st_cookie__bad").unwrap();
        let loaded = sync.load_all(&LoadFilter::all()).unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn load_all_hydrates_repeated_keep_key_once() {
        let (cookies, session, sync) = setup();
        cookies.set_cookie("st_cookie__a", &codec::encode(&json!(1)).unwrap()).unwrap();

        let loaded = sync.load_all(&LoadFilter::all().keep(["a", "st_cookie__a"])).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(session.get("a"), Some(json!(1)));
    }

    #[test]
    fn load_all_respects_keep_and_ignore() {
        let (cookies, session, sync) = setup();
        for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
            cookies
                .set_cookie(&format!("st_cookie__{key}"), &codec::encode(&json!(value)).unwrap())
                .unwrap();
        }

        let filter = LoadFilter::all()
            .keep(["c", "st_cookie__a", "b", "not_a_cookie"])
            .ignore(["st_cookie__b"]);
        let loaded = sync.load_all(&filter).unwrap();

        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["c", "a"]);
        assert!(!session.has("b"));
        assert!(!sync.is_loaded("b").unwrap());
        assert!(!sync.is_loaded("not_a_cookie").unwrap());
    }

    #[test]
    fn remove_all_only_touches_namespaced_cookies() {
        let (cookies, session, sync) = setup();
        cookies.set_cookie("st_cookie__a", "MQ==").unwrap();
        cookies.set_cookie("session_id", "abc").unwrap();
        cookies.set_cookie("st_cookie__b", "Mg==").unwrap();
        session.set("a", json!(1));

        let removed = sync.remove_all().unwrap();
        assert_eq!(removed, vec!["st_cookie__a", "st_cookie__b"]);
        assert_eq!(cookies.len(), 1);
        assert!(cookies.contains("session_id").unwrap());
        assert_eq!(session.get("a"), Some(json!(1)));
    }

    #[test]
    fn get_all_decodes_namespaced_cookies() {
        let (cookies, _session, sync) = setup();
        cookies.set_cookie("st_cookie__a", &codec::encode(&json!([1, 2])).unwrap()).unwrap();
        cookies.set_cookie("other", "x").unwrap();
        cookies.set_cookie("st_cookie__broken", "@@").unwrap();

        let all = sync.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["a"], json!([1, 2]));
    }

    #[test]
    fn sessions_hydrate_independently() {
        init_logging();
        let cookies: CookieStoreHandle = Arc::new(InMemoryCookieStore::new());
        cookies.set_cookie("st_cookie__k", &codec::encode(&json!("v")).unwrap()).unwrap();
        let sessions = InMemorySessionStore::new();
        let (first, second) = (SessionId::new(), SessionId::new());

        let a = CookieSync::new(cookies.clone(), sessions.state_for(first), SyncConfig::default()).unwrap();
        let b = CookieSync::new(cookies.clone(), sessions.state_for(second), SyncConfig::default()).unwrap();

        assert_eq!(a.hydrate("k").unwrap(), Hydration::Loaded(json!("v")));
        assert_eq!(b.hydrate("k").unwrap(), Hydration::Loaded(json!("v")));

        // a reset session hydrates again
        sessions.drop_session(first);
        let a = CookieSync::new(cookies, sessions.state_for(first), SyncConfig::default()).unwrap();
        assert!(!a.is_loaded("k").unwrap());
        assert_eq!(a.hydrate("k").unwrap(), Hydration::Loaded(json!("v")));
    }

    #[test]
    fn store_failures_surface_as_errors() {
        init_logging();
        let (session, sync) = fresh_session(Arc::new(BrokenCookieStore));
        session.set("k", json!(1));

        assert!(matches!(sync.hydrate("k"), Err(SyncError::Store(_))));
        assert!(matches!(sync.persist("k"), Err(SyncError::Store(_))));
        assert!(matches!(sync.remove_all(), Err(SyncError::Store(_))));
        assert!(!sync.is_loaded("k").unwrap());
    }

    #[test]
    fn custom_prefix_and_marker_suffix() {
        init_logging();
        let cookies = Arc::new(InMemoryCookieStore::new());
        let session = Arc::new(InMemorySessionState::new());
        let config = SyncConfig::default()
            .with_key_prefix("app.")
            .with_loaded_marker_suffix("#seen");
        let sync = CookieSync::new(cookies.clone(), session.clone(), config).unwrap();

        session.set("x", json!(null));
        sync.persist("x").unwrap();
        assert!(cookies.contains("app.x").unwrap());

        sync.hydrate("x").unwrap();
        assert!(session.has("app.x#seen"));
    }
}
