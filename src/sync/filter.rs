/// Restricts which cookies [`CookieSync::load_all`](crate::sync::CookieSync::load_all) hydrates.
///
/// Keys may be given raw or namespaced. With a `keep` list only those keys are loaded,
/// in `keep` order; `ignore` is applied afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadFilter {
    pub keep: Option<Vec<String>>,
    pub ignore: Vec<String>,
}

impl LoadFilter {
    /// Loads every namespaced cookie.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn keep<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keep = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn ignore<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(keys.into_iter().map(Into::into));
        self
    }
}
