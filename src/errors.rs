use std::string::FromUtf8Error;

/// Result type used throughout the crate.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Errors raised while turning a cookie value back into a [`Value`](crate::codec::Value)
/// (or a value into a cookie string).
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cookie value is not valid percent-encoding: {0}")]
    PercentEncoding(#[source] FromUtf8Error),

    #[error("cookie value is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded cookie value is not UTF-8: {0}")]
    Utf8(#[source] FromUtf8Error),

    #[error("cookie value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    #[error("no session value for key '{0}'")]
    MissingState(String),

    #[error("cookie store error: {0:#}")]
    Store(anyhow::Error),
}

impl SyncError {
    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        SyncError::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
