//! Cookie value codec.
//!
//! A stored value is serialized to JSON and the JSON text is base64 encoded (standard
//! alphabet, padded), which keeps `;`, `,`, quotes and non-ASCII text out of the cookie.
//! Hosts commonly percent-encode cookie values on their way back, so [`decode`] accepts
//! both the raw and the percent-encoded form.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::CodecError;

/// Any JSON value: null, bool, number, string, array or string-keyed object.
pub use serde_json::Value;

/// Encodes `value` into a cookie-safe string.
pub fn encode(value: &Value) -> Result<String, CodecError> {
    let json = serde_json::to_string(value)?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Decodes a cookie string produced by [`encode`].
pub fn decode(raw: &str) -> Result<Value, CodecError> {
    let unquoted = urlencoding::decode(raw.trim()).map_err(CodecError::PercentEncoding)?;
    let bytes = STANDARD.decode(unquoted.trim().as_bytes())?;
    let json = String::from_utf8(bytes).map_err(CodecError::Utf8)?;
    Ok(serde_json::from_str(&json)?)
}

/// Encodes any serializable type. Fails for types JSON cannot represent, such as maps
/// with non-string keys.
pub fn encode_from<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    encode(&serde_json::to_value(value)?)
}

/// Decodes a cookie string straight into `T`.
pub fn decode_into<T: DeserializeOwned>(raw: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_value(decode(raw)?)?)
}
