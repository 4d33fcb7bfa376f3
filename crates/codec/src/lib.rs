//! Binary-safe payload codec for remote invocation arguments.
//!
//! Call arguments travel through JSON bodies and job queues, so the binary
//! form is armored: a self-describing [`PayloadValue`] graph is serialized
//! with bincode and wrapped in standard base64. Round-trips are exact for
//! primitives, collections, numeric arrays, records, and functions; values
//! that cannot survive transport (live streams: generators, open file
//! handles) refuse to encode with a dedicated serialization error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use flash_domain::{Error, Result};

pub mod value;

pub use value::PayloadValue;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Single values
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Encode one value into its text-safe armored form.
pub fn encode_one(value: &PayloadValue) -> Result<String> {
    if let Some(what) = value.first_unencodable() {
        return Err(Error::Serialization(format!(
            "cannot serialize {what}: live handles do not survive transport"
        )));
    }
    let bytes = bincode::serialize(value)
        .map_err(|e| Error::Serialization(format!("encoding value graph: {e}")))?;
    Ok(BASE64.encode(bytes))
}

/// Decode one armored value.
pub fn decode_one(encoded: &str) -> Result<PayloadValue> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| Error::Serialization(format!("invalid base64 payload: {e}")))?;
    bincode::deserialize(&bytes)
        .map_err(|e| Error::Serialization(format!("decoding value graph: {e}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Batch helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Encode a positional argument list.
pub fn encode_positional(values: &[PayloadValue]) -> Result<Vec<String>> {
    values.iter().map(encode_one).collect()
}

/// Decode a positional argument list.
pub fn decode_positional(encoded: &[String]) -> Result<Vec<PayloadValue>> {
    encoded.iter().map(|s| decode_one(s)).collect()
}

/// Encode a keyword-argument map, preserving key order.
pub fn encode_named(
    values: &[(String, PayloadValue)],
) -> Result<Vec<(String, String)>> {
    values
        .iter()
        .map(|(k, v)| Ok((k.clone(), encode_one(v)?)))
        .collect()
}

/// Decode a keyword-argument map.
pub fn decode_named(
    encoded: &[(String, String)],
) -> Result<Vec<(String, PayloadValue)>> {
    encoded
        .iter()
        .map(|(k, s)| Ok((k.clone(), decode_one(s)?)))
        .collect()
}
