//! Canonical compact JSON.
//!
//! Query bodies are re-serialized without insignificant whitespace so the
//! same query always produces the same `db.query.text`. Object keys keep the
//! order they had in the source and numbers keep their source spelling
//! (`serde_json` with `preserve_order` and `arbitrary_precision`). Reapplying
//! [`canonicalize`] to its own output returns it unchanged.

use serde_json::Value;

/// Parse `body` as any JSON value and re-serialize it compactly.
///
/// Fails on invalid UTF-8, syntax errors, truncated input, and trailing
/// non-whitespace after the value. Values nested more than 127 arrays or
/// objects deep are rejected too (`serde_json`'s recursion limit).
pub fn canonicalize(body: &[u8]) -> Result<String, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;
    serde_json::to_string(&value)
}

/// Parse `body` into a JSON value, for parsers that need to inspect fields.
pub fn parse(body: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(body)
}
