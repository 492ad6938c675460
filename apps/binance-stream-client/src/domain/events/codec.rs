//! Stream Codec
//!
//! JSON decoding for Binance stream payloads. Every stream (market and user
//! data) sends one JSON object per text frame.

use serde::de::DeserializeOwned;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for Binance stream payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a raw text payload into a typed event.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON object or does not match
    /// the shape of `T`.
    pub fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T, CodecError> {
        let trimmed = raw.trim();

        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                truncate(trimmed, 50)
            )));
        }

        Ok(serde_json::from_str(trimmed)?)
    }
}

/// Cut `s` to at most `max` bytes without splitting a UTF-8 character.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
