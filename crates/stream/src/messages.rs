//! Inbound code-generation WebSocket message types and parser.
//!
//! The backend sends JSON messages over WebSocket with the shape
//! `{"type": "<kind>", "value": "...", "variantIndex": n}`. This module
//! deserializes them into a closed [`InboundMessage`] enum; unknown kinds
//! are parse errors, not silently dropped.

use serde::de::{self, Deserializer};
use serde::Deserialize;

/// All known inbound message types.
///
/// Deserialized via the internally-tagged `"type"` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    /// A code token to append to a variant.
    Chunk { value: String, variant_index: usize },

    /// Human-readable progress line for a variant.
    Status { value: String, variant_index: usize },

    /// A complete code snapshot replacing the variant's code.
    SetCode { value: String, variant_index: usize },

    /// Channel-level error, not tied to a specific variant.
    Error { value: String },

    /// The variant finished generating.
    VariantComplete { variant_index: usize },

    /// The variant failed; `value` is the error message.
    VariantError { value: String, variant_index: usize },

    /// Authoritative number of variants the backend will produce.
    VariantCount {
        #[serde(deserialize_with = "stringified_int")]
        value: usize,
    },

    /// The user's updated credit balance.
    Credits {
        #[serde(deserialize_with = "stringified_int")]
        value: i64,
    },
}

impl InboundMessage {
    /// Variant addressed by the message, for per-variant kinds.
    pub fn variant_index(&self) -> Option<usize> {
        match self {
            Self::Chunk { variant_index, .. }
            | Self::Status { variant_index, .. }
            | Self::SetCode { variant_index, .. }
            | Self::VariantComplete { variant_index }
            | Self::VariantError { variant_index, .. } => Some(*variant_index),
            Self::Error { .. } | Self::VariantCount { .. } | Self::Credits { .. } => None,
        }
    }

    /// Short name of the message kind for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Status { .. } => "status",
            Self::SetCode { .. } => "setCode",
            Self::Error { .. } => "error",
            Self::VariantComplete { .. } => "variantComplete",
            Self::VariantError { .. } => "variantError",
            Self::VariantCount { .. } => "variantCount",
            Self::Credits { .. } => "credits",
        }
    }
}

/// Parse an inbound text frame into a typed enum.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers should log and continue.
pub fn parse_message(text: &str) -> Result<InboundMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

/// The backend stringifies integer values; accept plain numbers too.
fn stringified_int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let raw = match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(n) => n,
        IntOrString::Str(s) => s.trim().parse::<i64>().map_err(de::Error::custom)?,
    };
    T::try_from(raw).map_err(|_| de::Error::custom(format!("integer {raw} out of range")))
}
