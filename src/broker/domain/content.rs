//! Message payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload carried by a message.
///
/// The broker never looks inside the payload; the variant only tells the
/// receiving agent how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MessageContent {
    /// Plain text.
    Text {
        /// The text body.
        text: String,
    },
    /// Structured JSON.
    Json {
        /// The JSON body.
        value: Value,
    },
    /// Bytes in a caller-defined encoding.
    Opaque {
        /// Media type describing `data`.
        media_type: String,
        /// Raw payload bytes.
        data: Vec<u8>,
    },
}

impl MessageContent {
    /// Creates a text payload.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates a JSON payload.
    #[must_use]
    pub fn json(value: impl Into<Value>) -> Self {
        Self::Json {
            value: value.into(),
        }
    }

    /// Creates an opaque payload.
    #[must_use]
    pub fn opaque(media_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Opaque {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Returns the text body of a text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Json { .. } | Self::Opaque { .. } => None,
        }
    }

    /// Returns the JSON body of a JSON payload.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json { value } => Some(value),
            Self::Text { .. } | Self::Opaque { .. } => None,
        }
    }
}
