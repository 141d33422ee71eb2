use crate::errors::DetailError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Message type asking the host for the entries of a recording list.
pub const RECLIST_LOAD: &str = "reclist:load";

/// Message type asking the host to convert and store a recorded take.
pub const AUDIO_SAVE: &str = "audio:save";

/// One line of a recording list: the wav file to record into and the text to read.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReclistEntry {
    pub path: String,
    pub text: String,
}

/// Detail of a `reclist:load` request.
///
/// The request detail is usually `null`, in which case the host falls back to
/// its configured reclist.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadReclistRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl LoadReclistRequest {
    /// Decodes a request detail, treating `null` as "no explicit path".
    pub fn from_detail(detail: Value) -> Result<Self, DetailError> {
        if detail.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(detail)?)
    }

    pub fn into_detail(self) -> Value {
        match self.path {
            Some(path) => serde_json::json!({ "path": path }),
            None => Value::Null,
        }
    }
}

/// Detail of an `audio:save` request. The raw audio travels base64 encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SaveAudioRequest {
    pub path: PathBuf,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl SaveAudioRequest {
    pub fn new(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    pub fn from_detail(detail: Value) -> Result<Self, DetailError> {
        Ok(serde_json::from_value(detail)?)
    }

    pub fn into_detail(self) -> Result<Value, DetailError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Decodes a `reclist:load` reply. Anything that is not a list of entries reads as empty.
pub fn reclist_from_reply(detail: Value) -> Vec<ReclistEntry> {
    serde_json::from_value(detail).unwrap_or_default()
}

/// Decodes an `audio:save` reply. Only a literal `true` counts as success.
pub fn saved_from_reply(detail: &Value) -> bool {
    detail.as_bool().unwrap_or(false)
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
