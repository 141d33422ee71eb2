use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier linking a request envelope to its reply.
///
/// Locally issued ids are random UUIDs; ids received from the peer are kept
/// verbatim so they can be echoed back unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Creates a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The unit carried by the channel: `{ "id", "type", "detail" }`.
///
/// Requests and replies share this shape; whether an envelope is a reply is
/// decided by the receiver, based on whether it is waiting for that id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: CorrelationId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub detail: Value,
}

impl Envelope {
    pub fn new(id: CorrelationId, kind: impl Into<String>, detail: Value) -> Self {
        Self {
            id,
            kind: kind.into(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_ids_are_distinct_uuids() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_wire_shape() {
        let envelope = Envelope::new("abc".into(), "reclist:load", Value::Null);
        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire, json!({ "id": "abc", "type": "reclist:load", "detail": null }));
    }

    #[test]
    fn test_missing_detail_reads_as_null() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"id":"not-a-uuid","type":"audio:save"}"#).unwrap();
        assert_eq!(envelope.id.as_str(), "not-a-uuid");
        assert_eq!(envelope.kind, "audio:save");
        assert_eq!(envelope.detail, Value::Null);
    }
}
