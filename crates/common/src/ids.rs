use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an inbound number request.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// request IDs with other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a request ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RequestId> for Uuid {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Identifier of a backorder, assigned by the carrier that accepted it
/// (or generated locally when the carrier does not return one).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackorderId(String);

impl BackorderId {
    /// Creates a backorder ID from a carrier-assigned value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a local backorder ID for carriers that do not assign one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BackorderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BackorderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BackorderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of an immediately fulfilled order, assigned by the carrier
/// (or generated locally when the carrier does not return one).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Creates an order ID from a carrier-assigned value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a local order ID for carriers that do not assign one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_new_creates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn request_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = RequestId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn request_id_serialization_roundtrip() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn backorder_id_keeps_carrier_value() {
        let id = BackorderId::new("789555001");
        assert_eq!(id.as_str(), "789555001");
        assert_eq!(id.to_string(), "789555001");
    }

    #[test]
    fn backorder_id_serializes_as_plain_string() {
        let id = BackorderId::new("789555001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"789555001\"");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(BackorderId::generate(), BackorderId::generate());
        assert_ne!(OrderId::generate(), OrderId::generate());
    }
}
