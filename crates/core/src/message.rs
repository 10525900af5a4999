//! Wire envelopes exchanged with producers and consumers.
//!
//! Inbound consumer traffic is a closed set ([`ClientMessage`]); anything
//! outside it is rejected by the validator. Outbound traffic is tagged by
//! `msgType` ([`ServerMessage`]).

use crate::{Bounds, Bus};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One problem with one field of an inbound message.
///
/// Serialized as a single-entry object: `{"<field>": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g., "busId", "data.south_lat")
    pub field: String,
    /// Human readable description
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Serialize for FieldError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &self.message)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldErrorVisitor;

        impl<'de> Visitor<'de> for FieldErrorVisitor {
            type Value = FieldError;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with exactly one field/message entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldError, A::Error> {
                let (field, message): (String, String) = map
                    .next_entry()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(2, &self));
                }
                Ok(FieldError { field, message })
            }
        }

        deserializer.deserialize_map(FieldErrorVisitor)
    }
}

/// Messages a consumer may send.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientMessage {
    /// Replace the session's viewport.
    NewBounds(Bounds),
}

impl ClientMessage {
    /// `msgType` value of a bounds update.
    pub const NEW_BOUNDS: &'static str = "newBounds";
    /// Every accepted `msgType`.
    pub const MSG_TYPES: &'static [&'static str] = &[Self::NEW_BOUNDS];
}

/// Messages the hub sends to either kind of client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgType")]
pub enum ServerMessage {
    /// Buses visible in the consumer's viewport (possibly empty).
    Buses { buses: Vec<Bus> },
    /// Validation failures for the last inbound message.
    Errors { errors: Vec<FieldError> },
}

impl ServerMessage {
    pub fn buses(buses: Vec<Bus>) -> Self {
        ServerMessage::Buses { buses }
    }

    pub fn errors(errors: Vec<FieldError>) -> Self {
        ServerMessage::Errors { errors }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_field_error_display() {
        let err = FieldError::new("busId", "Missing data for required field.");
        assert_eq!(err.to_string(), "busId: Missing data for required field.");
    }

    #[test]
    fn test_buses_envelope_shape() {
        let msg = ServerMessage::buses(vec![Bus::new("A1", 55.0, 37.0, "5")]);
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "msgType": "Buses",
                "buses": [{"busId": "A1", "lat": 55.0, "lng": 37.0, "route": "5"}]
            })
        );
    }

    #[test]
    fn test_empty_buses_envelope_keeps_list() {
        let json = ServerMessage::buses(Vec::new()).to_json().unwrap();
        assert_eq!(json, r#"{"msgType":"Buses","buses":[]}"#);
    }

    #[test]
    fn test_errors_envelope_shape() {
        let msg = ServerMessage::errors(vec![
            FieldError::new("busId", "Missing data for required field."),
            FieldError::new("lat", "Not a valid number."),
        ]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "msgType": "Errors",
                "errors": [
                    {"busId": "Missing data for required field."},
                    {"lat": "Not a valid number."}
                ]
            })
        );
    }

    #[test]
    fn test_errors_envelope_parses_back() {
        let raw = r#"{"msgType":"Errors","errors":[{"data.south_lat":"Not a valid number."}]}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            ServerMessage::errors(vec![FieldError::new("data.south_lat", "Not a valid number.")])
        );
    }

    #[test]
    fn test_field_error_rejects_multiple_entries() {
        let raw = r#"{"a":"x","b":"y"}"#;
        assert!(serde_json::from_str::<FieldError>(raw).is_err());
    }
}
