//! Inbound message codec and validator.
//!
//! Every frame a client sends goes through [`decode`], which classifies it as
//! a typed message, a malformed payload, or a schema violation listing every
//! bad field. Validation is pure and deterministic: errors are reported in
//! declaration order, followed by unknown fields in name order.

use crate::{Bounds, Bus, ClientMessage, FieldError, ServerMessage};
use serde_json::{Map, Value};
use thiserror::Error;

pub const MISSING_FIELD: &str = "Missing data for required field.";
pub const NULL_FIELD: &str = "Field may not be null.";
pub const NOT_A_STRING: &str = "Not a valid string.";
pub const NOT_A_NUMBER: &str = "Not a valid number.";
pub const NOT_A_MAPPING: &str = "Not a valid mapping type.";
pub const EMPTY_STRING: &str = "Must not be empty.";
pub const UNKNOWN_FIELD: &str = "Unknown field.";
pub const INVALID_INPUT: &str = "Invalid input type.";

/// Field name used for errors about the message as a whole.
pub const SCHEMA_FIELD: &str = "_schema";
/// Field name used when the payload could not be parsed at all.
pub const PAYLOAD_FIELD: &str = "_payload";

/// Why an inbound message was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Not parseable as JSON (or not UTF-8).
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Parseable, but required fields are missing or mistyped.
    #[error("schema violation: {}", join_fields(.0))]
    Schema(Vec<FieldError>),
}

impl ValidationError {
    /// Errors as reported back to the client.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            ValidationError::Malformed(reason) => {
                vec![FieldError::new(PAYLOAD_FIELD, format!("Invalid JSON: {reason}"))]
            }
            ValidationError::Schema(errors) => errors.clone(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ValidationError::Malformed(_))
    }
}

impl From<&ValidationError> for ServerMessage {
    fn from(err: &ValidationError) -> Self {
        ServerMessage::errors(err.field_errors())
    }
}

impl From<ValidationError> for ServerMessage {
    fn from(err: ValidationError) -> Self {
        ServerMessage::from(&err)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A message kind that can be validated from a JSON object.
pub trait Validate: Sized {
    /// Build the message, or report every invalid field.
    fn validate(object: &Map<String, Value>) -> Result<Self, Vec<FieldError>>;
}

/// Decode and validate a text frame as message kind `T`.
pub fn decode<T: Validate>(raw: &str) -> Result<T, ValidationError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let Value::Object(object) = value else {
        return Err(ValidationError::Schema(vec![FieldError::new(
            SCHEMA_FIELD,
            INVALID_INPUT,
        )]));
    };

    T::validate(&object).map_err(ValidationError::Schema)
}

/// Decode and validate a binary frame as message kind `T`.
///
/// Binary frames are accepted only if they carry UTF-8 JSON.
pub fn decode_bytes<T: Validate>(raw: &[u8]) -> Result<T, ValidationError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| ValidationError::Malformed(format!("payload is not UTF-8: {e}")))?;
    decode(text)
}

/// Reads typed fields out of one JSON object, collecting errors as it goes.
struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    prefix: Option<&'static str>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    fn new(object: &'a Map<String, Value>) -> Self {
        Self {
            object,
            prefix: None,
            errors: Vec::new(),
        }
    }

    fn nested(object: &'a Map<String, Value>, prefix: &'static str) -> Self {
        Self {
            object,
            prefix: Some(prefix),
            errors: Vec::new(),
        }
    }

    fn path(&self, name: &str) -> String {
        match self.prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.to_string(),
        }
    }

    fn push(&mut self, name: &str, message: impl Into<String>) {
        let field = self.path(name);
        self.errors.push(FieldError::new(field, message));
    }

    fn required(&mut self, name: &str) -> Option<&'a Value> {
        match self.object.get(name) {
            None => {
                self.push(name, MISSING_FIELD);
                None
            }
            Some(Value::Null) => {
                self.push(name, NULL_FIELD);
                None
            }
            Some(value) => Some(value),
        }
    }

    fn string(&mut self, name: &str) -> Option<&'a str> {
        let value = self.required(name)?;
        match value.as_str() {
            Some(s) => Some(s),
            None => {
                self.push(name, NOT_A_STRING);
                None
            }
        }
    }

    fn non_empty_string(&mut self, name: &str) -> Option<&'a str> {
        let s = self.string(name)?;
        if s.is_empty() {
            self.push(name, EMPTY_STRING);
            return None;
        }
        Some(s)
    }

    fn number(&mut self, name: &str) -> Option<f64> {
        let value = self.required(name)?;
        match value.as_f64() {
            Some(n) => Some(n),
            None => {
                self.push(name, NOT_A_NUMBER);
                None
            }
        }
    }

    fn object(&mut self, name: &str) -> Option<&'a Map<String, Value>> {
        let value = self.required(name)?;
        match value.as_object() {
            Some(o) => Some(o),
            None => {
                self.push(name, NOT_A_MAPPING);
                None
            }
        }
    }

    fn one_of(&mut self, name: &str, allowed: &[&str]) -> Option<&'a str> {
        let s = self.string(name)?;
        if !allowed.contains(&s) {
            self.push(name, format!("Must be one of: {}.", allowed.join(", ")));
            return None;
        }
        Some(s)
    }

    fn reject_unknown(&mut self, known: &[&str]) {
        let object = self.object;
        let mut unknown: Vec<&String> = object
            .keys()
            .filter(|k| !known.contains(&k.as_str()))
            .collect();
        unknown.sort();
        for key in unknown {
            self.push(key, UNKNOWN_FIELD);
        }
    }

    fn extend(&mut self, errors: Vec<FieldError>) {
        self.errors.extend(errors);
    }

    fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }
}

const BUS_FIELDS: &[&str] = &["busId", "lat", "lng", "route"];
const BOUNDS_FIELDS: &[&str] = &["south_lat", "north_lat", "west_lng", "east_lng"];
const CLIENT_FIELDS: &[&str] = &["msgType", "data"];

impl Validate for Bus {
    fn validate(object: &Map<String, Value>) -> Result<Self, Vec<FieldError>> {
        let mut fields = FieldReader::new(object);
        let bus_id = fields.non_empty_string("busId");
        let lat = fields.number("lat");
        let lng = fields.number("lng");
        let route = fields.string("route");
        fields.reject_unknown(BUS_FIELDS);

        let errors = fields.into_errors();
        match (bus_id, lat, lng, route) {
            (Some(bus_id), Some(lat), Some(lng), Some(route)) if errors.is_empty() => {
                Ok(Bus::new(bus_id, lat, lng, route))
            }
            _ => Err(errors),
        }
    }
}

fn read_bounds(fields: &mut FieldReader<'_>) -> Option<Bounds> {
    let south_lat = fields.number("south_lat");
    let north_lat = fields.number("north_lat");
    let west_lng = fields.number("west_lng");
    let east_lng = fields.number("east_lng");
    fields.reject_unknown(BOUNDS_FIELDS);

    Some(Bounds::new(south_lat?, north_lat?, west_lng?, east_lng?))
}

impl Validate for ClientMessage {
    fn validate(object: &Map<String, Value>) -> Result<Self, Vec<FieldError>> {
        let mut fields = FieldReader::new(object);
        let msg_type = fields.one_of("msgType", ClientMessage::MSG_TYPES);

        let bounds = fields.object("data").and_then(|data| {
            let mut nested = FieldReader::nested(data, "data");
            let bounds = read_bounds(&mut nested);
            fields.extend(nested.into_errors());
            bounds
        });
        fields.reject_unknown(CLIENT_FIELDS);

        let errors = fields.into_errors();
        match (msg_type, bounds) {
            (Some(ClientMessage::NEW_BOUNDS), Some(bounds)) if errors.is_empty() => {
                Ok(ClientMessage::NewBounds(bounds))
            }
            _ => Err(errors),
        }
    }
}
