//! Structural validation of request objects.
//!
//! Requests arrive as JSON values. Each property is checked against an
//! expected shape and every failure produces a [`ValidationError`] whose
//! message names the object, the property, the expected and actual types,
//! and the offending value. Callers distinguish validation failures from all
//! other errors by type (see `exit_codes::classify`).

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::core::duration::IsoDuration;

/// A request did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// JSON primitive kinds a property can be required to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Number,
    Boolean,
    Object,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Object => "object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Kind::String, Value::String(_))
                | (Kind::Number, Value::Number(_))
                | (Kind::Boolean, Value::Bool(_))
                | (Kind::Object, Value::Object(_))
        )
    }
}

/// Expected shape of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Primitive(Kind),
    /// An array, optionally with every item of one kind.
    Array(Option<Kind>),
}

/// A type that can be constructed from a raw JSON property.
pub trait ValueObject: Sized {
    /// Name used in validation messages.
    const TYPE_NAME: &'static str;
    type Error;

    fn from_json(value: &Value) -> Result<Self, Self::Error>;
}

impl ValueObject for IsoDuration {
    const TYPE_NAME: &'static str = "Duration";
    type Error = Option<crate::core::duration::DurationParseError>;

    fn from_json(value: &Value) -> Result<Self, Self::Error> {
        value.as_str().ok_or(None)?.parse().map_err(Some)
    }
}

impl ValueObject for DateTime<Utc> {
    const TYPE_NAME: &'static str = "Timestamp";
    type Error = Option<chrono::ParseError>;

    fn from_json(value: &Value) -> Result<Self, Self::Error> {
        let raw = value.as_str().ok_or(None)?;
        DateTime::parse_from_rfc3339(raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(Some)
    }
}

/// Runtime kind of a JSON value, as reported in messages.
pub fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Return the property, failing when the object or the property is missing
/// or when the value does not have the expected shape.
pub fn validate_required_property<'a>(
    obj: Option<&'a Value>,
    object_name: &str,
    property_name: &str,
    expected: Option<PropertyType>,
) -> Result<&'a Value, ValidationError> {
    let value = required_value(obj, object_name, property_name)?;
    check_shape(value, object_name, property_name, expected)?;
    Ok(value)
}

/// Like [`validate_required_property`], but an absent property yields `None`.
///
/// The object itself must still be present.
pub fn validate_optional_property<'a>(
    obj: Option<&'a Value>,
    object_name: &str,
    property_name: &str,
    expected: Option<PropertyType>,
) -> Result<Option<&'a Value>, ValidationError> {
    let Some(value) = optional_value(obj, object_name, property_name)? else {
        return Ok(None);
    };
    check_shape(value, object_name, property_name, expected)?;
    Ok(Some(value))
}

/// Construct a required value object from the property.
pub fn validate_required_value_object<T: ValueObject>(
    obj: Option<&Value>,
    object_name: &str,
    property_name: &str,
) -> Result<T, ValidationError> {
    let value = required_value(obj, object_name, property_name)?;
    construct(value, object_name, property_name)
}

/// Construct an optional value object from the property.
pub fn validate_optional_value_object<T: ValueObject>(
    obj: Option<&Value>,
    object_name: &str,
    property_name: &str,
) -> Result<Option<T>, ValidationError> {
    optional_value(obj, object_name, property_name)?
        .map(|value| construct(value, object_name, property_name))
        .transpose()
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

fn require_object<'a>(obj: Option<&'a Value>, object_name: &str) -> Result<&'a Value, ValidationError> {
    present(obj).ok_or_else(|| ValidationError::new(format!("The {object_name} is required.")))
}

fn required_value<'a>(
    obj: Option<&'a Value>,
    object_name: &str,
    property_name: &str,
) -> Result<&'a Value, ValidationError> {
    let obj = require_object(obj, object_name)?;
    present(obj.get(property_name)).ok_or_else(|| {
        ValidationError::new(format!(
            "The property \"{property_name}\" is required for {object_name}."
        ))
    })
}

fn optional_value<'a>(
    obj: Option<&'a Value>,
    object_name: &str,
    property_name: &str,
) -> Result<Option<&'a Value>, ValidationError> {
    let obj = require_object(obj, object_name)?;
    Ok(present(obj.get(property_name)))
}

fn check_shape(
    value: &Value,
    object_name: &str,
    property_name: &str,
    expected: Option<PropertyType>,
) -> Result<(), ValidationError> {
    match expected {
        None => Ok(()),
        Some(PropertyType::Primitive(kind)) => {
            if kind.matches(value) {
                Ok(())
            } else {
                Err(type_error(object_name, property_name, kind.name(), value))
            }
        }
        Some(PropertyType::Array(item_kind)) => {
            let Value::Array(items) = value else {
                return Err(type_error(object_name, property_name, "array", value));
            };
            let Some(item_kind) = item_kind else {
                return Ok(());
            };
            match items.iter().position(|item| !item_kind.matches(item)) {
                None => Ok(()),
                Some(index) => {
                    let item = &items[index];
                    Err(ValidationError::new(format!(
                        "The property \"{property_name}\" of {object_name} must be an array of {}, \
                         found {} at item {}: {}.",
                        item_kind.name(),
                        type_of(item),
                        index + 1,
                        render(item)
                    )))
                }
            }
        }
    }
}

fn construct<T: ValueObject>(
    value: &Value,
    object_name: &str,
    property_name: &str,
) -> Result<T, ValidationError> {
    T::from_json(value).map_err(|_| {
        type_error(
            object_name,
            property_name,
            &format!("valid {}", T::TYPE_NAME),
            value,
        )
    })
}

fn type_error(object_name: &str, property_name: &str, expected: &str, value: &Value) -> ValidationError {
    ValidationError::new(format!(
        "The property \"{property_name}\" of {object_name} must be {} {expected}, found {}: {}.",
        article(expected),
        type_of(value),
        render(value)
    ))
}

fn article(word: &str) -> &'static str {
    match word.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}
