#![forbid(unsafe_code)]

use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PropertiesError {
    #[error("properties must be a JSON object")]
    PropertiesNotObject,
    #[error("attributes must be a JSON object")]
    AttributesNotObject,
    #[error("attribute {key:?} must be an array of strings")]
    AttributeNotStringList { key: String },
    #[error("attribute key must not be empty")]
    EmptyAttributeKey,
}

/// Validates the opaque configuration documents attached to a service.
///
/// Schema validation against a service type lives outside the core; this
/// seam lets the caller plug it in while the store keeps a shape check.
pub trait PropertiesValidator {
    fn validate_properties(&self, properties: &JsonValue) -> Result<(), PropertiesError>;
    fn validate_attributes(&self, attributes: &JsonValue) -> Result<(), PropertiesError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonShapeValidator;

impl PropertiesValidator for JsonShapeValidator {
    fn validate_properties(&self, properties: &JsonValue) -> Result<(), PropertiesError> {
        if properties.is_object() {
            Ok(())
        } else {
            Err(PropertiesError::PropertiesNotObject)
        }
    }

    fn validate_attributes(&self, attributes: &JsonValue) -> Result<(), PropertiesError> {
        let Some(map) = attributes.as_object() else {
            return Err(PropertiesError::AttributesNotObject);
        };
        for (key, value) in map {
            if key.trim().is_empty() {
                return Err(PropertiesError::EmptyAttributeKey);
            }
            let is_string_list = value
                .as_array()
                .is_some_and(|items| items.iter().all(JsonValue::is_string));
            if !is_string_list {
                return Err(PropertiesError::AttributeNotStringList { key: key.clone() });
            }
        }
        Ok(())
    }
}
