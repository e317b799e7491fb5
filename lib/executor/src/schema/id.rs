use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sonic_rs::{Value, ValueRef};

use crate::schema::metadata::SchemaMetadata;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum IdSerializerError {
    #[error("Ids must be strings or numbers, received {0}")]
    UnsupportedValue(&'static str),
    #[error("\"{0}\" is not a valid opaque id")]
    InvalidId(String),
}

/// Turns identifiers produced by a subgraph into ids exposed by the gateway.
pub trait IdSerializer: Send + Sync {
    fn reencode(
        &self,
        subgraph: &str,
        type_name: &str,
        value: &Value,
    ) -> Result<Value, IdSerializerError>;
}

/// `base64("{type}:{raw id}")` ids, with the type expressed in gateway terms.
#[derive(Debug, Default, Clone)]
pub struct OpaqueIdSerializer {
    schema_metadata: Arc<SchemaMetadata>,
}

impl OpaqueIdSerializer {
    pub fn new(schema_metadata: Arc<SchemaMetadata>) -> Self {
        OpaqueIdSerializer { schema_metadata }
    }

    pub fn encode(type_name: &str, raw_id: &str) -> String {
        STANDARD.encode(format!("{}:{}", type_name, raw_id))
    }

    pub fn decode(id: &str) -> Result<(String, String), IdSerializerError> {
        let invalid = || IdSerializerError::InvalidId(id.to_string());
        let bytes = STANDARD.decode(id).map_err(|_| invalid())?;
        let decoded = String::from_utf8(bytes).map_err(|_| invalid())?;
        match decoded.split_once(':') {
            Some((type_name, raw_id)) if is_type_name(type_name) && !raw_id.is_empty() => {
                Ok((type_name.to_string(), raw_id.to_string()))
            }
            _ => Err(invalid()),
        }
    }
}

fn is_type_name(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl IdSerializer for OpaqueIdSerializer {
    fn reencode(
        &self,
        subgraph: &str,
        type_name: &str,
        value: &Value,
    ) -> Result<Value, IdSerializerError> {
        let raw_id = match value.as_ref() {
            ValueRef::Null => return Ok(Value::new()),
            ValueRef::String(id) => {
                // already opaque, only the embedded type name is subgraph specific
                if let Ok((subgraph_type, raw_id)) = Self::decode(id) {
                    let gateway_type = self
                        .schema_metadata
                        .gateway_type_name(subgraph, &subgraph_type);
                    return Ok(Value::from(Self::encode(gateway_type, &raw_id).as_str()));
                }
                id.to_string()
            }
            ValueRef::Number(number) => number.to_string(),
            ValueRef::Bool(_) => return Err(IdSerializerError::UnsupportedValue("a boolean")),
            ValueRef::Array(_) => return Err(IdSerializerError::UnsupportedValue("a list")),
            ValueRef::Object(_) => return Err(IdSerializerError::UnsupportedValue("an object")),
        };

        let gateway_type = self.schema_metadata.gateway_type_name(subgraph, type_name);
        Ok(Value::from(Self::encode(gateway_type, &raw_id).as_str()))
    }
}
