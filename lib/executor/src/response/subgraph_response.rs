use serde::Deserialize;
use sonic_rs::{JsonValueTrait, Value};

use crate::{executors::error::SubgraphExecutorError, response::graphql_error::GraphQLError};

/// A subgraph's GraphQL response envelope.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SubgraphResponse {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl SubgraphResponse {
    pub fn new(data: Value) -> Self {
        SubgraphResponse {
            data,
            errors: None,
            extensions: None,
        }
    }

    pub fn with_errors(mut self, errors: Vec<GraphQLError>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn deserialize_from_bytes(bytes: &[u8]) -> Result<SubgraphResponse, SubgraphExecutorError> {
        sonic_rs::from_slice(bytes)
            .map_err(|e| SubgraphExecutorError::ResponseDeserializationFailure(e.to_string()))
    }

    /// Only the unwrapped `data` payload, which is what composition consumes.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_null()
    }

    pub fn take_errors(&mut self) -> Vec<GraphQLError> {
        self.errors.take().unwrap_or_default()
    }
}
