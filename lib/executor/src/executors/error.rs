use std::time::Duration;

use crate::response::graphql_error::GraphQLError;

pub const SUBGRAPH_REQUEST_FAILURE: &str = "SUBGRAPH_REQUEST_FAILURE";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SubgraphExecutorError {
    #[error("No executor is registered for subgraph \"{0}\"")]
    SubgraphNotFound(String),
    #[error("Failed to parse endpoint \"{0}\" as URI: {1}")]
    EndpointParseFailure(String, String),
    #[error("Failed to build request to subgraph \"{0}\": {1}")]
    RequestBuildFailure(String, String),
    #[error("Failed to send request to subgraph \"{0}\": {1}")]
    RequestFailure(String, String),
    #[error("Failed to serialize variable \"{0}\": {1}")]
    VariablesSerializationFailure(String, String),
    #[error("Subgraph \"{0}\" responded with status {1}")]
    UnexpectedStatus(String, u16),
    #[error("Failed to deserialize subgraph response: {0}")]
    ResponseDeserializationFailure(String),
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),
}

impl SubgraphExecutorError {
    /// The error exposed to clients for a failed subgraph call. Transport
    /// details are kept out of the message and only end up in the logs.
    pub fn to_graphql_error(&self, subgraph_name: &str, include_subgraph_name: bool) -> GraphQLError {
        let error = GraphQLError::from("Failed to execute request to subgraph")
            .with_code(SUBGRAPH_REQUEST_FAILURE);
        if include_subgraph_name {
            error.add_subgraph_name(subgraph_name)
        } else {
            error
        }
    }
}
