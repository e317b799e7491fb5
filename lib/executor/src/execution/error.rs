use crate::{
    operation::SelectionSetId, plan::NodeId, utils::cancellation::CancellationError,
};

/// Failures that abort an operation. Subgraph failures never end up here,
/// they are turned into GraphQL errors next to partial data.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Selection set {0} is not part of the operation")]
    UnknownSelectionSet(SelectionSetId),
    #[error("Query plan has no node with id {0}")]
    UnknownNode(NodeId),
    #[error("Selection \"{response_name}\" has no selection set for type \"{type_name}\"")]
    MissingSelectionSetForType {
        response_name: String,
        type_name: String,
    },
    #[error("State of selection set {0} was already consumed, registering more is not allowed")]
    ImmutableSelectionSet(SelectionSetId),
    #[error("Value of abstract type \"{0}\" is missing \"__typename\"")]
    MissingTypeName(String),
    #[error("Expected {expected} at \"{path}\"")]
    InvalidResponseShape {
        path: String,
        expected: &'static str,
    },
    #[error("Query plan stalled with {0} node(s) that can never become ready")]
    PlanStalled(usize),
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("Operation timed out")]
    TimedOut,
    #[error("Failed to serialize response: {0}")]
    ResponseSerialization(String),
}

impl From<CancellationError> for ExecutionError {
    fn from(error: CancellationError) -> Self {
        match error {
            CancellationError::Cancelled => ExecutionError::Cancelled,
            CancellationError::TimedOut => ExecutionError::TimedOut,
        }
    }
}
