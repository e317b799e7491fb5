use std::collections::HashMap;

use futures::stream::BoxStream;
use sonic_rs::Value;

use crate::{
    execution::{error::ExecutionError, state::ExecutionState},
    executors::{
        common::SubgraphExecutionRequest, error::SubgraphExecutorError, map::SubgraphExecutorMap,
    },
    operation::{Operation, SelectionSetId},
    plan::QueryPlan,
    response::{result::ResultBuilder, subgraph_response::SubgraphResponse},
    schema::{id::IdSerializer, metadata::SchemaMetadata},
    utils::cancellation::CancellationToken,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorSettings {
    /// Adds `extensions.serviceName` to errors originating from a subgraph.
    pub include_subgraph_name: bool,
}

/// Everything one operation execution needs. Built per request and consumed by
/// [`FusionExecutionContext::into_response`].
pub struct FusionExecutionContext<'exec> {
    pub operation: &'exec Operation,
    pub plan: &'exec QueryPlan,
    pub variable_values: &'exec HashMap<String, Value>,
    pub executors: &'exec SubgraphExecutorMap,
    pub schema_metadata: &'exec SchemaMetadata,
    pub id_serializer: &'exec dyn IdSerializer,
    pub cancellation: CancellationToken,
    pub error_settings: ErrorSettings,
    pub state: ExecutionState,
    pub result: ResultBuilder,
}

impl<'exec> FusionExecutionContext<'exec> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operation: &'exec Operation,
        plan: &'exec QueryPlan,
        variable_values: &'exec HashMap<String, Value>,
        executors: &'exec SubgraphExecutorMap,
        schema_metadata: &'exec SchemaMetadata,
        id_serializer: &'exec dyn IdSerializer,
        cancellation: CancellationToken,
        error_settings: ErrorSettings,
    ) -> Self {
        FusionExecutionContext {
            operation,
            plan,
            variable_values,
            executors,
            schema_metadata,
            id_serializer,
            cancellation,
            error_settings,
            state: ExecutionState::new(),
            result: ResultBuilder::new(),
        }
    }

    /// True while the plan still has nodes that populate `selection_set`.
    pub fn needs_more_data(&self, selection_set: SelectionSetId) -> bool {
        self.plan.has_nodes(selection_set)
    }

    pub async fn execute(
        &self,
        subgraph_name: &str,
        request: SubgraphExecutionRequest<'_>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        self.executors.execute(subgraph_name, request).await
    }

    /// Streams the responses of a subgraph subscription.
    pub async fn subscribe(
        &self,
        subgraph_name: &str,
        request: SubgraphExecutionRequest<'_>,
    ) -> Result<BoxStream<'static, SubgraphResponse>, SubgraphExecutorError> {
        self.executors.subscribe(subgraph_name, request).await
    }

    /// Serializes the composed result. A cancelled execution never produces one.
    pub fn into_response(self) -> Result<Vec<u8>, ExecutionError> {
        self.cancellation.bail_if_cancelled()?;
        self.result
            .into_response()
            .map_err(|e| ExecutionError::ResponseSerialization(e.to_string()))
    }
}
