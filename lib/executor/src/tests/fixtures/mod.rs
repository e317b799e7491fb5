use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use futures::StreamExt;
use sonic_rs::Value;

use crate::{
    context::{ErrorSettings, FusionExecutionContext},
    execution::{error::ExecutionError, plan::execute_operation},
    executors::{
        common::{SubgraphExecutionRequest, SubgraphExecutor},
        error::SubgraphExecutorError,
        map::SubgraphExecutorMap,
    },
    operation::Operation,
    plan::QueryPlan,
    response::subgraph_response::SubgraphResponse,
    schema::{id::OpaqueIdSerializer, metadata::SchemaMetadata},
    utils::cancellation::CancellationToken,
};

type Handler = dyn Fn(&SubgraphExecutionRequest<'_>) -> Result<Value, SubgraphExecutorError>
    + Send
    + Sync;

/// A subgraph answering with canned response envelopes.
pub struct MockSubgraph {
    handler: Box<Handler>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockSubgraph {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&SubgraphExecutionRequest<'_>) -> Result<Value, SubgraphExecutorError>
            + Send
            + Sync
            + 'static,
    {
        MockSubgraph {
            handler: Box::new(handler),
            delay: None,
            requests: Arc::default(),
        }
    }

    /// Always responds with the same envelope.
    pub fn responding(response: Value) -> Self {
        Self::new(move |_| Ok(response.clone()))
    }

    pub fn failing(error: SubgraphExecutorError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Variables of every received request, serialized, in arrival order.
    pub fn requests(&self) -> Arc<Mutex<Vec<String>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl SubgraphExecutor for MockSubgraph {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        self.requests
            .lock()
            .unwrap()
            .push(sonic_rs::to_string(&execution_request.variables).unwrap());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let envelope = (self.handler)(&execution_request)?;
        SubgraphResponse::deserialize_from_bytes(&sonic_rs::to_vec(&envelope).unwrap())
    }
}

/// Everything an execution borrows, owned in one place.
pub struct TestGateway {
    operation: Operation,
    plan: QueryPlan,
    variables: HashMap<String, Value>,
    executors: SubgraphExecutorMap,
    schema_metadata: SchemaMetadata,
    error_settings: ErrorSettings,
}

impl TestGateway {
    pub fn new(operation: &str, plan: &str) -> Self {
        TestGateway {
            operation: sonic_rs::from_str(operation).unwrap(),
            plan: sonic_rs::from_str(plan).unwrap(),
            variables: HashMap::new(),
            executors: SubgraphExecutorMap::new(),
            schema_metadata: SchemaMetadata::default(),
            error_settings: ErrorSettings::default(),
        }
    }

    pub fn with_subgraph(mut self, name: &str, subgraph: MockSubgraph) -> Self {
        self.executors
            .insert_boxed_arc(name.to_string(), subgraph.to_boxed_arc());
        self
    }

    pub fn with_variables(mut self, variables: &str) -> Self {
        self.variables = sonic_rs::from_str(variables).unwrap();
        self
    }

    pub fn with_type_mapping(mut self, subgraph: &str, subgraph_type: &str, gateway_type: &str) -> Self {
        self.schema_metadata
            .add_type_mapping(subgraph, subgraph_type, gateway_type);
        self
    }

    pub fn include_subgraph_name(mut self) -> Self {
        self.error_settings.include_subgraph_name = true;
        self
    }

    pub async fn execute(&self) -> Result<String, ExecutionError> {
        self.execute_with(CancellationToken::new()).await
    }

    pub async fn execute_with(&self, cancellation: CancellationToken) -> Result<String, ExecutionError> {
        let id_serializer = OpaqueIdSerializer::new(Arc::new(self.schema_metadata.clone()));
        let ctx = FusionExecutionContext::new(
            &self.operation,
            &self.plan,
            &self.variables,
            &self.executors,
            &self.schema_metadata,
            &id_serializer,
            cancellation,
            self.error_settings,
        );
        let response = execute_operation(ctx).await?;
        Ok(String::from_utf8(response).unwrap())
    }

    /// Collects every response of a subscription sent through the execution context.
    pub async fn subscribe(
        &self,
        subgraph: &str,
        query: &str,
    ) -> Result<Vec<SubgraphResponse>, SubgraphExecutorError> {
        let id_serializer = OpaqueIdSerializer::default();
        let ctx = FusionExecutionContext::new(
            &self.operation,
            &self.plan,
            &self.variables,
            &self.executors,
            &self.schema_metadata,
            &id_serializer,
            CancellationToken::new(),
            self.error_settings,
        );
        let stream = ctx
            .subscribe(subgraph, SubgraphExecutionRequest::new(query))
            .await?;
        Ok(stream.collect().await)
    }
}
