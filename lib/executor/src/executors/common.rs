use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use sonic_rs::Value;

use crate::{
    executors::error::SubgraphExecutorError, operation::value::ValueLiteral,
    response::subgraph_response::SubgraphResponse,
};

#[async_trait]
pub trait SubgraphExecutor: Send + Sync {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError>;

    /// Streams responses of a subscription. Executors without a streaming
    /// transport yield the single response of [`SubgraphExecutor::execute`].
    async fn subscribe<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<BoxStream<'static, SubgraphResponse>, SubgraphExecutorError> {
        let response = self.execute(execution_request).await?;
        Ok(futures::stream::once(async move { response }).boxed())
    }

    fn to_boxed_arc<'a>(self) -> Arc<Box<dyn SubgraphExecutor + Send + Sync + 'a>>
    where
        Self: Sized + Send + Sync + 'a,
    {
        Arc::new(Box::new(self))
    }
}

pub type SubgraphExecutorType = dyn crate::executors::common::SubgraphExecutor + Send + Sync;

pub type SubgraphExecutorBoxedArc = Arc<Box<SubgraphExecutorType>>;

pub type SubgraphRequestExtensions = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
pub struct SubgraphExecutionRequest<'a> {
    pub query: &'a str,
    pub operation_name: Option<&'a str>,
    pub variables: BTreeMap<String, ValueLiteral>,
    pub extensions: Option<SubgraphRequestExtensions>,
}

impl<'a> SubgraphExecutionRequest<'a> {
    pub fn new(query: &'a str) -> Self {
        SubgraphExecutionRequest {
            query,
            operation_name: None,
            variables: BTreeMap::new(),
            extensions: None,
        }
    }
}
