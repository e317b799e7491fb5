use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    executors::{
        common::{SubgraphExecutionRequest, SubgraphExecutor, SubgraphExecutorBoxedArc},
        error::SubgraphExecutorError,
    },
    response::subgraph_response::SubgraphResponse,
};

/// Bounds the duration of every request sent through the wrapped executor.
/// The in-flight request is dropped once the timeout expires.
pub struct TimeoutExecutor {
    pub subgraph_name: String,
    pub timeout: Duration,
    pub executor: SubgraphExecutorBoxedArc,
}

impl TimeoutExecutor {
    pub fn new(subgraph_name: &str, timeout: Duration, executor: SubgraphExecutorBoxedArc) -> Self {
        Self {
            subgraph_name: subgraph_name.to_string(),
            timeout,
            executor,
        }
    }
}

#[async_trait]
impl SubgraphExecutor for TimeoutExecutor {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        let execution = self.executor.execute(execution_request);
        match tokio::time::timeout(self.timeout, execution).await {
            Ok(response) => response,
            Err(_) => {
                warn!(
                    subgraph_name = %self.subgraph_name,
                    "request timed out after {:?}", self.timeout
                );
                Err(SubgraphExecutorError::RequestTimeout(self.timeout))
            }
        }
    }
}
