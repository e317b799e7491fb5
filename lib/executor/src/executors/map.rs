use std::{collections::HashMap, sync::Arc};

use futures::stream::BoxStream;
use fusion_config::FusionConfig;
use hyper_util::{
    client::legacy::Client,
    rt::{TokioExecutor, TokioTimer},
};
use tokio::sync::Semaphore;

use crate::{
    executors::{
        common::{SubgraphExecutionRequest, SubgraphExecutor, SubgraphExecutorBoxedArc},
        error::SubgraphExecutorError,
        http::HTTPSubgraphExecutor,
        timeout::TimeoutExecutor,
    },
    response::subgraph_response::SubgraphResponse,
};

/// Subgraph name to the executor that talks to it.
pub struct SubgraphExecutorMap {
    inner: HashMap<String, SubgraphExecutorBoxedArc>,
}

impl Default for SubgraphExecutorMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SubgraphExecutorMap {
    pub fn new() -> Self {
        SubgraphExecutorMap {
            inner: HashMap::new(),
        }
    }

    pub async fn execute<'a>(
        &self,
        subgraph_name: &str,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        self.get(subgraph_name)?.execute(execution_request).await
    }

    pub async fn subscribe<'a>(
        &self,
        subgraph_name: &str,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<BoxStream<'static, SubgraphResponse>, SubgraphExecutorError> {
        self.get(subgraph_name)?.subscribe(execution_request).await
    }

    fn get(&self, subgraph_name: &str) -> Result<&SubgraphExecutorBoxedArc, SubgraphExecutorError> {
        self.inner
            .get(subgraph_name)
            .ok_or_else(|| SubgraphExecutorError::SubgraphNotFound(subgraph_name.to_string()))
    }

    pub fn contains(&self, subgraph_name: &str) -> bool {
        self.inner.contains_key(subgraph_name)
    }

    pub fn insert_boxed_arc(&mut self, subgraph_name: String, boxed_arc: SubgraphExecutorBoxedArc) {
        self.inner.insert(subgraph_name, boxed_arc);
    }

    /// One HTTP executor per configured subgraph, sharing a connection pool.
    /// Subgraphs with a timeout (own or default) are wrapped in a [`TimeoutExecutor`].
    pub fn from_config(config: &FusionConfig) -> Result<Self, SubgraphExecutorError> {
        let traffic_shaping = &config.traffic_shaping;
        let mut builder = Client::builder(TokioExecutor::new());
        let builder_mut = builder
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(traffic_shaping.pool_idle_timeout)
            .pool_max_idle_per_host(traffic_shaping.max_connections_per_host);
        let http_client_arc = Arc::new(builder_mut.build_http());

        let mut executor_map = SubgraphExecutorMap::new();
        for (subgraph_name, subgraph) in &config.subgraphs {
            let semaphore = Arc::new(Semaphore::new(traffic_shaping.max_connections_per_host));
            let executor = HTTPSubgraphExecutor::try_new(
                subgraph_name,
                &subgraph.url,
                http_client_arc.clone(),
                semaphore,
            )?
            .to_boxed_arc();

            let executor = match subgraph.timeout.or(traffic_shaping.default_timeout) {
                Some(timeout) => TimeoutExecutor::new(subgraph_name, timeout, executor).to_boxed_arc(),
                None => executor,
            };
            executor_map.insert_boxed_arc(subgraph_name.clone(), executor);
        }

        Ok(executor_map)
    }
}
