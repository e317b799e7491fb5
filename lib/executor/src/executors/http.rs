use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use http::{header, HeaderMap, HeaderValue, Method, Uri};
use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{instrument, trace};

use crate::{
    executors::{
        common::{SubgraphExecutionRequest, SubgraphExecutor},
        error::SubgraphExecutorError,
    },
    json_writer::write_and_escape_string,
    response::subgraph_response::SubgraphResponse,
    utils::consts::{CLOSE_BRACE, COLON, COMMA, OPEN_BRACE},
};

pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

/// Sends GraphQL requests to one subgraph over a client shared by all subgraphs.
/// In-flight requests are bounded by `semaphore`.
#[derive(Debug)]
pub struct HTTPSubgraphExecutor {
    pub subgraph_name: String,
    pub endpoint: Uri,
    pub http_client: Arc<HttpClient>,
    pub header_map: HeaderMap,
    pub semaphore: Arc<Semaphore>,
}

impl HTTPSubgraphExecutor {
    pub fn new(
        subgraph_name: &str,
        endpoint: Uri,
        http_client: Arc<HttpClient>,
        semaphore: Arc<Semaphore>,
    ) -> Self {
        let mut header_map = HeaderMap::new();
        header_map.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        header_map.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/graphql-response+json, application/json"),
        );
        header_map.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        Self {
            subgraph_name: subgraph_name.to_string(),
            endpoint,
            http_client,
            header_map,
            semaphore,
        }
    }

    pub fn try_new(
        subgraph_name: &str,
        endpoint: &str,
        http_client: Arc<HttpClient>,
        semaphore: Arc<Semaphore>,
    ) -> Result<Self, SubgraphExecutorError> {
        let endpoint = endpoint.parse::<Uri>().map_err(|e| {
            SubgraphExecutorError::EndpointParseFailure(endpoint.to_string(), e.to_string())
        })?;
        Ok(Self::new(subgraph_name, endpoint, http_client, semaphore))
    }

    /// Writes `{"query", "operationName"?, "variables"?, "extensions"?}`.
    /// Empty variables are left out of the body.
    fn build_request_body(
        &self,
        request: &SubgraphExecutionRequest<'_>,
    ) -> Result<Bytes, SubgraphExecutorError> {
        let mut body = BytesMut::with_capacity(request.query.len() + 256);
        body.put(OPEN_BRACE);
        write_key(&mut body, "query", true);
        write_and_escape_string(&mut body, request.query);

        if let Some(operation_name) = request.operation_name {
            write_key(&mut body, "operationName", false);
            write_and_escape_string(&mut body, operation_name);
        }

        if !request.variables.is_empty() {
            write_key(&mut body, "variables", false);
            body.put(OPEN_BRACE);
            for (index, (name, value)) in request.variables.iter().enumerate() {
                write_key(&mut body, name, index == 0);
                write_serialized(&mut body, value).map_err(|e| {
                    SubgraphExecutorError::VariablesSerializationFailure(name.clone(), e)
                })?;
            }
            body.put(CLOSE_BRACE);
        }

        if let Some(extensions) = &request.extensions {
            write_key(&mut body, "extensions", false);
            write_serialized(&mut body, extensions).map_err(|e| {
                SubgraphExecutorError::RequestBuildFailure(self.subgraph_name.clone(), e)
            })?;
        }

        body.put(CLOSE_BRACE);
        Ok(body.freeze())
    }

    fn request_failure(&self, error: impl Display) -> SubgraphExecutorError {
        SubgraphExecutorError::RequestFailure(self.endpoint.to_string(), error.to_string())
    }

    async fn post(&self, body: Bytes) -> Result<Bytes, SubgraphExecutorError> {
        let mut request = hyper::Request::builder()
            .method(Method::POST)
            .uri(&self.endpoint)
            .version(Version::HTTP_11)
            .body(Full::new(body))
            .map_err(|e| {
                SubgraphExecutorError::RequestBuildFailure(self.endpoint.to_string(), e.to_string())
            })?;
        *request.headers_mut() = self.header_map.clone();

        let response = self
            .http_client
            .request(request)
            .await
            .map_err(|e| self.request_failure(e))?;

        let status = response.status();
        trace!(status = status.as_u16(), "subgraph responded");
        if !status.is_success() {
            return Err(SubgraphExecutorError::UnexpectedStatus(
                self.endpoint.to_string(),
                status.as_u16(),
            ));
        }

        let collected = response
            .into_body()
            .collect()
            .await
            .map_err(|e| self.request_failure(e))?;
        Ok(collected.to_bytes())
    }
}

fn write_key(body: &mut BytesMut, key: &str, first: bool) {
    if !first {
        body.put(COMMA);
    }
    write_and_escape_string(body, key);
    body.put(COLON);
}

fn write_serialized<T: Serialize>(body: &mut BytesMut, value: &T) -> Result<(), String> {
    let serialized = sonic_rs::to_vec(value).map_err(|e| e.to_string())?;
    body.put_slice(&serialized);
    Ok(())
}

#[async_trait]
impl SubgraphExecutor for HTTPSubgraphExecutor {
    #[instrument(level = "trace", skip_all, fields(subgraph_name = %self.subgraph_name))]
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        let body = self.build_request_body(&execution_request)?;

        // Only a closed semaphore fails to hand out permits.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| self.request_failure(e))?;

        let bytes = self.post(body).await?;
        trace!(bytes = bytes.len(), "received subgraph response");
        SubgraphResponse::deserialize_from_bytes(&bytes)
    }
}
