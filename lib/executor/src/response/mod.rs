pub mod graphql_error;
pub mod result;
pub mod subgraph_response;
