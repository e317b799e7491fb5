use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ErrorsConfig {
    /// Adds `extensions.serviceName` to errors that originate from a subgraph.
    ///
    /// Can also be set via the `INCLUDE_SUBGRAPH_NAME_IN_ERRORS` environment variable.
    #[serde(default)]
    pub include_subgraph_name: bool,
}
