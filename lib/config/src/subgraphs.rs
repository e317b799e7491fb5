use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SubgraphConfig {
    /// The GraphQL endpoint of the subgraph.
    pub url: String,

    /// Maximum time a single request to this subgraph may take, for example `5s`.
    /// Falls back to `traffic_shaping.default_timeout` when not set.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}
