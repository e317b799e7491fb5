use config::{builder::BuilderState, ConfigBuilder, ConfigError, Value};
use envconfig::Envconfig;
use tracing::debug;

use crate::log::{LogFormat, LogLevel};

#[derive(Envconfig)]
pub struct EnvVarOverrides {
    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
    #[envconfig(from = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    #[envconfig(from = "LOG_FILTER")]
    pub log_filter: Option<String>,

    #[envconfig(from = "INCLUDE_SUBGRAPH_NAME_IN_ERRORS")]
    pub include_subgraph_name_in_errors: Option<bool>,

    /// A humantime duration such as `5s`, parsed by the config deserializer.
    #[envconfig(from = "SUBGRAPH_DEFAULT_TIMEOUT")]
    pub subgraph_default_timeout: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvVarOverridesError {
    #[error("Failed to override configuration: {0}")]
    FailedToOverrideConfig(#[from] ConfigError),
}

impl EnvVarOverrides {
    /// Config keys paired with the values set through the environment.
    fn into_overrides(self) -> Vec<(&'static str, Value)> {
        let mut overrides = Vec::new();
        if let Some(level) = self.log_level {
            overrides.push(("log.level", Value::from(level.as_str())));
        }
        if let Some(format) = self.log_format {
            overrides.push(("log.format", Value::from(format.as_str())));
        }
        if let Some(filter) = self.log_filter {
            overrides.push(("log.filter", Value::from(filter)));
        }
        if let Some(include) = self.include_subgraph_name_in_errors {
            overrides.push(("errors.include_subgraph_name", Value::from(include)));
        }
        if let Some(timeout) = self.subgraph_default_timeout {
            overrides.push(("traffic_shaping.default_timeout", Value::from(timeout)));
        }
        overrides
    }

    pub fn apply_overrides<T: BuilderState>(
        self,
        mut config: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, EnvVarOverridesError> {
        for (key, value) in self.into_overrides() {
            debug!(key, value = ?value, "applying configuration override from environment");
            config = config.set_override(key, value)?;
        }

        Ok(config)
    }
}
