mod env_overrides;
pub mod errors;
pub mod log;
pub mod subgraphs;
pub mod traffic_shaping;

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use serde::{Deserialize, Serialize};

use crate::{
    env_overrides::{EnvVarOverrides, EnvVarOverridesError},
    errors::ErrorsConfig,
    log::LoggingConfig,
    subgraphs::SubgraphConfig,
    traffic_shaping::TrafficShapingConfig,
};

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FusionConfig {
    /// The logger configuration.
    #[serde(default)]
    pub log: LoggingConfig,

    /// The subgraphs the gateway fetches from, by name.
    #[serde(default)]
    pub subgraphs: HashMap<String, SubgraphConfig>,

    /// Configuration for the traffic-shaping of the executor. Use these configurations to control how requests are being executed to subgraphs.
    #[serde(default)]
    pub traffic_shaping: TrafficShapingConfig,

    /// How subgraph failures are reported to clients.
    #[serde(default)]
    pub errors: ErrorsConfig,

    /// Subgraph type names that differ from the gateway type name.
    #[serde(default)]
    pub type_mappings: Vec<TypeMappingConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TypeMappingConfig {
    pub subgraph: String,
    pub subgraph_type: String,
    pub gateway_type: String,
}

impl FusionConfig {
    pub fn subgraph_endpoints(&self) -> impl Iterator<Item = (&str, &str)> {
        self.subgraphs
            .iter()
            .map(|(name, subgraph)| (name.as_str(), subgraph.url.as_str()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to parse the configuration file path: {0}")]
    ConfigPathParseError(Infallible),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "fusion.config.yaml",
    "fusion.config.yml",
    "fusion.config.json",
];

pub fn load_config(override_config_path: Option<String>) -> Result<FusionConfig, ConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();

    if let Some(path_str) = override_config_path {
        let path_buf = path_str
            .parse::<PathBuf>()
            .map_err(ConfigError::ConfigPathParseError)?;
        let as_file: File<FileSourceFile, _> = path_buf.into();
        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = env_overrides.apply_overrides(config)?;

    Ok(config.build()?.try_deserialize::<FusionConfig>()?)
}

pub fn parse_yaml_config(config_raw: String) -> Result<FusionConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(&config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<FusionConfig>()
        .map_err(ConfigError::ConfigLoadError)
}
