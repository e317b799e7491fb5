use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level of emitted events. Overridden by `LOG_LEVEL`.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format of the log lines. Overridden by `LOG_FORMAT`.
    #[serde(default)]
    pub format: LogFormat,

    /// An `EnvFilter` directive such as `fusion_executor=trace,info`. Takes
    /// precedence over `level`. Overridden by `LOG_FILTER`.
    #[serde(default)]
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn env_filter_str(&self) -> &str {
        match &self.filter {
            Some(filter) => filter,
            None => self.level.as_str(),
        }
    }
}

#[derive(
    Debug,
    Deserialize,
    Serialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

#[derive(
    Debug,
    Deserialize,
    Serialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Hierarchical span tree, for reading a single execution.
    PrettyTree,
    PrettyCompact,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::PrettyCompact
        } else {
            LogFormat::Json
        }
    }
}
