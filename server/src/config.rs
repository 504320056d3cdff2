use crate::services::provider::Role;
use serde::Deserialize;
use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};
use streamjob::client::ArmConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("environment variable {0} with the management API token is not set")]
    MissingToken(String),
}

/// Server configuration, read from a TOML file.
///
/// ```toml
/// [server]
/// listen = "[::1]:50051"
///
/// [tls]
/// cert = "tls/server.cert"
/// key = "tls/server.key"
/// client_ca = "tls/ca.cert"
///
/// [azure]
/// subscription_id = "00000000-0000-0000-0000-000000000000"
///
/// [logging]
/// level = "info"
/// format = "json"
///
/// [[users]]
/// name = "alice"
/// roles = ["operator"]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,
    pub tls: TlsConfig,
    pub azure: AzureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenConfig {
    pub listen: SocketAddr,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 1], 50051)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// CA that signed the client certificates.
    pub client_ca: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AzureConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub subscription_id: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_endpoint() -> String {
    streamjob::client::DEFAULT_ENDPOINT.into()
}

fn default_api_version() -> String {
    streamjob::client::DEFAULT_API_VERSION.into()
}

fn default_token_env() -> String {
    "ARM_ACCESS_TOKEN".into()
}

fn default_poll_interval_secs() -> u64 {
    10
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    /// Subject UID of the user's client certificate.
    pub name: String,
    pub roles: Vec<Role>,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn arm_config(&self) -> ArmConfig {
        let mut arm = ArmConfig::new(self.azure.subscription_id.clone());
        arm.endpoint = self.azure.endpoint.clone();
        arm.api_version = self.azure.api_version.clone();
        arm.poll_interval = Duration::from_secs(self.azure.poll_interval_secs);
        arm
    }

    pub fn arm_token(&self) -> Result<String, ConfigError> {
        env::var(&self.azure.token_env)
            .map_err(|_| ConfigError::MissingToken(self.azure.token_env.clone()))
    }
}
