//! Server configuration management
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. an optional TOML, YAML or JSON file
//! 3. `TENANTGATE_*` environment variables, with `__` between nesting levels
//!    (`TENANTGATE_IDENTITY__CLIENT_ID`, `TENANTGATE_AUTH__DETAILED_ERRORS`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenantgate_auth::{IdentityConfigError, IdentityProviderConfig};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "TENANTGATE";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: String,
    /// Bind port
    pub port: u16,
    /// Identity provider the bearer tokens come from
    pub identity: IdentityProviderConfig,
    /// Request authentication settings
    pub auth: AuthSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// JSON document seeding the in-memory directory
    pub directory_seed: Option<PathBuf>,
}

/// Request authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Return the specific rejection reason in 401 bodies. Keep off in production.
    pub detailed_errors: bool,
    /// Deadline for each user or membership lookup
    pub lookup_timeout_secs: u64,
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard error
    Stderr,
    /// Daily-rotated files under `directory`
    File,
    /// Logging disabled
    None,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub structured: bool,
    /// Output target
    pub output: LogOutput,
    /// Log directory for file output
    pub directory: Option<PathBuf>,
    /// Log file name prefix
    pub file_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            identity: IdentityProviderConfig::default(),
            auth: AuthSettings::default(),
            logging: LoggingConfig::default(),
            directory_seed: None,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            detailed_errors: false,
            lookup_timeout_secs: 5,
        }
    }
}

impl AuthSettings {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
            output: LogOutput::Stderr,
            directory: None,
            file_prefix: "tenantgate.log".to_string(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Identity provider settings are unusable
    #[error("Invalid identity provider configuration: {0}")]
    Identity(#[from] IdentityConfigError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ServerConfig {
    /// Load configuration from defaults, an optional file, and the process environment
    ///
    /// The file format is auto-detected from the file extension:
    /// - `.toml` → TOML format
    /// - `.yaml` or `.yml` → YAML format
    /// - `.json` → JSON format
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tenantgate_server::ServerConfig;
    ///
    /// let config = ServerConfig::load(Some("tenantgate.toml".as_ref()))?;
    /// # Ok::<(), tenantgate_server::ConfigError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist or its format is unsupported
    /// - A source contains invalid configuration
    /// - The identity provider settings fail validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load), reading environment overrides from `env`
    /// instead of the process environment when given.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }

            let format = match path.extension().and_then(|s| s.to_str()) {
                Some("toml") => FileFormat::Toml,
                Some("yaml") | Some("yml") => FileFormat::Yaml,
                Some("json") => FileFormat::Json,
                _ => return Err(ConfigError::UnsupportedFormat),
            };

            builder = builder.add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ));
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("identity.alternate_issuers")
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        config.identity.validate()?;
        Ok(config)
    }

    /// `bind_address:port`
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
