use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Environment variable prefix shared by every setting.
const ENV_PREFIX: &str = "FORUM_MCP_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as number: {source}")]
    ParseFloat {
        name: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("failed to parse {name} as URL: {source}")]
    ParseUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the forum backend REST API.
    pub backend_base_url: Url,

    // Invocation surface
    pub host: String,
    pub port: u16,
    pub transport: TransportMode,

    // Backend HTTP client
    pub request_timeout: Duration,
    /// Default bearer token for authenticated backend calls, when configured.
    pub access_token: Option<String>,

    // Logging
    pub log_level: String,
}

/// Transport used to serve tool invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Sse,
    StreamableHttp,
}

impl TransportMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
            Self::StreamableHttp => "streamable-http",
        }
    }
}

impl Settings {
    /// Load configuration from `FORUM_MCP_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = parse_env_f64("REQUEST_TIMEOUT", 10.0)?;
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: var_name("REQUEST_TIMEOUT"),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            backend_base_url: parse_env_url("BACKEND_BASE_URL", "http://127.0.0.1:8080")?,
            host: env_or_default("HOST", "0.0.0.0"),
            port: parse_env_u16("PORT", 8085)?,
            transport: parse_transport(&env_or_default("TRANSPORT", "streamable-http"))?,
            request_timeout: Duration::from_secs_f64(timeout_secs),
            access_token: optional_env("ACCESS_TOKEN"),
            log_level: env_or_default("LOG_LEVEL", "info"),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                name: var_name("PORT"),
                message: "must be between 1 and 65535".to_string(),
            });
        }
        if self.request_timeout <= Duration::ZERO {
            return Err(ConfigError::InvalidValue {
                name: var_name("REQUEST_TIMEOUT"),
                message: "must be greater than zero".to_string(),
            });
        }
        if !matches!(self.backend_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                name: var_name("BACKEND_BASE_URL"),
                message: format!(
                    "must be an http or https URL, got scheme '{}'",
                    self.backend_base_url.scheme()
                ),
            });
        }
        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: var_name("HOST"),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Configuration suitable for tests: stdio transport, short timeout.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            backend_base_url: Url::parse("http://127.0.0.1:8080").expect("static URL"),
            host: "127.0.0.1".to_string(),
            port: 8085,
            transport: TransportMode::Stdio,
            request_timeout: Duration::from_secs(5),
            access_token: None,
            log_level: "debug".to_string(),
        }
    }
}

fn var_name(name: &str) -> String {
    format!("{ENV_PREFIX}{name}")
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(var_name(name)).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match optional_env(name) {
        Some(val) => val.parse().map_err(|e| ConfigError::ParseInt {
            name: var_name(name),
            source: e,
        }),
        None => Ok(default),
    }
}

fn parse_env_f64(name: &str, default: f64) -> Result<f64, ConfigError> {
    match optional_env(name) {
        Some(val) => val.parse().map_err(|e| ConfigError::ParseFloat {
            name: var_name(name),
            source: e,
        }),
        None => Ok(default),
    }
}

fn parse_env_url(name: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = env_or_default(name, default);
    Url::parse(&raw).map_err(|e| ConfigError::ParseUrl {
        name: var_name(name),
        source: e,
    })
}

fn parse_transport(value: &str) -> Result<TransportMode, ConfigError> {
    match value.to_lowercase().as_str() {
        "stdio" => Ok(TransportMode::Stdio),
        "sse" => Ok(TransportMode::Sse),
        "streamable-http" => Ok(TransportMode::StreamableHttp),
        _ => Err(ConfigError::InvalidValue {
            name: var_name("TRANSPORT"),
            message: format!("must be 'stdio', 'sse' or 'streamable-http', got '{value}'"),
        }),
    }
}
