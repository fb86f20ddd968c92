/// Configuration management for guardia

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main guardia configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Backend MongoDB connection
    pub mongodb: MongoDBConfig,
    /// Storage quota filter configuration
    pub filter: FilterConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_addr: String,
    /// Maximum number of concurrent sessions
    pub max_connections: usize,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
}

/// Backend MongoDB connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDBConfig {
    /// Backend host
    pub host: String,
    /// Backend port
    pub port: u16,
    /// Database name monitored for quota purposes
    pub dbname: String,
    /// Username for the dbStats admin connection (may be empty)
    pub user: String,
    /// Password for the dbStats admin connection (may be empty)
    pub pass: String,
}

impl MongoDBConfig {
    pub fn backend_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage quota filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Whether the quota filter is enabled at all
    pub enabled: bool,
    /// Directory containing the monitored database's datafiles
    pub base_dir: String,
    /// Maximum number of datafiles before mutations are blocked
    pub quota_files: usize,
    /// Maximum on-disk data size (MiB) before mutations are blocked
    pub quota_data_size_mb: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
    /// Log to stdout
    pub stdout: bool,
    /// Log file path (optional)
    pub file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "0.0.0.0:27018".to_string(),
                max_connections: 10000,
                connection_timeout_sec: 60,
            },
            mongodb: MongoDBConfig {
                host: "127.0.0.1".to_string(),
                port: 27017,
                dbname: "app".to_string(),
                user: String::new(),
                pass: String::new(),
            },
            filter: FilterConfig {
                enabled: true,
                base_dir: "/var/lib/mongodb".to_string(),
                quota_files: 1000,
                quota_data_size_mb: 10 * 1024,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
                stdout: true,
                file: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        if self.server.connection_timeout_sec == 0 {
            return Err(ConfigError::ValidationError(
                "connection_timeout_sec must be greater than 0".to_string(),
            ));
        }

        self.server
            .listen_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|_| {
                ConfigError::ValidationError(format!(
                    "invalid listen_addr: {}",
                    self.server.listen_addr
                ))
            })?;

        if self.mongodb.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "mongodb.host cannot be empty".to_string(),
            ));
        }

        if self.mongodb.port == 0 {
            return Err(ConfigError::ValidationError(
                "mongodb.port must be greater than 0".to_string(),
            ));
        }

        if self.mongodb.dbname.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "mongodb.dbname cannot be empty".to_string(),
            ));
        }

        if self.filter.enabled {
            if self.filter.base_dir.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "filter.base_dir cannot be empty when filter.enabled is true".to_string(),
                ));
            }

            if self.filter.quota_files == 0 {
                return Err(ConfigError::ValidationError(
                    "filter.quota_files must be greater than 0 when filter.enabled is true"
                        .to_string(),
                ));
            }

            if self.filter.quota_data_size_mb == 0 {
                return Err(ConfigError::ValidationError(
                    "filter.quota_data_size_mb must be greater than 0 when filter.enabled is true"
                        .to_string(),
                ));
            }
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    /// Create an example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let config = Config {
            mongodb: MongoDBConfig {
                host: "10.0.1.10".to_string(),
                port: 27017,
                dbname: "app".to_string(),
                user: String::new(),
                pass: String::new(),
            },
            ..Default::default()
        };

        config.save_to_file(path)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_max_connections() {
        let mut config = Config::default();

        config.server.max_connections = 0;
        assert!(config.validate().is_err());

        config.server.max_connections = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_filter_requires_base_dir() {
        let mut config = Config::default();
        config.filter.enabled = true;
        config.filter.base_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_disabled_filter_skips_checks() {
        let mut config = Config::default();
        config.filter.enabled = false;
        config.filter.base_dir = String::new();
        config.filter.quota_files = 0;
        config.filter.quota_data_size_mb = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed_config: Config = toml::from_str(&toml_str).unwrap();
        assert!(parsed_config.validate().is_ok());
    }

    #[test]
    fn test_config_file_operations() {
        let config = Config::default();
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();
        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert!(loaded_config.validate().is_ok());
    }

    #[test]
    fn test_backend_addr() {
        let config = Config::default();
        assert_eq!(config.mongodb.backend_addr(), "127.0.0.1:27017");
    }
}
