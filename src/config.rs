//! Configuration management for tcpcat services
//!
//! Loads startup settings from `config.toml` with `TCPCAT_*` environment
//! overrides, and turns them into `ServerOptions`.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ServerError;
use crate::server::{DEFAULT_BUFFER_SIZE, ServerOptions};
use crate::utils::rolling::{self, Rotation};
use crate::utils::snowflake::{self, MAX_NODE_ID, Snowflake};

/// Startup configuration. Every field has a default, so an empty or missing
/// file still yields a usable config.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address to bind
    /// Environment: TCPCAT_BIND_ADDRESS
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Environment: TCPCAT_PORT
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum bytes per read
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Epoch for connection ids, `YYYY-MM-DD`
    #[serde(default = "default_id_epoch")]
    pub id_epoch: String,

    /// Node id embedded in connection ids (0..=1023)
    #[serde(default = "default_node_id")]
    pub node_id: u16,

    /// Append logs to this file instead of stdout
    #[serde(default)]
    pub log_file: Option<String>,

    /// Rotate the log file once it would grow past this many MiB
    #[serde(default = "default_log_max_size_mb")]
    pub log_max_size_mb: u64,

    /// Rotated files to keep; 0 truncates in place
    #[serde(default = "default_log_max_backups")]
    pub log_max_backups: usize,

    /// With `log_file` set, also log at debug level to stdout
    #[serde(default)]
    pub log_console: bool,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9677
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_id_epoch() -> String {
    "2022-07-07".to_string()
}

fn default_node_id() -> u16 {
    snowflake::DEFAULT_NODE_ID
}

fn default_log_max_size_mb() -> u64 {
    rolling::DEFAULT_MAX_BYTES / (1024 * 1024)
}

fn default_log_max_backups() -> usize {
    rolling::DEFAULT_MAX_BACKUPS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            buffer_size: default_buffer_size(),
            id_epoch: default_id_epoch(),
            node_id: default_node_id(),
            log_file: None,
            log_max_size_mb: default_log_max_size_mb(),
            log_max_backups: default_log_max_backups(),
            log_console: false,
        }
    }
}

impl ServerConfig {
    /// Load `config.toml` from the working directory (optional) with
    /// environment overrides.
    pub fn load() -> Result<Self, ServerError> {
        Self::load_from("config")
    }

    /// Load from `path` (extension optional) with environment overrides.
    pub fn load_from(path: &str) -> Result<Self, ServerError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("TCPCAT").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.port == 0 {
            return Err(ServerError::InvalidConfig("port cannot be 0".into()));
        }

        if self.bind_address.trim().is_empty() {
            return Err(ServerError::InvalidConfig(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(ServerError::InvalidBufferSize);
        }

        if self.node_id > MAX_NODE_ID {
            return Err(ServerError::InvalidConfig(format!(
                "node_id must be at most {}",
                MAX_NODE_ID
            )));
        }

        if self.log_max_size_mb == 0 {
            return Err(ServerError::InvalidConfig(
                "log_max_size_mb cannot be 0".into(),
            ));
        }

        let epoch = snowflake::parse_epoch(&self.id_epoch)?;
        if epoch > chrono::Utc::now().timestamp_millis() {
            return Err(ServerError::InvalidConfig(
                "id_epoch cannot be in the future".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as a socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file.as_ref().map(PathBuf::from)
    }

    pub fn log_rotation(&self) -> Rotation {
        Rotation {
            max_bytes: self.log_max_size_mb.saturating_mul(1024 * 1024),
            max_backups: self.log_max_backups,
        }
    }

    /// Options binding `socket_addr()` with this config's buffer size and id
    /// generator. Hooks and logger are left for the caller.
    pub fn to_options(&self) -> Result<ServerOptions, ServerError> {
        let ids = Snowflake::from_date(&self.id_epoch, self.node_id)?;
        Ok(ServerOptions::new()
            .bind_addr(self.socket_addr())
            .buffer_size(self.buffer_size)
            .id_allocator(Arc::new(ids)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcpcat.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let path = path.to_string_lossy().into_owned();
        (dir, path)
    }

    #[test]
    fn test_load_from_file() {
        let (_dir, path) = write_config(
            r#"
bind_address = "127.0.0.1"
port = 7000
buffer_size = 4096
node_id = 3
log_file = "tcpcat.log"
log_max_size_mb = 16
log_max_backups = 0
log_console = true
"#,
        );

        let config = ServerConfig::load_from(&path).unwrap();
        assert_eq!(config.socket_addr(), "127.0.0.1:7000");
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.node_id, 3);
        assert_eq!(config.id_epoch, "2022-07-07");
        assert_eq!(config.log_file_path(), Some(PathBuf::from("tcpcat.log")));
        assert!(config.log_console);
        assert_eq!(
            config.log_rotation(),
            Rotation {
                max_bytes: 16 * 1024 * 1024,
                max_backups: 0,
            }
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let (_dir, path) = write_config("port = 9000\nbuffer_size = 0\n");
        assert!(matches!(
            ServerConfig::load_from(&path),
            Err(ServerError::InvalidBufferSize)
        ));

        let (_dir, path) = write_config("node_id = 2048\n");
        assert!(matches!(
            ServerConfig::load_from(&path),
            Err(ServerError::InvalidConfig(_))
        ));

        let (_dir, path) = write_config("log_max_size_mb = 0\n");
        assert!(matches!(
            ServerConfig::load_from(&path),
            Err(ServerError::InvalidConfig(_))
        ));

        let (_dir, path) = write_config("id_epoch = \"yesterday\"\n");
        assert!(ServerConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr(), "0.0.0.0:9677");
        assert_eq!(config.log_rotation(), Rotation::default());

        let options = config.to_options().unwrap();
        assert_eq!(options.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(options.bind_address.as_deref(), Some("0.0.0.0:9677"));
        assert!(options.id_allocator.is_some());
    }
}
