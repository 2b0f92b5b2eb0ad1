use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

/// On-disk form of [`ServerConfig`]. Every key is optional; missing keys keep
/// their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("enrollment.db")
    }

    #[must_use]
    pub fn admin_token_path(&self) -> PathBuf {
        self.data_dir.join(".admin_token")
    }

    /// Reads a TOML config file and layers it over the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: ServerConfigFile =
            toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self::default().merge(file))
    }

    /// Overrides every field that is set in `file`.
    #[must_use]
    pub fn merge(mut self, file: ServerConfigFile) -> Self {
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(data_dir) = file.data_dir {
            self.data_dir = data_dir;
        }
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml("port = 9090\n").unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.db_path(), PathBuf::from("./data/enrollment.db"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = ServerConfig::from_toml("colour = \"blue\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            port: 3000,
            ..ServerConfig::default()
        };
        assert_eq!(config.socket_addr().unwrap().port(), 3000);
    }
}
