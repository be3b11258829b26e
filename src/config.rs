use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Static process configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Interface whose peer list this process manages.
    pub interface: String,
    /// Server config file; defaults to `/etc/wireguard/<interface>.conf`.
    #[serde(default)]
    pub server_config: Option<PathBuf>,
    /// Directory client configs and QR artifacts are written to.
    pub client_configs_path: PathBuf,
    #[serde(default)]
    pub client_config_prefix: Option<String>,
    /// The server's public key, as handed out to clients.
    pub public_key: String,
    /// AllowedIPs range clients route through the tunnel.
    pub allowed_ips: String,
    /// Endpoint clients connect to. Hostnames are legal here.
    pub endpoint: String,
    #[serde(default)]
    pub dns: Option<String>,
    /// Address template with a single `{}` slot for the host identifier.
    pub address_template: String,
    #[serde(default)]
    pub start_host_id: Option<u32>,
    /// SQLite database path or URL.
    pub database: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn server_config_path(&self) -> PathBuf {
        self.server_config
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/etc/wireguard/{}.conf", self.interface)))
    }

    pub fn client_address(&self, host_id: u32) -> String {
        self.address_template
            .replacen("{}", &host_id.to_string(), 1)
    }

    pub fn client_file(&self, name: &str, ext: &str) -> PathBuf {
        let prefix = self.client_config_prefix.as_deref().unwrap_or("");
        self.client_configs_path
            .join(format!("{prefix}{name}.{ext}"))
    }
}
