use crate::http_share::HTTP_PORT;
use crate::transfer::{CHUNK_SIZE, CLEANUP_DELAY_SECS};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "roomrelay";
const APP_NAME: &str = "room_relay";
const CONFIG_FILE: &str = "config.json";

/// Directory holding `config.json`, replacing the platform config dir
pub const CONFIG_DIR_ENV: &str = "ROOM_RELAY_CONFIG_DIR";
pub const PORT_ENV: &str = "ROOM_RELAY_PORT";
pub const UPLOAD_DIR_ENV: &str = "ROOM_RELAY_UPLOAD_DIR";

/// Default outbound queue depth per connection, in events
pub const OUTBOUND_CAPACITY: usize = 64;

/// Default upload cap (1 GiB)
pub const MAX_UPLOAD_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub chunk_size: usize,
    /// Seconds between a completed transfer and deletion of its file
    pub cleanup_delay_secs: u64,
    pub outbound_capacity: usize,
    pub max_upload_bytes: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let upload_dir = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME))
            .join("uploads");

        Self {
            port: HTTP_PORT,
            upload_dir,
            chunk_size: CHUNK_SIZE,
            cleanup_delay_secs: CLEANUP_DELAY_SECS,
            outbound_capacity: OUTBOUND_CAPACITY,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl RelayConfig {
    /// Get the config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Some(PathBuf::from(dir).join(CONFIG_FILE));
        }

        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load config from disk (or defaults), then apply env overrides
    pub fn load() -> Self {
        let mut config = match Self::get_config_path() {
            Some(path) => Self::from_file(&path),
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Read a config file, falling back to defaults if it is missing or invalid
    pub fn from_file(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Apply `ROOM_RELAY_*` overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup(PORT_ENV) {
            match port.trim().parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("Ignoring invalid {}: {}", PORT_ENV, port),
            }
        }

        if let Some(dir) = lookup(UPLOAD_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.upload_dir = PathBuf::from(dir);
        }
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }

    /// Listen on all interfaces at the configured port
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("relay_config_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.chunk_size, 64 * 1024);
        assert_eq!(config.cleanup_delay(), Duration::from_secs(60));
        assert!(config.upload_dir.ends_with("uploads"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = temp_dir();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, r#"{"port": 9000, "cleanup_delay_secs": 5}"#).unwrap();

        let config = RelayConfig::from_file(&path);
        assert_eq!(config.port, 9000);
        assert_eq!(config.cleanup_delay_secs, 5);
        assert_eq!(config.chunk_size, CHUNK_SIZE);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_or_missing_file_is_default() {
        let dir = temp_dir();
        let path = dir.join(CONFIG_FILE);
        assert_eq!(RelayConfig::from_file(&path), RelayConfig::default());

        fs::write(&path, "not json").unwrap();
        assert_eq!(RelayConfig::from_file(&path), RelayConfig::default());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_env_overrides() {
        let vars = HashMap::from([
            (PORT_ENV, "9100".to_string()),
            (UPLOAD_DIR_ENV, "/srv/relay".to_string()),
        ]);
        let mut config = RelayConfig::default();
        config.apply_overrides(|key| vars.get(key).cloned());

        assert_eq!(config.port, 9100);
        assert_eq!(config.upload_dir, PathBuf::from("/srv/relay"));
        assert_eq!(config.bind_addr().port(), 9100);
    }

    #[test]
    fn test_bad_port_override_ignored() {
        let mut config = RelayConfig::default();
        config.apply_overrides(|key| (key == PORT_ENV).then(|| "eighty".to_string()));
        assert_eq!(config.port, HTTP_PORT);
    }
}
