//! Application configuration.
//!
//! [`Config`] is deserialized from TOML. Every section defaults sensibly so
//! an empty file is valid. A few environment variables override file values
//! after loading; see [`Config::apply_overrides`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::photo::MAX_UPLOAD_BYTES;
use crate::Error;

/// Top-level paths served by the API. The public blob prefix must not
/// overlap them.
pub const RESERVED_PATHS: &[&str] = &["/api", "/health", "/photos"];

/// Environment variable overriding `server.host`.
pub const ENV_HOST: &str = "PHOTOSHELF_HOST";
/// Environment variable overriding `server.port`.
pub const ENV_PORT: &str = "PORT";
/// Environment variable overriding `database.path`.
pub const ENV_DB_PATH: &str = "PHOTOSHELF_DB_PATH";
/// Environment variable overriding `storage.upload_dir`.
pub const ENV_UPLOAD_DIR: &str = "PHOTOSHELF_UPLOAD_DIR";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file. A missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, the file does not exist, or it cannot be parsed.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid {ENV_PORT} value {port:?}"),
            }
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_UPLOAD_DIR) {
            self.storage.upload_dir = PathBuf::from(dir);
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }
        if self.database.max_connections == 0 {
            warnings.push("database.max_connections is 0; using 1".into());
        }
        if self.database.connect_attempts == 0 {
            warnings.push("database.connect_attempts is 0; one attempt will be made".into());
        }
        if self.storage.max_upload_bytes == 0 {
            warnings.push("storage.max_upload_bytes is 0; every upload will be rejected".into());
        }
        if !self.storage.public_prefix.starts_with('/') {
            warnings.push(format!(
                "storage.public_prefix {:?} should start with '/'",
                self.storage.public_prefix
            ));
        }
        if let Some(path) = self.storage.prefix_conflict() {
            warnings.push(format!(
                "storage.public_prefix {:?} overlaps the API path {path}",
                self.storage.public_prefix
            ));
        }
        if let Some(dir) = &self.server.static_dir {
            if !dir.is_dir() {
                warnings.push(format!("server.static_dir {} does not exist", dir.display()));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Optional directory of frontend assets served as an SPA fallback.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            static_dir: None,
        }
    }
}

/// Metadata store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    /// Attempts made at startup before giving up.
    pub connect_attempts: u32,
    /// Fixed delay between startup attempts.
    pub connect_delay_ms: u64,
    /// How long a request waits for a pooled connection.
    pub connection_timeout_secs: u64,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/photoshelf.db"),
            max_connections: 10,
            connect_attempts: 20,
            connect_delay_ms: 2000,
            connection_timeout_secs: 5,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs.max(1))
    }
}

/// Blob store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    /// URL prefix under which blobs are served and recorded as locators.
    pub public_prefix: String,
    pub max_upload_bytes: u64,
    /// Run the orphan sweep periodically when set.
    pub sweep_interval_secs: Option<u64>,
    /// Blobs younger than this are never swept.
    #[serde(default = "default_sweep_grace")]
    pub sweep_grace_secs: u64,
}

fn default_sweep_grace() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            public_prefix: "/uploads".into(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            sweep_interval_secs: None,
            sweep_grace_secs: default_sweep_grace(),
        }
    }
}

impl StorageConfig {
    pub fn sweep_grace(&self) -> Duration {
        Duration::from_secs(self.sweep_grace_secs)
    }

    /// `public_prefix` with exactly one leading slash and no trailing one.
    /// Falls back to `/uploads` when nothing usable remains.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.public_prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            "/uploads".into()
        } else {
            format!("/{trimmed}")
        }
    }

    /// The reserved API path the public prefix would shadow, if any.
    pub fn prefix_conflict(&self) -> Option<&'static str> {
        let prefix = self.normalized_prefix();
        RESERVED_PATHS.iter().copied().find(|path| {
            prefix == *path
                || prefix.starts_with(&format!("{path}/"))
                || path.starts_with(&format!("{prefix}/"))
        })
    }
}
