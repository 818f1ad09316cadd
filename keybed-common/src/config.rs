//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration only. Sources, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable (`KEYBED_ROOT_FOLDER`)
//! 3. TOML config file
//! 4. OS-dependent compiled default
//!
//! A missing or unreadable config file never stops startup; a warning is
//! logged and the compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "KEYBED_ROOT_FOLDER";

/// Default HTTP port for the storefront service
pub const DEFAULT_PORT: u16 = 5730;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the catalog database and the compare record
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Comparison behaviour
    #[serde(default)]
    pub compare: CompareConfig,

    /// Token required in `x-admin-token` for admin routes.
    /// `None` disables the admin surface entirely.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            compare: CompareConfig::default(),
            admin_token: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// How an arriving compare route is applied to an existing compared set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePolicy {
    /// The route always wins: clear, then add the route's ids in order
    #[default]
    Replace,
    /// Keep the current set and add route ids not already present
    Merge,
}

/// Comparison settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompareConfig {
    #[serde(default)]
    pub route_policy: RoutePolicy,

    /// Remove ids that no longer resolve to a catalog record
    #[serde(default)]
    pub prune_dangling: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Load `explicit` or the platform config file, falling back to defaults
    ///
    /// Never fails. Nothing is logged here since this runs before tracing is
    /// initialized; the caller reports the returned [`ConfigOrigin`].
    pub fn load_or_default(explicit: Option<&Path>) -> (Self, ConfigOrigin) {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match config_file_path() {
                Ok(path) => path,
                Err(_) => return (Self::default(), ConfigOrigin::Defaults),
            },
        };

        match Self::load(&path) {
            Ok(config) => (config, ConfigOrigin::File(path)),
            Err(e) => (Self::default(), ConfigOrigin::Invalid(e.to_string())),
        }
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// No config file found
    Defaults,
    /// A config file existed but could not be used
    Invalid(String),
}

impl ConfigOrigin {
    /// Log the origin; call once tracing is up
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigOrigin::Defaults => info!("No config file found; using built-in defaults"),
            ConfigOrigin::Invalid(e) => warn!("{}; using built-in defaults", e),
        }
    }
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get the configuration file path for the platform
pub fn config_file_path() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("keybed").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/keybed/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("keybed"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/keybed"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("keybed"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/keybed"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("keybed"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\keybed"))
    } else {
        PathBuf::from("./keybed_data")
    }
}

/// Paths derived from the resolved root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    root: PathBuf,
}

impl RootFolder {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the root folder if it doesn't exist
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    /// SQLite catalog database
    pub fn database_path(&self) -> PathBuf {
        self.root.join("keybed.db")
    }

    /// Persisted comparison set
    pub fn compare_record_path(&self) -> PathBuf {
        self.root.join("compare_items.json")
    }
}
