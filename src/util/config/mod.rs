//! Host configuration
//!
//! # Lookup order
//!
//! ```text
//! Priority (high -> low):
//! 1. --config <FILE>
//! 2. RGSS_HOST_CONFIG environment variable
//! 3. Project-level (./rgss-host.toml)
//! 4. User-level (~/.config/rgss-host/config.toml)
//! 5. Default values
//! ```
//!
//! # Example
//!
//! ```toml
//! [host]
//! rgss_version = 3
//! game_dir = "."
//!
//! [loader]
//! on_open_failure = "fail"
//!
//! [coroutine]
//! panic_policy = "propagate"
//!
//! [log]
//! level = "debug"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bundle::LoaderConfig;
use crate::host::RgssVersion;
use crate::runtime::coroutine::CoroutineConfig;
use crate::util::logger::LogLevel;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RGSS_HOST_CONFIG";
/// Project-level config file name.
pub const PROJECT_CONFIG_FILE: &str = "rgss-host.toml";

/// Complete host configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Game settings
    #[serde(default)]
    pub host: HostSection,
    /// Script loader settings
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Coroutine settings
    #[serde(default)]
    pub coroutine: CoroutineConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Game settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSection {
    /// Engine generation, selects the script container file
    #[serde(default)]
    pub rgss_version: RgssVersion,
    /// Game root; container paths are resolved against it
    #[serde(default = "default_game_dir")]
    pub game_dir: PathBuf,
}

fn default_game_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            rgss_version: RgssVersion::default(),
            game_dir: default_game_dir(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogConfig {
    /// Minimum level
    #[serde(default)]
    pub level: LogLevel,
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("rgss-host"));
    }

    // Fallback to ~/.config/rgss-host
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("rgss-host"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("rgss-host"));
    }

    None
}

/// Get the user config file path (~/.config/rgss-host/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Parse configuration text
pub fn parse_config(content: &str) -> Result<HostConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::ParseError)
}

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::IoError)?;
    parse_config(&content)
}

/// Load user-level configuration
/// Returns default config if file doesn't exist
pub fn load_user_config() -> Result<HostConfig, ConfigError> {
    match get_config_path() {
        Some(path) if path.exists() => load_config(&path),
        _ => Ok(HostConfig::default()),
    }
}

/// Save configuration to a file, creating parent directories
pub fn save_config(
    path: &Path,
    config: &HostConfig,
) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(ConfigError::IoError)?;
        }
    }

    let content = toml::to_string_pretty(config).map_err(ConfigError::SerializeError)?;
    fs::write(path, content).map_err(ConfigError::IoError)?;

    Ok(())
}

/// Resolve configuration following the lookup order.
///
/// Returns the config and the file it came from (`None` for defaults).
pub fn resolve_config(explicit: Option<&Path>) -> Result<(HostConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return load_config(path).map(|c| (c, Some(path.to_path_buf())));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        return load_config(&path).map(|c| (c, Some(path)));
    }

    let project = PathBuf::from(PROJECT_CONFIG_FILE);
    if project.exists() {
        return load_config(&project).map(|c| (c, Some(project)));
    }

    match get_config_path() {
        Some(path) if path.exists() => load_config(&path).map(|c| (c, Some(path))),
        _ => Ok((HostConfig::default(), None)),
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(toml::de::Error),
    SerializeError(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Config parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Config serialize error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
