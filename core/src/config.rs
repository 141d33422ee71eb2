use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "recboard";
const SOCKET_FILE_NAME: &str = "recboard.sock";

/// Top-level configuration shared by the host daemon and the CLI
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RecBoardConfig {
    /// Unix socket the host listens on and the CLI connects to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
    /// Default log filter when neither the CLI flag nor RECBOARD_LOG is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub transport: TransportSettings,
}

/// Settings for the handler-capable side
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HostConfig {
    /// Reclist used when a `reclist:load` request does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclist_path: Option<PathBuf>,
    /// Converter executable invoked for `audio:save`
    #[serde(default = "HostConfig::default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Sample rate of the stored wav files
    #[serde(default = "HostConfig::default_sample_rate")]
    pub sample_rate: u32,
}

impl HostConfig {
    fn default_ffmpeg_path() -> String {
        "ffmpeg".to_string()
    }

    fn default_sample_rate() -> u32 {
        48_000
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            reclist_path: None,
            ffmpeg_path: Self::default_ffmpeg_path(),
            sample_rate: Self::default_sample_rate(),
        }
    }
}

/// Settings for the framed socket channel
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TransportSettings {
    /// Largest accepted frame body in bytes
    #[serde(default = "TransportSettings::default_max_frame_len")]
    pub max_frame_len: usize,
    /// Capacity of the inbound envelope queue
    #[serde(default = "TransportSettings::default_inbound_capacity")]
    pub inbound_capacity: usize,
    /// How often the CLI retries connecting to the host socket
    #[serde(default = "TransportSettings::default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "TransportSettings::default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Optional deadline for CLI requests. Unset means wait for the reply forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl TransportSettings {
    fn default_max_frame_len() -> usize {
        64 * 1024 * 1024
    }

    fn default_inbound_capacity() -> usize {
        64
    }

    fn default_connect_retries() -> u32 {
        3
    }

    fn default_retry_delay_ms() -> u64 {
        500
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_frame_len: Self::default_max_frame_len(),
            inbound_capacity: Self::default_inbound_capacity(),
            connect_retries: Self::default_connect_retries(),
            retry_delay_ms: Self::default_retry_delay_ms(),
            request_timeout_secs: None,
        }
    }
}

impl RecBoardConfig {
    /// Loads the configuration from the default location, falling back to defaults
    pub fn load() -> ConfigResult<Self> {
        let path = get_default_config_file()?;
        Self::load_from_file(&path)
    }

    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves configuration to a file, creating the parent directory if needed
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }

        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Socket path from the config, or the per-user runtime default
    pub fn resolve_socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(get_default_socket_path)
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir() -> ConfigResult<PathBuf> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::MissingDirectory("config"))?;
    Ok(config_dir.join(APP_NAME))
}

/// Helper function to get default config file path
pub fn get_default_config_file() -> ConfigResult<PathBuf> {
    Ok(get_default_config_dir()?.join("config.toml"))
}

/// Runtime directory socket, falling back to the temp dir on platforms without one
pub fn get_default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(SOCKET_FILE_NAME)
}
