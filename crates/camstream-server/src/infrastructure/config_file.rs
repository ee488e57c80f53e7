//! Optional TOML configuration file.
//!
//! Every key is optional; a key that is absent leaves the built-in default
//! in place, and command-line flags or `CAMSTREAM_*` variables override
//! whatever the file sets.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 8888
//! static_dir = "/usr/share/camstream/static"
//! stop_delay_secs = 7
//!
//! [camera]
//! device = "/dev/video0"     # or an index such as "1", or "stub://"
//! width = 1280
//! height = 720
//! jpeg_quality = 80
//! flip_horizontal = false
//! flip_vertical = true
//! ```
//!
//! Unknown keys are rejected so that a misspelt setting fails loudly
//! instead of being silently ignored.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::config::{CameraDevice, InvalidConfig, ServerConfig};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] InvalidConfig),
}

// ── File schema ───────────────────────────────────────────────────────────────

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub camera: CameraSection,
}

/// `[server]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub static_dir: Option<PathBuf>,
    pub stop_delay_secs: Option<u64>,
}

/// `[camera]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CameraSection {
    pub device: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub jpeg_quality: Option<u8>,
    pub flip_horizontal: Option<bool>,
    pub flip_vertical: Option<bool>,
}

impl FileConfig {
    /// Writes every key present in the file over `config`.
    ///
    /// Range checks are left to [`ServerConfig::validate`], which runs once
    /// all layers have been applied.
    ///
    /// # Errors
    ///
    /// [`InvalidConfig::EmptyDevice`] for `device = ""`.
    pub fn apply_to(&self, config: &mut ServerConfig) -> Result<(), InvalidConfig> {
        let server = &self.server;
        if let Some(ip) = server.bind {
            config.bind_addr = SocketAddr::new(ip, config.bind_addr.port());
        }
        if let Some(port) = server.port {
            config.bind_addr.set_port(port);
        }
        if let Some(dir) = &server.static_dir {
            config.static_dir = dir.clone();
        }
        if let Some(secs) = server.stop_delay_secs {
            config.stop_delay = Duration::from_secs(secs);
        }

        let camera = &self.camera;
        if let Some(device) = &camera.device {
            config.camera.device = device.parse::<CameraDevice>()?;
        }
        if let Some(width) = camera.width {
            config.camera.width = width;
        }
        if let Some(height) = camera.height {
            config.camera.height = height;
        }
        if let Some(quality) = camera.jpeg_quality {
            config.camera.jpeg_quality = quality;
        }
        if let Some(flip) = camera.flip_horizontal {
            config.camera.flip_horizontal = flip;
        }
        if let Some(flip) = camera.flip_vertical {
            config.camera.flip_vertical = flip;
        }
        Ok(())
    }
}

/// Parses configuration from TOML text.
///
/// # Errors
///
/// [`ConfigError::Parse`] for malformed TOML or unknown keys.
pub fn parse_config(content: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Reads and parses the file at `path`.
///
/// Unlike the server's other inputs a missing file is an error: the path
/// was given explicitly.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`]
/// if its content is invalid.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&content)?;
    debug!("loaded configuration from {}", path.display());
    Ok(config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
