//! Server and camera configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It is assembled once at startup (CLI flags, `CAMSTREAM_*` environment
//! variables, an optional TOML file, then these defaults) and never changes
//! while the process runs.
//!
//! The defaults mirror a small USB webcam setup: port 8888, the first video
//! device, 1920×1080, JPEG quality 75, and a seven-second grace delay before
//! the camera is powered down after the last viewer leaves.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Device-string prefix that selects the built-in synthetic camera.
pub const SYNTHETIC_PREFIX: &str = "stub://";

/// A configuration value outside its allowed range.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    JpegQuality(u8),
    #[error("camera resolution must be non-zero, got {width}x{height}")]
    Resolution { width: u32, height: u32 },
    #[error("camera device must not be empty")]
    EmptyDevice,
}

/// Which camera to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraDevice {
    /// The `n`th video device, i.e. `/dev/video<n>`.
    Index(u32),
    /// An explicit device node.
    Path(PathBuf),
    /// The in-process test-pattern camera.
    Synthetic,
}

impl CameraDevice {
    /// Device node to open, or `None` for the synthetic camera.
    pub fn node_path(&self) -> Option<PathBuf> {
        match self {
            CameraDevice::Index(n) => Some(PathBuf::from(format!("/dev/video{n}"))),
            CameraDevice::Path(path) => Some(path.clone()),
            CameraDevice::Synthetic => None,
        }
    }
}

impl Default for CameraDevice {
    fn default() -> Self {
        CameraDevice::Index(0)
    }
}

impl FromStr for CameraDevice {
    type Err = InvalidConfig;

    /// Parses `"2"` as an index, `"stub://..."` as the synthetic camera and
    /// anything else as a device path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InvalidConfig::EmptyDevice);
        }
        if s.starts_with(SYNTHETIC_PREFIX) {
            return Ok(CameraDevice::Synthetic);
        }
        match s.parse::<u32>() {
            Ok(n) => Ok(CameraDevice::Index(n)),
            Err(_) => Ok(CameraDevice::Path(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for CameraDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraDevice::Index(n) => write!(f, "/dev/video{n}"),
            CameraDevice::Path(path) => write!(f, "{}", path.display()),
            CameraDevice::Synthetic => write!(f, "{SYNTHETIC_PREFIX}synthetic"),
        }
    }
}

/// Parameters passed through to the frame source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    pub device: CameraDevice,
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1 (smallest) to 100 (best).
    pub jpeg_quality: u8,
    /// Mirror the image left-to-right.
    pub flip_horizontal: bool,
    /// Mirror the image top-to-bottom.
    pub flip_vertical: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: CameraDevice::default(),
            width: 1920,
            height: 1080,
            jpeg_quality: 75,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(InvalidConfig::JpegQuality(self.jpeg_quality));
        }
        if self.width == 0 || self.height == 0 {
            return Err(InvalidConfig::Resolution {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// All runtime configuration for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind_addr: SocketAddr,
    /// Directory served for every path other than `/websocket`.
    pub static_dir: PathBuf,
    /// Grace delay between the last viewer leaving and the camera stopping.
    pub stop_delay: Duration,
    pub camera: CameraConfig,
}

impl Default for ServerConfig {
    /// | Field        | Default         |
    /// |--------------|-----------------|
    /// | bind_addr    | `0.0.0.0:8888`  |
    /// | static_dir   | `static`        |
    /// | stop_delay   | 7 seconds       |
    /// | camera       | `/dev/video0`, 1920×1080, quality 75, no flips |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8888)),
            static_dir: PathBuf::from("static"),
            stop_delay: Duration::from_secs(7),
            camera: CameraConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Checks every range constraint.  A zero stop delay is allowed and
    /// means "stop on the next timer turn".
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        self.camera.validate()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
