//! Concrete frame sources.
//!
//! [`open_camera`] turns a [`CameraConfig`] into a ready-to-start
//! [`FrameSource`]:
//!
//! | Device string        | Source                      | Availability            |
//! |----------------------|-----------------------------|-------------------------|
//! | `stub://…`           | [`SyntheticCamera`]         | always                  |
//! | `0`, `1`, …          | `V4l2Camera` on `/dev/videoN` | `--features v4l2`     |
//! | `/dev/video2`        | `V4l2Camera` on that node   | `--features v4l2`       |
//!
//! Opening is the only place a [`SourceError::Init`] can arise; the binary
//! treats it as fatal.

use camstream_core::{FrameSource, SourceError};
use tracing::info;

use crate::domain::config::{CameraConfig, CameraDevice};

pub mod jpeg;
pub mod synthetic;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use jpeg::JpegEncoder;
pub use synthetic::SyntheticCamera;

/// Opens the camera described by `config`.
///
/// # Errors
///
/// [`SourceError::Init`] if the device cannot be opened, or if a hardware
/// device is requested from a build without the `v4l2` feature.
pub fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>, SourceError> {
    info!(
        "initializing camera {} ({}x{}, quality {})",
        config.device, config.width, config.height, config.jpeg_quality
    );
    let source: Box<dyn FrameSource> = match &config.device {
        CameraDevice::Synthetic => Box::new(SyntheticCamera::new(config)),
        device => open_hardware(device, config)?,
    };
    info!("camera initialized: {}", source.describe());
    Ok(source)
}

#[cfg(feature = "v4l2")]
fn open_hardware(
    device: &CameraDevice,
    config: &CameraConfig,
) -> Result<Box<dyn FrameSource>, SourceError> {
    let path = device
        .node_path()
        .ok_or_else(|| SourceError::Init(format!("{device} has no device node")))?;
    Ok(Box::new(v4l2::V4l2Camera::open(&path, config)?))
}

#[cfg(not(feature = "v4l2"))]
fn open_hardware(
    device: &CameraDevice,
    _config: &CameraConfig,
) -> Result<Box<dyn FrameSource>, SourceError> {
    Err(SourceError::Init(format!(
        "cannot open {device}: built without V4L2 support (rebuild with `--features v4l2`, \
         or use `--camera stub://` for the synthetic camera)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_device_opens() {
        let config = CameraConfig {
            device: CameraDevice::Synthetic,
            width: 32,
            height: 16,
            ..CameraConfig::default()
        };
        let source = open_camera(&config).expect("synthetic camera always opens");
        assert!(source.describe().contains("synthetic"));
    }

    #[cfg(not(feature = "v4l2"))]
    #[test]
    fn test_hardware_device_without_feature_is_init_failure() {
        let config = CameraConfig::default();
        let result = open_camera(&config);
        assert!(matches!(result, Err(SourceError::Init(ref msg)) if msg.contains("v4l2")));
    }

    #[cfg(feature = "v4l2")]
    #[test]
    fn test_missing_device_node_is_init_failure() {
        let config = CameraConfig {
            device: CameraDevice::Path("/dev/does-not-exist-video".into()),
            ..CameraConfig::default()
        };
        assert!(matches!(open_camera(&config), Err(SourceError::Init(_))));
    }
}
