//! Video4Linux2 camera.
//!
//! The device node is opened at construction so a missing or inaccessible
//! camera is reported at process start.  Streaming buffers exist only
//! between [`FrameSource::start`] and [`FrameSource::stop`]; while the
//! server has no viewers the device is open but idle, which lets the
//! camera's own power management (and its activity LED) switch off.

use std::path::{Path, PathBuf};

use camstream_core::{Frame, FrameSource, SourceError};
use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::jpeg::JpegEncoder;
use crate::domain::config::CameraConfig;

/// Number of mmap buffers queued with the driver.
const BUFFER_COUNT: u32 = 4;

const RGB24: &[u8; 4] = b"RGB3";

/// A V4L2 capture device delivering RGB24 frames.
pub struct V4l2Camera {
    path: PathBuf,
    card: String,
    device: Device,
    requested: (u32, u32),
    active: (u32, u32),
    encoder: JpegEncoder,
    stream: Option<MmapStream<'static>>,
}

impl V4l2Camera {
    /// Opens the device node.
    ///
    /// # Errors
    ///
    /// [`SourceError::Init`] if the node cannot be opened.
    pub fn open(path: &Path, config: &CameraConfig) -> Result<Self, SourceError> {
        let device = Device::with_path(path)
            .map_err(|e| SourceError::Init(format!("open {}: {e}", path.display())))?;
        let card = match device.query_caps() {
            Ok(caps) => caps.card,
            Err(e) => {
                warn!("could not query capabilities of {}: {e}", path.display());
                String::from("unknown")
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            card,
            device,
            requested: (config.width, config.height),
            active: (config.width, config.height),
            encoder: JpegEncoder::from_config(config),
            stream: None,
        })
    }

    fn negotiate_format(&mut self) -> Result<(), SourceError> {
        let mut format = self
            .device
            .format()
            .map_err(|e| SourceError::Start(format!("read format: {e}")))?;
        format.width = self.requested.0;
        format.height = self.requested.1;
        format.fourcc = FourCC::new(RGB24);

        let format = self
            .device
            .set_format(&format)
            .map_err(|e| SourceError::Start(format!("set format: {e}")))?;
        if format.fourcc != FourCC::new(RGB24) {
            return Err(SourceError::Start(format!(
                "{} does not deliver RGB24 (driver chose {})",
                self.path.display(),
                format.fourcc
            )));
        }
        if (format.width, format.height) != self.requested {
            warn!(
                "{} adjusted resolution to {}x{}",
                self.path.display(),
                format.width,
                format.height
            );
        }
        self.active = (format.width, format.height);
        Ok(())
    }
}

impl FrameSource for V4l2Camera {
    fn start(&mut self) -> Result<(), SourceError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.negotiate_format()?;
        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| SourceError::Start(format!("create buffer stream: {e}")))?;
        self.stream = Some(stream);
        debug!(
            "{} streaming at {}x{}",
            self.path.display(),
            self.active.0,
            self.active.1
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        // Dropping the stream issues STREAMOFF and unmaps the buffers.
        self.stream = None;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, SourceError> {
        let (width, height) = self.active;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| SourceError::Capture("camera is not started".into()))?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| SourceError::Capture(e.to_string()))?;

        let expected = (width * height * 3) as usize;
        // Some drivers leave bytesused at zero for uncompressed formats.
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        if used < expected {
            return Err(SourceError::Capture(format!(
                "short frame: {used} of {expected} bytes"
            )));
        }
        let rgb = buf[..expected].to_vec();
        self.encoder.encode_rgb(width, height, rgb)
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.path.display(), self.card)
    }
}
