//! Synthetic camera (`stub://`).
//!
//! Renders a diagonal colour gradient that drifts a few pixels per frame, so
//! a browser pointed at a machine without a webcam still shows obviously
//! live output.  Honours resolution, quality and flips like real hardware.

use camstream_core::{Frame, FrameSource, SourceError};
use tracing::debug;

use super::jpeg::JpegEncoder;
use crate::domain::config::CameraConfig;

/// Pixels the pattern moves per captured frame.
const DRIFT_PER_FRAME: u64 = 4;

/// In-process test-pattern camera.
#[derive(Debug)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    encoder: JpegEncoder,
    frames_captured: u64,
    running: bool,
}

impl SyntheticCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            encoder: JpegEncoder::from_config(config),
            frames_captured: 0,
            running: false,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    fn render(&self) -> Vec<u8> {
        let (w, h) = (u64::from(self.width), u64::from(self.height));
        let shift = self.frames_captured * DRIFT_PER_FRAME;
        let mut rgb = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                let r = ((x + shift) * 255 / w.max(1)) as u8;
                let g = (y * 255 / h.max(1)) as u8;
                let b = ((x + y + shift) % 256) as u8;
                rgb.extend_from_slice(&[r, g, b]);
            }
        }
        rgb
    }
}

impl FrameSource for SyntheticCamera {
    fn start(&mut self) -> Result<(), SourceError> {
        self.running = true;
        debug!("synthetic camera running at {}x{}", self.width, self.height);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        self.running = false;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, SourceError> {
        if !self.running {
            return Err(SourceError::Capture("synthetic camera is not started".into()));
        }
        let frame = self.encoder.encode_rgb(self.width, self.height, self.render())?;
        self.frames_captured += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("synthetic camera {}x{}", self.width, self.height)
    }
}
