//! Frame source abstraction.
//!
//! A [`FrameSource`] wraps the physical camera.  The server only ever needs
//! three things from it: power it up, power it down, and grab one encoded
//! JPEG.  Every call may block on hardware I/O and every call may fail
//! (device unplugged, permission revoked, driver hiccup), so the server runs
//! them on a dedicated thread and treats failures as ordinary values.
//!
//! # Testability
//!
//! The trait lets tests substitute [`mock::MockFrameSource`] for real
//! hardware and observe exactly how often, and how concurrently, each
//! operation was invoked.

use thiserror::Error;

use crate::domain::frame::Frame;

pub mod mock;

/// Error type for frame source operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The device could not be opened at all.  Fatal at process start.
    #[error("failed to initialise camera: {0}")]
    Init(String),
    /// Powering the device up failed.
    #[error("failed to start camera: {0}")]
    Start(String),
    /// Powering the device down failed.
    #[error("failed to stop camera: {0}")]
    Stop(String),
    /// Grabbing a frame from the device failed.
    #[error("failed to capture frame: {0}")]
    Capture(String),
    /// The raw image could not be encoded to JPEG.
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// Trait abstracting the physical camera.
///
/// Implementations are driven from a single thread, one call at a time, so
/// they take `&mut self` and need no internal locking.
pub trait FrameSource: Send + 'static {
    /// Powers the device up.  Called only while the device is off.
    fn start(&mut self) -> Result<(), SourceError>;

    /// Powers the device down and releases its buffers.
    fn stop(&mut self) -> Result<(), SourceError>;

    /// Captures and encodes one still.  Called only while the device is on.
    fn capture(&mut self) -> Result<Frame, SourceError>;

    /// Human-readable device description for logs.
    fn describe(&self) -> String {
        String::from("camera")
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn start(&mut self) -> Result<(), SourceError> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        (**self).stop()
    }

    fn capture(&mut self) -> Result<Frame, SourceError> {
        (**self).capture()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
