//! StreamingSession: one viewer's connection, from open to close.
//!
//! ```text
//! open     registry.add   ──► camera.request_start()      (always; cheap if already on)
//! message  camera.capture_frame() ──► one JPEG back to this viewer only
//! close    registry.remove ──► camera.request_stop()      (only if this was the last viewer)
//! ```
//!
//! The lifecycle calls are dispatched *inside* the registry's critical
//! section (see [`ClientRegistry::add_then`]), so a close that sees "last"
//! and an open that arrives at the same moment are ordered: either the stop
//! is requested first and the open cancels it, or the open registers first
//! and the close no longer sees "last".
//!
//! Closing happens on drop as well, which makes an aborted connection task
//! or a transport error indistinguishable from a clean close.

use std::net::SocketAddr;
use std::sync::Arc;

use camstream_core::{ClientId, ClientRegistry, Frame};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::camera_controller::{CameraController, CameraError};

/// Server-side state of one connected viewer.
#[derive(Debug)]
pub struct StreamingSession {
    id: ClientId,
    peer: SocketAddr,
    registry: Arc<ClientRegistry>,
    camera: CameraController,
    closed: bool,
}

impl StreamingSession {
    /// Registers a new viewer and asks for the camera to be started.
    pub fn open(peer: SocketAddr, registry: Arc<ClientRegistry>, camera: CameraController) -> Self {
        let id = Uuid::new_v4();
        registry.add_then(id, |first| {
            if first {
                debug!(client = %id, "first viewer connected");
            }
            camera.request_start();
        });
        info!(client = %id, %peer, viewers = registry.len(), "WebSocket opened");
        Self {
            id,
            peer,
            registry,
            camera,
            closed: false,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Handles one inbound request: captures a frame for this viewer.
    ///
    /// The request payload is irrelevant; any message asks for one frame.
    ///
    /// # Errors
    ///
    /// Returns the capture error; the session stays usable.
    pub async fn on_message(&self) -> Result<Frame, CameraError> {
        let result = self.camera.capture_frame().await;
        if let Err(e) = &result {
            warn!(client = %self.id, "frame request failed: {e}");
        }
        result
    }

    /// Unregisters the viewer; requests a delayed stop if it was the last.
    pub fn close(mut self) {
        self.unregister();
    }

    fn unregister(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let camera = &self.camera;
        let last = self.registry.remove_then(self.id, |last| {
            if last {
                camera.request_stop();
            }
            last
        });
        info!(
            client = %self.id,
            peer = %self.peer,
            last,
            "WebSocket closed"
        );
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.unregister();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
