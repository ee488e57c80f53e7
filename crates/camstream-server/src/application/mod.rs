//! Application layer for camstream-server.
//!
//! The application layer decides *when* the camera runs; the infrastructure
//! layer decides *how* bytes reach the browser.
//!
//! # Responsibilities
//!
//! - Owning the camera on a dedicated device thread ([`device_worker`])
//! - The start/stop state machine and grace timer ([`camera_controller`])
//! - Per-connection open/request/close orchestration ([`session`])
//!
//! # What does NOT belong here?
//!
//! - Sockets, HTTP routing, WebSocket framing (infrastructure)
//! - Talking to a specific camera driver (infrastructure)

pub mod camera_controller;
pub mod device_worker;
pub mod session;

pub use camera_controller::{CameraController, CameraError};
pub use device_worker::DeviceWorker;
pub use session::StreamingSession;
