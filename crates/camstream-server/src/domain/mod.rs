//! Domain layer for camstream-server.
//!
//! Pure types with no I/O: the runtime configuration and the JSON messages
//! the server sends to browsers.  Nothing here touches sockets, files, or
//! the camera.

pub mod config;
pub mod messages;

pub use config::{CameraConfig, CameraDevice, InvalidConfig, ServerConfig};
pub use messages::ServerMessage;
