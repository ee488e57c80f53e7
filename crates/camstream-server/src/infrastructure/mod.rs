//! Infrastructure layer: everything that touches hardware, files or the
//! network.
//!
//! - [`camera`]: concrete [`FrameSource`](camstream_core::FrameSource)s
//!   and JPEG encoding.
//! - [`config_file`]: the optional TOML configuration file.
//! - [`ws_server`]: the axum router, the `/websocket` session loop and
//!   static file serving.

pub mod camera;
pub mod config_file;
pub mod ws_server;

pub use camera::open_camera;
pub use config_file::{load_config, ConfigError, FileConfig};
pub use ws_server::{router, run_server, serve, AppState};
