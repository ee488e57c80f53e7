//! camstream-server library crate.
//!
//! Streams still JPEG frames from one shared camera to any number of
//! WebSocket viewers.  Each viewer pulls: it sends a message, gets one
//! frame back, and repeats.  The camera is powered only while at least
//! one viewer is connected, plus a short grace period after the last one
//! leaves.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (pull loop over WebSocket)
//!         ↕
//! [camstream-server]
//!   ├── domain/           ServerConfig, CameraConfig, JSON error message
//!   ├── application/
//!   │     ├── session/           open / request / close per viewer
//!   │     ├── camera_controller/ Stopped → Starting → Running → StopPending
//!   │     └── device_worker/     the one thread that touches the camera
//!   └── infrastructure/
//!         ├── camera/     synthetic + V4L2 sources, JPEG encoding
//!         ├── config_file/ optional TOML configuration
//!         └── ws_server/  axum router, /websocket, static files
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain` and `camstream-core`; it never
//!   names a concrete camera or a socket type.
//! - `infrastructure` depends on everything else plus axum, tower-http,
//!   image and (optionally) v4l.

/// Domain layer: configuration and client-facing messages.
pub mod domain;

/// Application layer: camera lifecycle and viewer sessions.
pub mod application;

/// Infrastructure layer: camera drivers, config file, HTTP server.
pub mod infrastructure;
