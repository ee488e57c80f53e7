//! # camstream-core
//!
//! Shared library for camstream containing the camera domain types, the
//! [`FrameSource`] abstraction over the physical camera, and the
//! [`ClientRegistry`] that tracks connected viewers.
//!
//! It has zero dependencies on async runtimes, sockets, or device drivers,
//! so every type here can be exercised from plain `#[test]` functions.
//!
//! # Architecture overview
//!
//! camstream serves JPEG stills from one shared camera to any number of
//! WebSocket viewers.  The camera is powered up when the first viewer
//! arrives and powered down a grace period after the last one leaves.
//!
//! - **`domain`** – Value types: [`CameraState`], [`Frame`], [`ClientId`].
//! - **`source`** – The [`FrameSource`] trait the server drives (start,
//!   stop, capture one JPEG) plus an instrumented mock for tests.
//! - **`registry`** – The reference-counted viewer set whose 0→1 and 1→0
//!   transitions decide when the camera starts and stops.

pub mod domain;
pub mod registry;
pub mod source;

pub use domain::camera::CameraState;
pub use domain::frame::{ClientId, Frame};
pub use registry::ClientRegistry;
pub use source::{FrameSource, SourceError};
