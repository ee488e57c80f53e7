//! Domain layer: plain value types with no I/O.

pub mod camera;
pub mod frame;
