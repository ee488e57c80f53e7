//! Camera lifecycle state.
//!
//! ```text
//!            request_start              start ok
//! Stopped ──────────────────► Starting ──────────► Running
//!    ▲                           │                  │  ▲
//!    │        start failed       │     request_stop │  │ request_start
//!    └───────────────────────────┘                  ▼  │ (timer cancelled)
//!    ▲                                           StopPending
//!    └──────────────────── grace timer fires ───────┘
//! ```

use std::fmt;

/// Observable state of the shared camera.
///
/// Exactly one of these holds at any time; the controller never represents
/// "stopped but a stop is pending" or similar mixed conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraState {
    /// Device powered down.
    #[default]
    Stopped,
    /// A device start is in flight.
    Starting,
    /// Device powered and serving frames.
    Running,
    /// Last viewer left; the device is still powered and a delayed stop is armed.
    StopPending,
}

impl CameraState {
    /// Returns `true` when the device is powered and can produce a frame.
    pub fn is_powered(self) -> bool {
        matches!(self, CameraState::Running | CameraState::StopPending)
    }

    /// Short lowercase label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            CameraState::Stopped => "stopped",
            CameraState::Starting => "starting",
            CameraState::Running => "running",
            CameraState::StopPending => "stop-pending",
        }
    }
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_stopped() {
        assert_eq!(CameraState::default(), CameraState::Stopped);
    }

    #[test]
    fn test_only_running_and_stop_pending_are_powered() {
        assert!(!CameraState::Stopped.is_powered());
        assert!(!CameraState::Starting.is_powered());
        assert!(CameraState::Running.is_powered());
        assert!(CameraState::StopPending.is_powered());
    }

    #[test]
    fn test_display_uses_log_label() {
        assert_eq!(CameraState::StopPending.to_string(), "stop-pending");
        assert_eq!(CameraState::Running.to_string(), "running");
    }
}
