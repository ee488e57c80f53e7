//! Messages the server sends to browsers besides image data.
//!
//! The happy path of the WebSocket protocol carries no JSON at all: the
//! browser sends any message and gets back one binary frame holding a JPEG.
//! When a capture fails the browser instead receives a text frame:
//!
//! ```json
//! {"type":"error","message":"failed to capture frame: ..."}
//! ```
//!
//! and may simply ask again.

use serde::{Deserialize, Serialize};

/// Text messages sent from the server to a browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The requested frame could not be produced.
    Error { message: String },
}

impl ServerMessage {
    pub fn error(err: &impl std::fmt::Display) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }

    /// Serializes to the JSON text sent over the socket.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            // Only reachable if serde_json rejects a plain string field.
            Err(_) => String::from(r#"{"type":"error","message":"internal error"}"#),
        }
    }
}
