//! HTTP server: the `/websocket` streaming endpoint and static files.
//!
//! Each upgraded connection runs [`handle_socket`] in its own Tokio task
//! (axum spawns one per connection).  The task owns exactly one
//! [`StreamingSession`]; inbound messages are handled strictly one after
//! another, so a client's Nth request is answered before its N+1th is
//! read.  When the loop ends, for whatever reason, the session is closed.
//!
//! Every other path falls through to a [`ServeDir`] rooted at the
//! configured static directory.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use camstream_core::ClientRegistry;

use crate::application::{CameraController, StreamingSession};
use crate::domain::config::ServerConfig;
use crate::domain::messages::ServerMessage;

/// Path of the streaming endpoint.
pub const WEBSOCKET_PATH: &str = "/websocket";

/// Handles shared by every connection.
#[derive(Clone)]
pub struct AppState {
    pub camera: CameraController,
    pub registry: Arc<ClientRegistry>,
}

impl AppState {
    pub fn new(camera: CameraController) -> Self {
        Self {
            camera,
            registry: Arc::new(ClientRegistry::new()),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    let static_files = ServeDir::new(static_dir).append_index_html_on_directories(true);

    Router::new()
        .route(WEBSOCKET_PATH, get(websocket_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `app` on an already bound listener until `shutdown` resolves.
///
/// In-flight WebSocket sessions are not waited for: they end when their
/// connection drops, and closing them is what releases the camera.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Binds `config.bind_addr` and serves until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (port in use, no
/// permission) or the server fails while accepting.
pub async fn run_server<F>(config: &ServerConfig, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", config.bind_addr))?;
    let local_addr = listener.local_addr().unwrap_or(config.bind_addr);

    info!(
        "serving http://{local_addr} (stream at {WEBSOCKET_PATH}, static files from {})",
        config.static_dir.display()
    );

    let app = router(state, &config.static_dir);
    serve(listener, app, shutdown)
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

// ── Per-connection handling ───────────────────────────────────────────────────

async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Runs one streaming session to completion.
///
/// Any text or binary message is a request for one frame; its payload is
/// ignored.  A capture failure is answered with a JSON error message and
/// the connection stays open.  A transport error is treated as a close.
async fn handle_socket(mut socket: WebSocket, peer: SocketAddr, state: AppState) {
    let session = StreamingSession::open(peer, Arc::clone(&state.registry), state.camera.clone());

    while let Some(received) = socket.recv().await {
        let message = match received {
            Ok(message) => message,
            Err(e) => {
                debug!("client {} transport error: {e}", session.id());
                break;
            }
        };

        match message {
            Message::Text(_) | Message::Binary(_) => {}
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
        }

        let reply = match session.on_message().await {
            Ok(frame) => Message::Binary(frame.into_bytes()),
            Err(e) => Message::Text(ServerMessage::error(&e).to_json()),
        };

        if let Err(e) = socket.send(reply).await {
            debug!("client {} send failed: {e}", session.id());
            break;
        }
    }

    session.close();
}
