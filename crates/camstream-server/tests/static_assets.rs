//! Static file serving through the same router as `/websocket`.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use camstream_core::source::mock::MockFrameSource;
use camstream_server::application::CameraController;
use camstream_server::infrastructure::{router, serve, AppState};

const INDEX_MARKER: &str = "<title>camstream test page</title>";

async fn start_server(static_dir: &std::path::Path) -> SocketAddr {
    let (source, _probe) = MockFrameSource::new();
    let camera = CameraController::new(source, std::time::Duration::from_secs(1)).unwrap();
    let app = router(AppState::new(camera), static_dir);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, app, std::future::pending()));
    addr
}

/// Sends a bare HTTP/1.1 GET and returns the whole response as text.
async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or_default()
}

fn static_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("index.html"),
        format!("<html><head>{INDEX_MARKER}</head></html>"),
    )
    .unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log('hi');").unwrap();
    dir
}

#[tokio::test]
async fn test_root_serves_index_html() {
    // Arrange
    let dir = static_dir();
    let addr = start_server(dir.path()).await;

    // Act
    let response = get(addr, "/").await;

    // Assert
    assert!(status_line(&response).contains("200"), "{response}");
    assert!(response.contains(INDEX_MARKER));
}

#[tokio::test]
async fn test_named_file_is_served() {
    let dir = static_dir();
    let addr = start_server(dir.path()).await;

    let response = get(addr, "/app.js").await;

    assert!(status_line(&response).contains("200"), "{response}");
    assert!(response.contains("console.log"));
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let dir = static_dir();
    let addr = start_server(dir.path()).await;

    let response = get(addr, "/missing.png").await;

    assert!(status_line(&response).contains("404"), "{response}");
}

#[tokio::test]
async fn test_plain_get_on_websocket_path_is_rejected() {
    // Arrange
    let dir = static_dir();
    let addr = start_server(dir.path()).await;

    // Act: no Upgrade headers
    let response = get(addr, "/websocket").await;

    // Assert: a client error, never the static index
    let status = status_line(&response);
    assert!(status.starts_with("HTTP/1.1 4"), "{status}");
    assert!(!response.contains(INDEX_MARKER));
}

#[tokio::test]
async fn test_bundled_index_page_drives_the_websocket() {
    let page = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/static/index.html"))
        .unwrap();
    assert!(page.contains("/websocket"));
    assert!(page.contains("binaryType"));
}
