//! camstream: on-demand JPEG still streaming over WebSocket.
//!
//! Serves a static web page and a `/websocket` endpoint.  Every message a
//! viewer sends on the socket is answered with one JPEG frame from the
//! camera.  The camera is switched on when the first viewer connects and
//! switched off a few seconds after the last one leaves.
//!
//! # Usage
//!
//! ```text
//! camstream [OPTIONS]
//!
//! Options:
//!   --port <PORT>            Listen port [default: 8888]
//!   --bind <IP>              Listen address [default: 0.0.0.0]
//!   --static-dir <DIR>       Directory served at / [default: static]
//!   --stop-delay <SECS>      Grace delay before powering down [default: 7]
//!   --camera <DEVICE>        Index, device node, or stub:// [default: 0]
//!   --width <PX>             Capture width [default: 1920]
//!   --height <PX>            Capture height [default: 1080]
//!   --quality <1-100>        JPEG quality [default: 75]
//!   --flip-horizontal[=BOOL] Mirror left-to-right
//!   --flip-vertical[=BOOL]   Mirror top-to-bottom
//!   --config <FILE>          TOML configuration file
//! ```
//!
//! # Precedence
//!
//! Command-line flags win over `CAMSTREAM_*` environment variables, which
//! win over the `--config` file, which wins over the built-in defaults.
//!
//! | Variable                     | Flag                |
//! |------------------------------|---------------------|
//! | `CAMSTREAM_PORT`             | `--port`            |
//! | `CAMSTREAM_BIND`             | `--bind`            |
//! | `CAMSTREAM_STATIC_DIR`       | `--static-dir`      |
//! | `CAMSTREAM_STOP_DELAY`       | `--stop-delay`      |
//! | `CAMSTREAM_CAMERA`           | `--camera`          |
//! | `CAMSTREAM_WIDTH`            | `--width`           |
//! | `CAMSTREAM_HEIGHT`           | `--height`          |
//! | `CAMSTREAM_QUALITY`          | `--quality`         |
//! | `CAMSTREAM_FLIP_HORIZONTAL`  | `--flip-horizontal` |
//! | `CAMSTREAM_FLIP_VERTICAL`    | `--flip-vertical`   |
//! | `CAMSTREAM_CONFIG`           | `--config`          |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use camstream_server::application::CameraController;
use camstream_server::domain::{CameraDevice, ServerConfig};
use camstream_server::infrastructure::{load_config, open_camera, run_server, AppState};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// On-demand JPEG still streaming from a camera to WebSocket viewers.
///
/// Every option is optional; anything left unset falls back to the config
/// file (if given) and then to the built-in default.
#[derive(Debug, Parser)]
#[command(
    name = "camstream",
    about = "On-demand JPEG still streaming from a camera to WebSocket viewers",
    version
)]
struct Cli {
    /// TCP port to listen on.
    #[arg(long, env = "CAMSTREAM_PORT")]
    port: Option<u16>,

    /// IP address to bind to.
    ///
    /// `0.0.0.0` accepts viewers on every interface, `127.0.0.1` only
    /// local ones.
    #[arg(long, env = "CAMSTREAM_BIND")]
    bind: Option<IpAddr>,

    /// Directory served for every path other than `/websocket`.
    #[arg(long, env = "CAMSTREAM_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Seconds to keep the camera powered after the last viewer leaves.
    #[arg(long, env = "CAMSTREAM_STOP_DELAY")]
    stop_delay: Option<u64>,

    /// Camera to open: an index (`0` for `/dev/video0`), a device node, or
    /// `stub://` for the built-in test pattern.
    #[arg(long, env = "CAMSTREAM_CAMERA")]
    camera: Option<CameraDevice>,

    /// Capture width in pixels.
    #[arg(long, env = "CAMSTREAM_WIDTH")]
    width: Option<u32>,

    /// Capture height in pixels.
    #[arg(long, env = "CAMSTREAM_HEIGHT")]
    height: Option<u32>,

    /// JPEG quality, 1 (smallest) to 100 (best).
    #[arg(long, env = "CAMSTREAM_QUALITY", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Mirror the image left-to-right.
    #[arg(long, env = "CAMSTREAM_FLIP_HORIZONTAL", num_args = 0..=1, default_missing_value = "true")]
    flip_horizontal: Option<bool>,

    /// Mirror the image top-to-bottom.
    #[arg(long, env = "CAMSTREAM_FLIP_VERTICAL", num_args = 0..=1, default_missing_value = "true")]
    flip_vertical: Option<bool>,

    /// TOML configuration file.
    #[arg(long, env = "CAMSTREAM_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Layers the config file, then these flags, over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the final configuration fails validation.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = ServerConfig::default();

        if let Some(path) = &self.config {
            let file = load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?;
            file.apply_to(&mut config)
                .with_context(|| format!("invalid value in config file {}", path.display()))?;
        }

        if let Some(ip) = self.bind {
            config.bind_addr = SocketAddr::new(ip, config.bind_addr.port());
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = dir;
        }
        if let Some(secs) = self.stop_delay {
            config.stop_delay = Duration::from_secs(secs);
        }
        if let Some(device) = self.camera {
            config.camera.device = device;
        }
        if let Some(width) = self.width {
            config.camera.width = width;
        }
        if let Some(height) = self.height {
            config.camera.height = height;
        }
        if let Some(quality) = self.quality {
            config.camera.jpeg_quality = quality;
        }
        if let Some(flip) = self.flip_horizontal {
            config.camera.flip_horizontal = flip;
        }
        if let Some(flip) = self.flip_vertical {
            config.camera.flip_vertical = flip;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Logging is initialised from `RUST_LOG` (default `info`).
/// 2. The configuration is assembled and validated.
/// 3. The camera is opened; failure here ends the process.
/// 4. The server runs until Ctrl+C.
/// 5. The camera is powered down before exit.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;

    info!(
        "camstream starting: listen={}, camera={}, {}x{} q{}, stop delay {:?}",
        config.bind_addr,
        config.camera.device,
        config.camera.width,
        config.camera.height,
        config.camera.jpeg_quality,
        config.stop_delay
    );
    if !config.static_dir.is_dir() {
        warn!(
            "static directory {} does not exist; only /websocket will be served",
            config.static_dir.display()
        );
    }

    let source = open_camera(&config.camera).context("failed to initialize camera")?;
    let camera = CameraController::new(source, config.stop_delay)
        .context("failed to start camera controller")?;

    let result = run_server(&config, AppState::new(camera.clone()), shutdown_signal()).await;

    camera.shutdown().await;
    result?;

    info!("camstream stopped");
    Ok(())
}

/// Resolves on Ctrl+C.  If the handler cannot be installed the server
/// runs until killed.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C; shutting down"),
        Err(e) => {
            error!("failed to listen for Ctrl+C signal: {e}");
            std::future::pending::<()>().await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
