//! DeviceWorker: the one thread allowed to touch the camera.
//!
//! Camera drivers block, sometimes for hundreds of milliseconds while a
//! sensor warms up, so device calls never run on the async runtime.  A
//! dedicated OS thread owns the [`FrameSource`] and executes commands from
//! an unbounded queue strictly in arrival order:
//!
//! ```text
//! controller ──Start/Stop/Capture──► [ queue ] ──► camera-device thread ──► FrameSource
//!      ▲                                                   │
//!      └──────────────── oneshot reply ────────────────────┘
//! ```
//!
//! Because there is exactly one consumer, captures from many viewers are
//! serialized without any extra lock, and a stop enqueued before a start is
//! guaranteed to reach the hardware first.

use std::thread;
use std::time::Instant;

use camstream_core::{Frame, FrameSource, SourceError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Reply<T> = oneshot::Sender<Result<T, SourceError>>;

/// A pending reply from the device thread.
///
/// Resolves to `Err(RecvError)` if the thread is gone.
pub type DeviceReply<T> = oneshot::Receiver<Result<T, SourceError>>;

enum DeviceCommand {
    Start(Reply<()>),
    Stop(Reply<()>),
    Capture(Reply<Frame>),
}

/// Handle to the camera-device thread.
///
/// Dropping the last handle closes the queue; the thread finishes any
/// commands already queued and exits.
#[derive(Debug)]
pub struct DeviceWorker {
    commands: mpsc::UnboundedSender<DeviceCommand>,
    description: String,
}

impl DeviceWorker {
    /// Moves `source` onto a new `camera-device` thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<S: FrameSource>(source: S) -> std::io::Result<Self> {
        let description = source.describe();
        let (tx, rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("camera-device".into())
            .spawn(move || run_device_loop(source, rx))?;
        Ok(Self {
            commands: tx,
            description,
        })
    }

    /// Device description captured at spawn time.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Enqueues a start.  Never blocks.
    pub fn start(&self) -> DeviceReply<()> {
        self.enqueue(DeviceCommand::Start)
    }

    /// Enqueues a stop.  Never blocks.
    pub fn stop(&self) -> DeviceReply<()> {
        self.enqueue(DeviceCommand::Stop)
    }

    /// Enqueues a single-frame capture.  Never blocks.
    pub fn capture(&self) -> DeviceReply<Frame> {
        self.enqueue(DeviceCommand::Capture)
    }

    fn enqueue<T>(&self, command: impl FnOnce(Reply<T>) -> DeviceCommand) -> DeviceReply<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        // If the thread is gone the command (and its reply sender) is
        // dropped here, which the caller observes as a closed reply.
        if self.commands.send(command(reply_tx)).is_err() {
            warn!("camera device thread has exited; command dropped");
        }
        reply_rx
    }
}

fn run_device_loop<S: FrameSource>(mut source: S, mut commands: mpsc::UnboundedReceiver<DeviceCommand>) {
    debug!("camera device thread started for {}", source.describe());

    while let Some(command) = commands.blocking_recv() {
        match command {
            DeviceCommand::Start(reply) => {
                info!("starting camera...");
                let started_at = Instant::now();
                let result = source.start();
                match &result {
                    Ok(()) => info!("camera started in {:?}", started_at.elapsed()),
                    Err(e) => warn!("camera start failed: {e}"),
                }
                let _ = reply.send(result);
            }
            DeviceCommand::Stop(reply) => {
                info!("stopping camera...");
                let result = source.stop();
                match &result {
                    Ok(()) => info!("camera stopped"),
                    Err(e) => warn!("camera stop failed: {e}"),
                }
                let _ = reply.send(result);
            }
            DeviceCommand::Capture(reply) => {
                let captured_at = Instant::now();
                let result = source.capture();
                match &result {
                    Ok(frame) => debug!(
                        "captured {} byte frame in {:?}",
                        frame.len(),
                        captured_at.elapsed()
                    ),
                    Err(e) => warn!("capture failed: {e}"),
                }
                // The requester may have disconnected meanwhile; that is fine.
                let _ = reply.send(result);
            }
        }
    }

    debug!("camera device thread exiting");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
