//! CameraLifecycleController: powers the shared camera up and down on demand.
//!
//! One controller exists per process.  It owns the camera (through a
//! [`DeviceWorker`]), tracks which [`CameraState`] the camera is in, and owns
//! the delayed-stop timer that keeps the camera warm for a grace period after
//! the last viewer leaves.
//!
//! # State machine
//!
//! ```text
//! request_start:  Stopped      → Starting → Running   (device start on the worker)
//!                 StopPending  → Running              (timer cancelled, device untouched)
//!                 Starting / Running                  no-op
//! request_stop:   Running      → StopPending          (timer armed)
//!                 Starting                            stop deferred until the start lands
//!                 StopPending / Stopped               no-op
//! timer fires:    StopPending  → Stopped              (device stop on the worker)
//! ```
//!
//! # Locking
//!
//! All transitions happen under one short `std::sync::Mutex`.  Device work
//! is never done under that lock: the lock is held only long enough to move
//! the state and *enqueue* the matching device command.  The worker executes
//! commands in queue order, so the hardware sees operations in exactly the
//! order the state machine decided them.
//!
//! Each armed timer and each in-flight start carries a ticket.  A timer that
//! fires after losing the race against `request_start`, or a start that
//! completes after `shutdown`, finds a different ticket and does nothing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use camstream_core::{CameraState, Frame, FrameSource, SourceError};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::device_worker::{DeviceReply, DeviceWorker};

/// Error type for camera lifecycle operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The device refused to start; the controller is back in `Stopped`.
    #[error("camera failed to start: {0}")]
    StartFailed(String),
    /// The camera left the powered states before the request could be queued.
    #[error("camera is not ready")]
    NotReady,
    /// A device operation failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The camera-device thread is no longer running.
    #[error("camera device thread has exited")]
    WorkerGone,
    #[error("failed to spawn camera device thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("camera controller must be created inside a Tokio runtime: {0}")]
    NoRuntime(String),
}

/// Internal phase.  Carries the data that only makes sense in that phase,
/// so "stopped with a timer armed" cannot be represented.
#[derive(Debug)]
enum Phase {
    Stopped,
    Starting { attempt: u64, stop_when_ready: bool },
    Running,
    StopPending { ticket: u64, timer: AbortHandle },
}

impl Phase {
    fn state(&self) -> CameraState {
        match self {
            Phase::Stopped => CameraState::Stopped,
            Phase::Starting { .. } => CameraState::Starting,
            Phase::Running => CameraState::Running,
            Phase::StopPending { .. } => CameraState::StopPending,
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    phase: Phase,
    next_ticket: u64,
    last_start_error: Option<String>,
}

impl Lifecycle {
    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

#[derive(Debug)]
struct Shared {
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<CameraState>,
    device: DeviceWorker,
    stop_delay: Duration,
    runtime: Handle,
}

/// Cloneable handle to the process-wide camera controller.
///
/// Clones share one state machine and one device; hand a clone to every
/// session instead of reaching for a global.
#[derive(Debug, Clone)]
pub struct CameraController {
    shared: Arc<Shared>,
}

impl CameraController {
    /// Takes ownership of `source` and starts the camera-device thread.
    ///
    /// The camera stays powered down until the first [`request_start`].
    /// Must be called from within a Tokio runtime; the grace timer runs
    /// on that runtime.
    ///
    /// [`request_start`]: CameraController::request_start
    pub fn new<S: FrameSource>(source: S, stop_delay: Duration) -> Result<Self, CameraError> {
        let runtime = Handle::try_current().map_err(|e| CameraError::NoRuntime(e.to_string()))?;
        let device = DeviceWorker::spawn(source).map_err(CameraError::Spawn)?;
        let (state_tx, _) = watch::channel(CameraState::Stopped);
        Ok(Self {
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle {
                    phase: Phase::Stopped,
                    next_ticket: 0,
                    last_start_error: None,
                }),
                state_tx,
                device,
                stop_delay,
                runtime,
            }),
        })
    }

    /// Current camera state.
    pub fn state(&self) -> CameraState {
        self.shared.lock().phase.state()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<CameraState> {
        self.shared.state_tx.subscribe()
    }

    /// Configured grace delay.
    pub fn stop_delay(&self) -> Duration {
        self.shared.stop_delay
    }

    /// Description of the underlying device.
    pub fn description(&self) -> &str {
        self.shared.device.description()
    }

    /// Asks for the camera to be powered.
    ///
    /// Returns immediately; use [`wait_ready`](Self::wait_ready) or
    /// [`ensure_running`](Self::ensure_running) to wait for the outcome.
    /// Cancels a pending stop if one is armed.
    pub fn request_start(&self) {
        let shared = &self.shared;
        let mut lc = shared.lock();
        match &mut lc.phase {
            Phase::Running => {}
            Phase::Starting {
                stop_when_ready, ..
            } => {
                if *stop_when_ready {
                    debug!("start requested while starting; dropping deferred stop");
                    *stop_when_ready = false;
                }
            }
            Phase::StopPending { .. } => {
                if let Phase::StopPending { timer, .. } = shared.transition(&mut lc, Phase::Running) {
                    timer.abort();
                }
                info!("camera continues to be in use; pending stop cancelled");
            }
            Phase::Stopped => {
                let attempt = lc.ticket();
                shared.transition(
                    &mut lc,
                    Phase::Starting {
                        attempt,
                        stop_when_ready: false,
                    },
                );
                // Completion runs in its own task so a caller that gives up
                // waiting cannot strand the controller in `Starting`.
                let reply = shared.device.start();
                let weak = Arc::downgrade(shared);
                shared.runtime.spawn(async move {
                    let result = match reply.await {
                        Ok(result) => result.map_err(CameraError::from),
                        Err(_) => Err(CameraError::WorkerGone),
                    };
                    if let Some(shared) = weak.upgrade() {
                        Shared::finish_start(&shared, attempt, result);
                    }
                });
            }
        }
    }

    /// Asks for the camera to be powered down after the grace delay.
    ///
    /// Idempotent: a second request while a stop is pending does not arm a
    /// second timer.  A request while the camera is still starting takes
    /// effect once the start completes.
    pub fn request_stop(&self) {
        let shared = &self.shared;
        let mut lc = shared.lock();
        match &mut lc.phase {
            Phase::Running => Shared::arm_stop_timer(shared, &mut lc),
            Phase::Starting {
                stop_when_ready, ..
            } => {
                debug!("stop requested while starting; deferring until start completes");
                *stop_when_ready = true;
            }
            Phase::StopPending { .. } => debug!("stop already pending"),
            Phase::Stopped => debug!("stop requested but camera is already stopped"),
        }
    }

    /// Waits until the camera is no longer `Starting`.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::StartFailed`] if the camera ended up stopped.
    pub async fn wait_ready(&self) -> Result<(), CameraError> {
        let mut rx = self.subscribe();
        let state = *rx
            .wait_for(|s| *s != CameraState::Starting)
            .await
            .map_err(|_| CameraError::WorkerGone)?;
        if state.is_powered() {
            Ok(())
        } else {
            let reason = self
                .shared
                .lock()
                .last_start_error
                .clone()
                .unwrap_or_else(|| String::from("camera is stopped"));
            Err(CameraError::StartFailed(reason))
        }
    }

    /// [`request_start`](Self::request_start) followed by
    /// [`wait_ready`](Self::wait_ready).
    pub async fn ensure_running(&self) -> Result<(), CameraError> {
        self.request_start();
        self.wait_ready().await
    }

    /// Captures one JPEG frame.
    ///
    /// If the camera is off this starts it and waits, so the first request
    /// of a fresh session is served rather than dropped.  Concurrent calls
    /// are serialized on the device thread.  A capture while a stop is
    /// pending is served without cancelling the stop.
    ///
    /// # Errors
    ///
    /// [`CameraError::StartFailed`] if an implicit start fails,
    /// [`CameraError::Source`] if the device fails to produce a frame.
    pub async fn capture_frame(&self) -> Result<Frame, CameraError> {
        let reply = match self.enqueue_capture() {
            Some(reply) => reply,
            None => {
                self.ensure_running().await?;
                self.enqueue_capture().ok_or(CameraError::NotReady)?
            }
        };
        let frame = reply.await.map_err(|_| CameraError::WorkerGone)??;
        Ok(frame)
    }

    /// Cancels any pending stop and powers the camera down now.
    ///
    /// Used at process exit.  Safe to call in any state.
    pub async fn shutdown(&self) {
        let reply = {
            let shared = &self.shared;
            let mut lc = shared.lock();
            match shared.transition(&mut lc, Phase::Stopped) {
                Phase::Stopped => None,
                Phase::StopPending { timer, .. } => {
                    timer.abort();
                    Some(shared.device.stop())
                }
                Phase::Starting { .. } | Phase::Running => Some(shared.device.stop()),
            }
        };
        if let Some(reply) = reply {
            Shared::log_stop_outcome(reply.await);
        }
    }

    fn enqueue_capture(&self) -> Option<DeviceReply<Frame>> {
        let lc = self.shared.lock();
        lc.phase
            .state()
            .is_powered()
            .then(|| self.shared.device.capture())
    }
}

impl Shared {
    // Every critical section leaves `Lifecycle` consistent before any call
    // that could panic, so a poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the phase, publishes the new state, and returns the old phase.
    fn transition(&self, lc: &mut Lifecycle, next: Phase) -> Phase {
        let previous = std::mem::replace(&mut lc.phase, next);
        let (from, to) = (previous.state(), lc.phase.state());
        if from != to {
            info!(%from, %to, "camera state changed");
            self.state_tx.send_replace(to);
        }
        previous
    }

    fn arm_stop_timer(shared: &Arc<Shared>, lc: &mut Lifecycle) {
        let ticket = lc.ticket();
        let delay = shared.stop_delay;
        let weak: Weak<Shared> = Arc::downgrade(shared);
        let timer = shared.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                Shared::fire_stop_timer(&shared, ticket).await;
            }
        });
        shared.transition(
            lc,
            Phase::StopPending {
                ticket,
                timer: timer.abort_handle(),
            },
        );
        info!("camera stop scheduled in {:?}", delay);
    }

    async fn fire_stop_timer(shared: &Arc<Shared>, ticket: u64) {
        let reply = {
            let mut lc = shared.lock();
            match lc.phase {
                Phase::StopPending { ticket: armed, .. } if armed == ticket => {}
                _ => {
                    debug!("stale stop timer {ticket} ignored");
                    return;
                }
            }
            shared.transition(&mut lc, Phase::Stopped);
            shared.device.stop()
        };
        Shared::log_stop_outcome(reply.await);
    }

    fn finish_start(shared: &Arc<Shared>, attempt: u64, result: Result<(), CameraError>) {
        let mut lc = shared.lock();
        let stop_when_ready = match lc.phase {
            Phase::Starting {
                attempt: current,
                stop_when_ready,
            } if current == attempt => stop_when_ready,
            _ => {
                debug!("start attempt {attempt} completed after the lifecycle moved on");
                return;
            }
        };

        match result {
            Ok(()) => {
                lc.last_start_error = None;
                if stop_when_ready {
                    Shared::arm_stop_timer(shared, &mut lc);
                } else {
                    shared.transition(&mut lc, Phase::Running);
                }
            }
            Err(e) => {
                warn!("camera start failed: {e}");
                lc.last_start_error = Some(e.to_string());
                shared.transition(&mut lc, Phase::Stopped);
            }
        }
    }

    fn log_stop_outcome(
        outcome: Result<Result<(), SourceError>, tokio::sync::oneshot::error::RecvError>,
    ) {
        match outcome {
            Ok(Ok(())) => debug!("camera powered down"),
            // The device is treated as off either way; there is no retry.
            Ok(Err(e)) => warn!("camera stop reported an error: {e}"),
            Err(_) => warn!("camera device thread exited before stopping the camera"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use camstream_core::source::mock::{MockFrameSource, MockProbe};
    use tokio::time::{sleep, timeout, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    fn controller(stop_delay: Duration) -> (CameraController, MockProbe) {
        let (source, probe) = MockFrameSource::new();
        let camera = CameraController::new(source, stop_delay).expect("controller");
        (camera, probe)
    }

    async fn wait_for_state(camera: &CameraController, wanted: CameraState) {
        let mut rx = camera.subscribe();
        timeout(WAIT, rx.wait_for(|s| *s == wanted))
            .await
            .unwrap_or_else(|_| panic!("camera never reached {wanted}"))
            .expect("state channel closed");
    }

    #[tokio::test]
    async fn test_new_controller_is_stopped() {
        let (camera, probe) = controller(Duration::from_secs(7));
        assert_eq!(camera.state(), CameraState::Stopped);
        assert_eq!(camera.stop_delay(), Duration::from_secs(7));
        assert_eq!(camera.description(), "mock camera");
        assert_eq!(probe.starts(), 0);
    }

    #[test]
    fn test_new_outside_runtime_is_an_error() {
        let (source, _probe) = MockFrameSource::new();
        let result = CameraController::new(source, Duration::from_secs(1));
        assert!(matches!(result, Err(CameraError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_repeated_request_start_starts_device_once() {
        // Arrange
        let (camera, probe) = controller(Duration::from_secs(7));

        // Act
        for _ in 0..5 {
            camera.request_start();
        }
        camera.wait_ready().await.expect("start succeeds");
        camera.request_start();

        // Assert
        assert_eq!(camera.state(), CameraState::Running);
        assert_eq!(probe.starts(), 1);
    }

    #[tokio::test]
    async fn test_first_request_start_moves_to_starting() {
        let (camera, probe) = controller(Duration::from_secs(7));
        probe.set_start_delay(Duration::from_millis(50));

        camera.request_start();

        assert_eq!(camera.state(), CameraState::Starting);
        camera.wait_ready().await.unwrap();
        assert_eq!(camera.state(), CameraState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_start_during_grace_cancels_stop() {
        // Arrange
        let (camera, probe) = controller(Duration::from_secs(7));
        camera.ensure_running().await.unwrap();

        // Act
        camera.request_stop();
        assert_eq!(camera.state(), CameraState::StopPending);
        sleep(Duration::from_secs(3)).await;
        camera.request_start();
        sleep(Duration::from_secs(30)).await;

        // Assert
        assert_eq!(camera.state(), CameraState::Running);
        assert_eq!(probe.stops(), 0);
        assert_eq!(probe.starts(), 1, "camera was never powered down");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_fires_after_grace_delay() {
        // Arrange
        let delay = Duration::from_secs(7);
        let (camera, probe) = controller(delay);
        camera.ensure_running().await.unwrap();

        // Act
        let requested_at = Instant::now();
        camera.request_stop();
        sleep(delay - Duration::from_millis(1)).await;

        // Assert: still warm just before the deadline.
        assert_eq!(camera.state(), CameraState::StopPending);
        assert_eq!(probe.stops(), 0);

        wait_for_state(&camera, CameraState::Stopped).await;
        assert!(requested_at.elapsed() >= delay);
        assert!(probe.wait_until(WAIT, |c| c.stops == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_request_stop_arms_one_timer() {
        // Arrange
        let (camera, probe) = controller(Duration::from_secs(7));
        camera.ensure_running().await.unwrap();

        // Act
        camera.request_stop();
        sleep(Duration::from_secs(5)).await;
        camera.request_stop();
        camera.request_stop();

        // Assert: the first timer still decides, and only once.
        sleep(Duration::from_secs(3)).await;
        assert_eq!(camera.state(), CameraState::Stopped);
        assert!(probe.wait_until(WAIT, |c| c.stops == 1));
        sleep(Duration::from_secs(30)).await;
        assert_eq!(probe.stops(), 1);
    }

    #[tokio::test]
    async fn test_request_stop_when_stopped_is_noop() {
        let (camera, probe) = controller(Duration::ZERO);
        camera.request_stop();
        sleep(Duration::from_millis(20)).await;
        assert_eq!(camera.state(), CameraState::Stopped);
        assert_eq!(probe.stops(), 0);
    }

    #[tokio::test]
    async fn test_restart_after_full_stop_powers_device_again() {
        // Arrange
        let (camera, probe) = controller(Duration::ZERO);
        camera.ensure_running().await.unwrap();
        camera.request_stop();
        wait_for_state(&camera, CameraState::Stopped).await;

        // Act
        camera.ensure_running().await.unwrap();

        // Assert
        assert_eq!(camera.state(), CameraState::Running);
        assert!(probe.wait_until(WAIT, |c| c.starts == 2 && c.stops == 1 && c.powered));
    }

    #[tokio::test]
    async fn test_start_failure_reverts_to_stopped() {
        // Arrange
        let (camera, probe) = controller(Duration::from_secs(7));
        probe.set_fail_start(true);

        // Act
        let result = camera.ensure_running().await;

        // Assert
        assert!(matches!(result, Err(CameraError::StartFailed(ref msg)) if msg.contains("refused")));
        assert_eq!(camera.state(), CameraState::Stopped);
    }

    #[tokio::test]
    async fn test_capture_after_failed_start_surfaces_error_without_hanging() {
        let (camera, probe) = controller(Duration::from_secs(7));
        probe.set_fail_start(true);

        let result = timeout(WAIT, camera.capture_frame()).await.expect("no hang");

        assert!(matches!(result, Err(CameraError::StartFailed(_))));
    }

    #[tokio::test]
    async fn test_capture_on_stopped_camera_starts_it() {
        // Arrange
        let (camera, probe) = controller(Duration::from_secs(7));

        // Act
        let frame = camera.capture_frame().await.expect("implicit start");

        // Assert
        assert_eq!(frame.as_bytes(), MockFrameSource::frame_bytes(1).as_slice());
        assert_eq!(camera.state(), CameraState::Running);
        assert_eq!(probe.starts(), 1);
    }

    #[tokio::test]
    async fn test_capture_while_starting_waits_for_running() {
        let (camera, probe) = controller(Duration::from_secs(7));
        probe.set_start_delay(Duration::from_millis(50));
        camera.request_start();

        let frame = camera.capture_frame().await;

        assert!(frame.is_ok());
        assert_eq!(probe.starts(), 1);
    }

    #[tokio::test]
    async fn test_capture_failure_keeps_camera_running() {
        // Arrange
        let (camera, probe) = controller(Duration::from_secs(7));
        camera.ensure_running().await.unwrap();
        probe.set_fail_capture(true);

        // Act
        let result = camera.capture_frame().await;

        // Assert
        assert!(matches!(
            result,
            Err(CameraError::Source(SourceError::Capture(_)))
        ));
        assert_eq!(camera.state(), CameraState::Running);

        probe.set_fail_capture(false);
        assert!(camera.capture_frame().await.is_ok());
    }

    #[tokio::test]
    async fn test_capture_during_grace_does_not_cancel_stop() {
        // Arrange
        let (camera, probe) = controller(Duration::from_millis(300));
        camera.ensure_running().await.unwrap();
        camera.request_stop();

        // Act
        let frame = camera.capture_frame().await;

        // Assert
        assert!(frame.is_ok());
        assert_eq!(camera.state(), CameraState::StopPending);
        wait_for_state(&camera, CameraState::Stopped).await;
        assert!(probe.wait_until(WAIT, |c| c.stops == 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_captures_never_overlap() {
        // Arrange
        const M: usize = 16;
        let (camera, probe) = controller(Duration::from_secs(7));
        probe.set_capture_delay(Duration::from_millis(3));
        camera.ensure_running().await.unwrap();

        // Act
        let tasks: Vec<_> = (0..M)
            .map(|_| {
                let camera = camera.clone();
                tokio::spawn(async move { camera.capture_frame().await })
            })
            .collect();
        for task in tasks {
            task.await.expect("task").expect("capture");
        }

        // Assert
        assert_eq!(probe.captures(), M);
        assert_eq!(probe.max_captures_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_stop_requested_while_starting_is_deferred() {
        // Arrange
        let (camera, probe) = controller(Duration::from_millis(20));
        probe.set_start_delay(Duration::from_millis(50));

        // Act
        camera.request_start();
        camera.request_stop();
        assert_eq!(camera.state(), CameraState::Starting);

        // Assert: start lands, then the deferred stop runs its course.
        wait_for_state(&camera, CameraState::Stopped).await;
        assert!(probe.wait_until(WAIT, |c| c.starts == 1 && c.stops == 1 && !c.powered));
    }

    #[tokio::test]
    async fn test_start_while_starting_drops_deferred_stop() {
        // Arrange
        let (camera, probe) = controller(Duration::from_millis(20));
        probe.set_start_delay(Duration::from_millis(50));

        // Act
        camera.request_start();
        camera.request_stop();
        camera.request_start();
        camera.wait_ready().await.unwrap();
        sleep(Duration::from_millis(100)).await;

        // Assert
        assert_eq!(camera.state(), CameraState::Running);
        assert_eq!(probe.stops(), 0);
    }

    #[tokio::test]
    async fn test_stop_failure_still_ends_stopped() {
        let (camera, probe) = controller(Duration::ZERO);
        probe.set_fail_stop(true);
        camera.ensure_running().await.unwrap();

        camera.request_stop();

        wait_for_state(&camera, CameraState::Stopped).await;
        assert!(probe.wait_until(WAIT, |c| c.stops == 1));
    }

    #[tokio::test]
    async fn test_shutdown_powers_down_running_camera() {
        let (camera, probe) = controller(Duration::from_secs(7));
        camera.ensure_running().await.unwrap();

        camera.shutdown().await;

        assert_eq!(camera.state(), CameraState::Stopped);
        assert_eq!(probe.stops(), 1);
        assert!(!probe.is_powered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_stop() {
        // Arrange
        let (camera, probe) = controller(Duration::from_secs(7));
        camera.ensure_running().await.unwrap();
        camera.request_stop();

        // Act
        camera.shutdown().await;
        sleep(Duration::from_secs(30)).await;

        // Assert: exactly one stop, from shutdown, none from the timer.
        assert_eq!(camera.state(), CameraState::Stopped);
        assert!(probe.wait_until(WAIT, |c| c.stops == 1));
        assert_eq!(probe.stops(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_when_stopped_touches_nothing() {
        let (camera, probe) = controller(Duration::from_secs(7));
        camera.shutdown().await;
        assert_eq!(probe.stops(), 0);
    }
}
