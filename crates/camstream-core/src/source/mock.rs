//! Mock frame source for testing.
//!
//! [`MockFrameSource`] behaves like a well-mannered camera: it must be
//! started before it captures, it produces small JPEG-shaped payloads, and
//! it can be told to fail or to be slow.  Everything it does is recorded in
//! a shared [`MockProbe`] that the test keeps after handing the source over
//! to the server.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::{FrameSource, SourceError};
use crate::domain::frame::Frame;

/// Snapshot of everything the mock has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockCounts {
    pub starts: usize,
    pub stops: usize,
    pub captures: usize,
    /// Captures currently inside [`FrameSource::capture`].
    pub captures_in_flight: usize,
    /// Highest value `captures_in_flight` ever reached.
    pub max_captures_in_flight: usize,
    pub powered: bool,
}

#[derive(Debug, Default)]
struct Behaviour {
    fail_start: bool,
    fail_stop: bool,
    fail_capture: bool,
    start_delay: Duration,
    capture_delay: Duration,
}

#[derive(Debug, Default)]
struct ProbeInner {
    counts: Mutex<MockCounts>,
    changed: Condvar,
    behaviour: Mutex<Behaviour>,
}

/// Shared handle onto a [`MockFrameSource`]'s counters and failure switches.
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    inner: Arc<ProbeInner>,
}

impl MockProbe {
    pub fn counts(&self) -> MockCounts {
        self.inner.counts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn starts(&self) -> usize {
        self.counts().starts
    }

    pub fn stops(&self) -> usize {
        self.counts().stops
    }

    pub fn captures(&self) -> usize {
        self.counts().captures
    }

    pub fn max_captures_in_flight(&self) -> usize {
        self.counts().max_captures_in_flight
    }

    pub fn is_powered(&self) -> bool {
        self.counts().powered
    }

    /// Makes every subsequent `start()` fail until switched back.
    pub fn set_fail_start(&self, fail: bool) {
        self.inner.behaviour.lock().unwrap_or_else(PoisonError::into_inner).fail_start = fail;
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.inner.behaviour.lock().unwrap_or_else(PoisonError::into_inner).fail_stop = fail;
    }

    /// Makes every subsequent `capture()` fail until switched back.
    pub fn set_fail_capture(&self, fail: bool) {
        self.inner.behaviour.lock().unwrap_or_else(PoisonError::into_inner).fail_capture = fail;
    }

    /// Simulates a slow sensor warm-up.
    pub fn set_start_delay(&self, delay: Duration) {
        self.inner.behaviour.lock().unwrap_or_else(PoisonError::into_inner).start_delay = delay;
    }

    /// Simulates device read-out time per frame.
    pub fn set_capture_delay(&self, delay: Duration) {
        self.inner.behaviour.lock().unwrap_or_else(PoisonError::into_inner).capture_delay = delay;
    }

    /// Blocks the calling thread until `pred` holds or `timeout` elapses.
    ///
    /// Returns whether the predicate was satisfied.  Device calls happen on
    /// another thread, so tests use this to wait for them to land.
    pub fn wait_until(&self, timeout: Duration, pred: impl Fn(&MockCounts) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut counts = self.inner.counts.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if pred(&counts) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            counts = self
                .inner
                .changed
                .wait_timeout(counts, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn update(&self, f: impl FnOnce(&mut MockCounts)) {
        let mut counts = self.inner.counts.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut counts);
        self.inner.changed.notify_all();
    }

    fn behaviour<T>(&self, f: impl FnOnce(&Behaviour) -> T) -> T {
        f(&self.inner.behaviour.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A mock implementation of [`FrameSource`] backed by a [`MockProbe`].
#[derive(Debug, Default)]
pub struct MockFrameSource {
    probe: MockProbe,
}

impl MockFrameSource {
    /// Creates a mock source and the probe that observes it.
    pub fn new() -> (Self, MockProbe) {
        let probe = MockProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }

    /// Payload returned for the `n`th capture (1-based).
    ///
    /// Shaped like a JPEG (SOI … EOI) with the sequence number in between so
    /// tests can tell frames apart.
    pub fn frame_bytes(n: usize) -> Vec<u8> {
        let mut bytes = Frame::JPEG_SOI.to_vec();
        bytes.extend_from_slice(&(n as u64).to_be_bytes());
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }
}

impl FrameSource for MockFrameSource {
    fn start(&mut self) -> Result<(), SourceError> {
        let (delay, fail) = self.probe.behaviour(|b| (b.start_delay, b.fail_start));
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if fail {
            self.probe.update(|c| c.starts += 1);
            return Err(SourceError::Start("mock device refused to start".into()));
        }
        self.probe.update(|c| {
            c.starts += 1;
            c.powered = true;
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        let fail = self.probe.behaviour(|b| b.fail_stop);
        self.probe.update(|c| {
            c.stops += 1;
            c.powered = false;
        });
        if fail {
            return Err(SourceError::Stop("mock device did not acknowledge stop".into()));
        }
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, SourceError> {
        let (delay, fail) = self.probe.behaviour(|b| (b.capture_delay, b.fail_capture));
        let mut powered = false;
        self.probe.update(|c| {
            powered = c.powered;
            c.captures_in_flight += 1;
            c.max_captures_in_flight = c.max_captures_in_flight.max(c.captures_in_flight);
        });
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut seq = 0;
        self.probe.update(|c| {
            c.captures_in_flight -= 1;
            c.captures += 1;
            seq = c.captures;
        });

        if !powered {
            return Err(SourceError::Capture("mock device is not started".into()));
        }
        if fail {
            return Err(SourceError::Capture("mock sensor read-out failed".into()));
        }
        Ok(Frame::new(Self::frame_bytes(seq)))
    }

    fn describe(&self) -> String {
        String::from("mock camera")
    }
}
