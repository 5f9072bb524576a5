use bytes::Bytes;
use parking_lot::Mutex;
use std::{sync::Arc, time::SystemTime};

/// Source of wall-clock time for frame timestamps and freshness checks.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// The most recently uploaded image and the time it was accepted.
///
/// `data` is an immutable shared buffer, so a `Frame` stays valid after the
/// store has been overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Bytes,
    pub received_at: SystemTime,
}

/// Single-slot holder for the latest camera frame.
pub struct FrameStore {
    latest: Mutex<Option<Frame>>,
    clock: Arc<dyn Clock>,
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            latest: Mutex::new(None),
            clock,
        }
    }

    /// Replaces the current frame. The timestamp is taken under the lock so
    /// the last writer always carries the latest arrival time.
    pub fn put(&self, data: impl Into<Bytes>) {
        let data = data.into();
        let size = data.len();
        let mut latest = self.latest.lock();
        *latest = Some(Frame {
            data,
            received_at: self.clock.now(),
        });
        drop(latest);
        tracing::debug!(size_bytes = size, "Stored new frame");
    }

    pub fn get(&self) -> Option<Frame> {
        self.latest.lock().clone()
    }

    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }
}
