//! Invocation control flags: stop request and overall failure.
//!
//! One pair of flags per download invocation, shared by every segment
//! worker. Workers observe `stop` on their one-second tick and in the
//! idle-wait loop; `failed` routes the supervisor to cleanup instead of
//! merge.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub(crate) struct ControlFlags {
    stop: AtomicBool,
    failed: AtomicBool,
}

impl ControlFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Workers close their writers within one tick; the
    /// invocation ends with reason "Stopped".
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Mark the invocation unrecoverable (stop, route exhaustion, disk
    /// failure). Part files are discarded at the end.
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Relaxed);
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}
