//! Adaptive multi-route download engine.
//!
//! Sizes the resource with a header probe, partitions it into byte-range
//! segments by percentage share, downloads each segment over its own route
//! on its own worker thread, migrates struggling segments onto faster idle
//! routes, and reassembles the part files in range order. `start` returns
//! as soon as workers are dispatched; terminal outcomes arrive on the event
//! channel and progress is polled via `status`.

mod assemble;
mod control;
mod error;
mod pool;
mod rate;
mod segment;
mod transport;
mod worker;

pub use error::AttemptError;
pub use segment::{SegmentRequest, SegmentSnapshot};

use crate::config::RdmConfig;
use crate::probe;
use control::ControlFlags;
use pool::RoutePool;
use segment::SegmentState;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

/// Terminal signal reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// All segments finished and the destination file was assembled.
    Completed,
    /// The invocation ended without an artifact; part files were deleted.
    Failed(FailureReason),
}

/// Why a download ended without a merged artifact. The host distinguishes
/// a user-requested stop from a genuine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Stopped,
    Failed,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Stopped => write!(f, "Stopped"),
            FailureReason::Failed => write!(f, "Failed"),
        }
    }
}

/// Invocation-scoped shared state, passed explicitly to every worker and
/// dropped when the invocation ends.
pub(crate) struct DownloadContext {
    pub config: RdmConfig,
    pub pool: RoutePool,
    pub flags: ControlFlags,
    pub segments: Vec<Arc<SegmentState>>,
}

struct Invocation {
    ctx: Arc<DownloadContext>,
    /// Set by the supervisor after the terminal event is emitted.
    done: Arc<AtomicBool>,
}

/// The download engine. One invocation runs at a time; state from the last
/// invocation remains pollable until the next `start`.
pub struct Engine {
    config: RdmConfig,
    events: mpsc::Sender<EngineEvent>,
    current: Mutex<Option<Invocation>>,
}

impl Engine {
    /// Build an engine and the receiver its terminal events arrive on.
    pub fn new(config: RdmConfig) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (events, rx) = mpsc::channel();
        (
            Self {
                config,
                events,
                current: Mutex::new(None),
            },
            rx,
        )
    }

    /// Start a download: probe the size, partition, dispatch one worker per
    /// segment, return immediately. Returns `false` without any further
    /// action when the probe fails or reports a non-positive length, when
    /// the share list cannot be partitioned exactly, or while a previous
    /// invocation is still running.
    pub fn start(&self, requests: Vec<SegmentRequest>, destination: &Path) -> bool {
        if !segment::shares_are_valid(&requests) {
            warn!("rejecting request list with unpartitionable shares");
            return false;
        }

        // The probe runs before the invocation slot is taken so status
        // polls never block behind network I/O.
        let url = &requests[0].url;
        let probed = match probe::probe(url, &self.config.user_agent, self.config.connect_timeout())
        {
            Ok(p) => p,
            Err(e) => {
                warn!(url = %url, error = %e, "sizing probe failed");
                return false;
            }
        };
        let Some(content_length) = probed.content_length.filter(|len| *len > 0) else {
            warn!(url = %url, "probe returned no usable content length");
            return false;
        };
        if !probed.accept_ranges {
            debug!(url = %url, "server does not advertise byte ranges");
        }

        let mut current = self.current.lock().unwrap();
        if let Some(inv) = current.as_ref() {
            if !inv.done.load(Ordering::Relaxed) {
                warn!("download already in progress, refusing to start another");
                return false;
            }
        }

        info!(url = %url, content_length, segments = requests.len(), "starting download");
        let segments = segment::plan_segments(&requests, content_length, destination);
        let ctx = Arc::new(DownloadContext {
            config: self.config.clone(),
            pool: RoutePool::new(),
            flags: ControlFlags::new(),
            segments,
        });
        for request in &requests {
            ctx.pool.track(&request.route);
        }

        let mut handles = Vec::with_capacity(ctx.segments.len());
        for seg in &ctx.segments {
            let ctx = Arc::clone(&ctx);
            let seg = Arc::clone(seg);
            handles.push(thread::spawn(move || worker::run(&ctx, &seg)));
        }

        let done = Arc::new(AtomicBool::new(false));
        {
            let ctx = Arc::clone(&ctx);
            let done = Arc::clone(&done);
            let events = self.events.clone();
            let destination = destination.to_path_buf();
            thread::spawn(move || {
                supervise(&ctx, handles, &destination, &events);
                done.store(true, Ordering::Relaxed);
            });
        }

        *current = Some(Invocation { ctx, done });
        true
    }

    /// Request a stop. Observed by every worker within one tick; the
    /// invocation ends with reason "Stopped" and part files are deleted.
    pub fn stop(&self) {
        if let Some(inv) = self.current.lock().unwrap().as_ref() {
            inv.ctx.flags.request_stop();
        }
    }

    /// Snapshot of all segments for host polling. Empty before the first
    /// `start`; no side effects.
    pub fn status(&self) -> Vec<SegmentSnapshot> {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|inv| inv.ctx.segments.iter().map(|s| s.snapshot()).collect())
            .unwrap_or_default()
    }
}

/// Await all workers, then either assemble the destination file or clean
/// up the parts, and emit the terminal event.
fn supervise(
    ctx: &DownloadContext,
    handles: Vec<thread::JoinHandle<()>>,
    destination: &Path,
    events: &mpsc::Sender<EngineEvent>,
) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("segment worker panicked");
            ctx.flags.mark_failed();
        }
    }
    let parts: Vec<PathBuf> = ctx.segments.iter().map(|s| s.part_path.clone()).collect();

    if !ctx.flags.failed() {
        match assemble::merge_parts(&parts, destination) {
            Ok(()) => {
                info!(destination = %destination.display(), "download complete");
                let _ = events.send(EngineEvent::Completed);
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to assemble destination file");
                ctx.flags.mark_failed();
            }
        }
    }

    assemble::remove_parts(&parts);
    let reason = if ctx.flags.stop_requested() {
        FailureReason::Stopped
    } else {
        FailureReason::Failed
    };
    info!(%reason, "download did not complete");
    let _ = events.send(EngineEvent::Failed(reason));
}
