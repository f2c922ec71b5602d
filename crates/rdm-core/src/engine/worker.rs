//! Segment worker: drives one segment to completion across route changes.
//!
//! One OS thread per segment. Each attempt issues a ranged GET over the
//! segment's current route and streams the body into the part file. A
//! one-second tick updates progress and the rate table, flags the worst
//! connection, and decides migration; stall and stop are observed on the
//! same tick. Migration loops back into a new attempt with the byte count
//! carried forward; the part file is appended to, never truncated.

use super::error::AttemptError;
use super::segment::SegmentState;
use super::transport;
use super::DownloadContext;
use crate::engine::rate::RollingSpeed;
use crate::route::Route;
use std::cell::{Cell, RefCell};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why the tick aborted the transfer.
enum TickVerdict {
    /// Stop flag observed; overall failure flag raised.
    Stopped,
    /// A faster idle route was claimed for preemptive migration.
    Shift(Route),
    /// No inbound data for the configured read timeout.
    TimedOut,
}

enum AttemptOutcome {
    Completed,
    Migrate {
        /// Route already claimed by the tick, if any.
        claimed: Option<Route>,
        /// Permanently retire the old route (proxy circuit hard failure).
        retire: bool,
    },
    /// Stop observed or storage failure; unwind without migration.
    Fatal,
}

pub(crate) fn run(ctx: &DownloadContext, seg: &SegmentState) {
    loop {
        if ctx.flags.stop_requested() {
            ctx.flags.mark_failed();
            return;
        }
        let route = seg.route();
        match attempt(ctx, seg, &route) {
            AttemptOutcome::Completed => {
                ctx.pool.release(&route);
                debug!(segment = seg.index, route = %route, "segment complete");
                return;
            }
            AttemptOutcome::Fatal => {
                ctx.pool.release(&route);
                return;
            }
            AttemptOutcome::Migrate { claimed, retire } => {
                if retire {
                    info!(segment = seg.index, route = %route, "retiring proxy circuit");
                    ctx.pool.retire(&route);
                } else {
                    ctx.pool.release(&route);
                }
                if ctx.pool.dead_count() >= ctx.segments.len() {
                    warn!(segment = seg.index, "all routes retired, failing download");
                    ctx.flags.mark_failed();
                    return;
                }
                let next = match claimed {
                    Some(r) => Some(r),
                    None => wait_for_idle(ctx, &route),
                };
                let Some(next) = next else { return };
                info!(segment = seg.index, from = %route, to = %next, "migrating segment");
                seg.migrate_to(next);
            }
        }
    }
}

/// Poll for an idle route to take over. Unbounded on the assumption that
/// forward progress elsewhere eventually frees one; exits early on stop,
/// on overall failure, and on route exhaustion.
fn wait_for_idle(ctx: &DownloadContext, old: &Route) -> Option<Route> {
    debug!(route = %old, "waiting for an idle route");
    loop {
        if ctx.flags.stop_requested() {
            ctx.flags.mark_failed();
            return None;
        }
        if ctx.flags.failed() {
            return None;
        }
        if ctx.pool.dead_count() >= ctx.segments.len() {
            ctx.flags.mark_failed();
            return None;
        }
        if let Some(route) = ctx.pool.claim_best_idle(&old.id()) {
            return Some(route);
        }
        std::thread::sleep(ctx.config.idle_poll_interval());
    }
}

/// One attempt: open the part file, stream the remaining range over the
/// route's transport, tick once per second, classify the ending.
fn attempt(ctx: &DownloadContext, seg: &SegmentState, route: &Route) -> AttemptOutcome {
    let already = seg.downloaded_bytes();
    let expected = seg.total_bytes.saturating_sub(already);
    if expected == 0 {
        seg.record_progress(already, 0);
        return AttemptOutcome::Completed;
    }

    let file = match open_part(seg) {
        Ok(f) => f,
        Err(e) => return classify(ctx, seg, route, AttemptError::Storage(e)),
    };

    let mut easy = curl::easy::Easy::new();
    if let Err(e) = configure(&mut easy, ctx, seg, route, already) {
        return classify(ctx, seg, route, AttemptError::Curl(e));
    }

    let attempt_bytes = Arc::new(AtomicU64::new(0));
    let tick_bytes = Arc::clone(&attempt_bytes);
    let storage_error: Arc<Mutex<Option<std::io::Error>>> = Arc::new(Mutex::new(None));
    let route_id = route.id();

    let started = Instant::now();
    let last_tick = Cell::new(started);
    let last_data = Cell::new(started);
    let rolling = RefCell::new(RollingSpeed::new());
    let verdict: RefCell<Option<TickVerdict>> = RefCell::new(None);

    let perform_result = {
        let mut transfer = easy.transfer();
        {
            let bytes = Arc::clone(&attempt_bytes);
            let storage_error = Arc::clone(&storage_error);
            let mut file = file;
            let write_result = transfer.write_function(move |data| {
                match file.write_all(data) {
                    Ok(()) => {
                        bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
                        Ok(data.len())
                    }
                    Err(e) => {
                        // A short count makes curl abort with a write
                        // error; the io::Error is recovered below.
                        let _ = storage_error.lock().unwrap().replace(e);
                        Ok(0)
                    }
                }
            });
            if let Err(e) = write_result {
                return classify(ctx, seg, route, AttemptError::Curl(e));
            }
        }
        let tick_result = transfer.progress_function(|_, _, _, _| {
            if verdict.borrow().is_some() {
                return false;
            }
            let now = Instant::now();
            if now.duration_since(last_tick.get()) < ctx.config.tick_interval() {
                return true;
            }
            last_tick.set(now);

            if ctx.flags.stop_requested() {
                ctx.flags.mark_failed();
                *verdict.borrow_mut() = Some(TickVerdict::Stopped);
                return false;
            }

            let written = already + tick_bytes.load(Ordering::Relaxed);
            let delta = written.saturating_sub(seg.downloaded_bytes());
            let speed = rolling.borrow_mut().push(delta);
            seg.record_progress(written, speed);
            if delta > 0 {
                // Only ticks with new bytes feed the rate table; a stalled
                // route keeps its last known speed for comparisons.
                ctx.pool.rates.record(&route_id, speed);
                last_data.set(now);
            }

            let worst = ctx.pool.is_worst(&route_id);
            seg.set_worst(worst);
            if worst {
                if let Some(better) = ctx.pool.claim_faster_idle(&route_id) {
                    *verdict.borrow_mut() = Some(TickVerdict::Shift(better));
                    return false;
                }
            }
            if now.duration_since(last_data.get()) > ctx.config.read_timeout() {
                warn!(segment = seg.index, route = %route_id, "read timeout, forcing migration");
                *verdict.borrow_mut() = Some(TickVerdict::TimedOut);
                return false;
            }
            true
        });
        if let Err(e) = tick_result {
            return classify(ctx, seg, route, AttemptError::Curl(e));
        }
        transfer.perform()
    };

    let received = attempt_bytes.load(Ordering::Relaxed);
    seg.record_progress(already + received, 0);
    let (stopped_by_tick, tick_claim) = match verdict.into_inner() {
        Some(TickVerdict::Stopped) => (true, None),
        Some(TickVerdict::Shift(better)) => (false, Some(better)),
        Some(TickVerdict::TimedOut) | None => (false, None),
    };

    let outcome = match perform_result {
        Err(e) if e.is_aborted_by_callback() => {
            if stopped_by_tick {
                AttemptOutcome::Fatal
            } else {
                AttemptOutcome::Migrate {
                    claimed: None,
                    retire: false,
                }
            }
        }
        Err(e) if e.is_write_error() && storage_error.lock().unwrap().is_some() => {
            let io_err = storage_error.lock().unwrap().take().unwrap();
            classify(ctx, seg, route, AttemptError::Storage(io_err))
        }
        Err(e) => classify(ctx, seg, route, AttemptError::Curl(e)),
        Ok(()) => {
            let code = easy.response_code().unwrap_or(0);
            if !(200..300).contains(&code) {
                classify(ctx, seg, route, AttemptError::Http(code))
            } else if received != expected {
                // On over-delivery the server ignored the Range header; the
                // surplus is not this segment's bytes, so drop this
                // attempt's output before migrating.
                if received > expected {
                    if let Err(e) = roll_back_part(seg, already) {
                        return classify(ctx, seg, route, AttemptError::Storage(e));
                    }
                }
                classify(
                    ctx,
                    seg,
                    route,
                    AttemptError::LengthMismatch { expected, received },
                )
            } else {
                AttemptOutcome::Completed
            }
        }
    };

    // A route claimed by the tick in the same instant the transfer ended on
    // its own is reused for the migration, or handed back to the pool.
    match (outcome, tick_claim) {
        (
            AttemptOutcome::Migrate {
                claimed: None,
                retire,
            },
            Some(better),
        ) => AttemptOutcome::Migrate {
            claimed: Some(better),
            retire,
        },
        (outcome, Some(better)) => {
            ctx.pool.release(&better);
            outcome
        }
        (outcome, None) => outcome,
    }
}

/// First attempt starts the part file fresh; post-migration attempts append
/// so previously downloaded bytes survive the route change.
fn open_part(seg: &SegmentState) -> std::io::Result<File> {
    if seg.shifted() {
        OpenOptions::new().append(true).create(true).open(&seg.part_path)
    } else {
        if seg.part_path.exists() {
            fs::remove_file(&seg.part_path)?;
        }
        File::create(&seg.part_path)
    }
}

/// Truncate the part file back to the pre-attempt byte count and rewind the
/// segment's counter to match.
fn roll_back_part(seg: &SegmentState, already: u64) -> std::io::Result<()> {
    let file = OpenOptions::new().write(true).open(&seg.part_path)?;
    file.set_len(already)?;
    seg.record_progress(already, 0);
    Ok(())
}

fn configure(
    easy: &mut curl::easy::Easy,
    ctx: &DownloadContext,
    seg: &SegmentState,
    route: &Route,
    already: u64,
) -> Result<(), curl::Error> {
    easy.url(&seg.url)?;
    easy.useragent(&ctx.config.user_agent)?;
    easy.follow_location(true)?;
    // Error bodies must not reach the part file.
    easy.fail_on_error(true)?;
    easy.connect_timeout(ctx.config.connect_timeout())?;
    easy.progress(true)?;
    transport::apply(easy, route)?;
    easy.range(&format!("{}-{}", seg.from_bytes + already, seg.to_bytes - 1))
}

/// Transport-level failure: recover by migration, retiring the route
/// permanently when it is a proxy circuit. Bound-local-interface routes are
/// assumed inherently reliable and only ever re-tried.
fn classify(
    ctx: &DownloadContext,
    seg: &SegmentState,
    route: &Route,
    error: AttemptError,
) -> AttemptOutcome {
    if let AttemptError::Storage(io_err) = error {
        return fatal_storage(ctx, seg, io_err);
    }
    warn!(segment = seg.index, route = %route, error = %error, "segment attempt failed");
    AttemptOutcome::Migrate {
        claimed: None,
        retire: !route.is_local(),
    }
}

fn fatal_storage(ctx: &DownloadContext, seg: &SegmentState, error: std::io::Error) -> AttemptOutcome {
    warn!(segment = seg.index, error = %error, "part file write failed, failing download");
    ctx.flags.mark_failed();
    AttemptOutcome::Fatal
}
