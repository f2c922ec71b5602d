//! Segment requests, range partitioning, and shared per-segment state.
//!
//! Ranges are half-open `[from, to)` internally; the wire format is the
//! inclusive `bytes=from-(to-1)`. Mutable fields are atomics so the host
//! can poll snapshots while workers run.

use crate::route::Route;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Input for one segment: where to fetch, over which route, and what share
/// of the total content (percent). Immutable once accepted.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    pub url: String,
    pub route: Route,
    pub share: f64,
}

/// Live state of one segment, shared between its worker and status polls.
pub(crate) struct SegmentState {
    pub index: usize,
    pub url: String,
    pub from_bytes: u64,
    /// Exclusive end; the last segment's end equals the content length.
    pub to_bytes: u64,
    pub total_bytes: u64,
    pub part_path: PathBuf,
    route: Mutex<Route>,
    downloaded: AtomicU64,
    progress: AtomicU32,
    speed: AtomicU64,
    shifted: AtomicBool,
    worst: AtomicBool,
}

impl SegmentState {
    pub fn route(&self) -> Route {
        self.route.lock().unwrap().clone()
    }

    /// Reassign to a claimed idle route; from here on the part file is
    /// only ever appended to.
    pub fn migrate_to(&self, route: Route) {
        *self.route.lock().unwrap() = route;
        self.shifted.store(true, Ordering::Relaxed);
    }

    pub fn shifted(&self) -> bool {
        self.shifted.load(Ordering::Relaxed)
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Bytes still missing from this segment's range.
    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.downloaded_bytes())
    }

    /// Tick update: absolute downloaded count and current rolling speed.
    /// Clamped to the range size so status never reports an overshoot.
    pub fn record_progress(&self, downloaded: u64, speed: u64) {
        let downloaded = downloaded.min(self.total_bytes);
        self.downloaded.store(downloaded, Ordering::Relaxed);
        self.progress.store(percent_of(downloaded, self.total_bytes), Ordering::Relaxed);
        self.speed.store(speed, Ordering::Relaxed);
    }

    pub fn set_worst(&self, worst: bool) {
        self.worst.store(worst, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SegmentSnapshot {
        SegmentSnapshot {
            index: self.index,
            url: self.url.clone(),
            route: self.route(),
            from_bytes: self.from_bytes,
            to_bytes: self.to_bytes,
            total_bytes: self.total_bytes,
            downloaded_bytes: self.downloaded.load(Ordering::Relaxed),
            progress: self.progress.load(Ordering::Relaxed),
            speed: self.speed.load(Ordering::Relaxed),
            shifted: self.shifted.load(Ordering::Relaxed),
            worst_connection: self.worst.load(Ordering::Relaxed),
            part_path: self.part_path.clone(),
        }
    }
}

/// Host-facing view of one segment, returned by `Engine::status`.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSnapshot {
    pub index: usize,
    pub url: String,
    pub route: Route,
    pub from_bytes: u64,
    pub to_bytes: u64,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    /// 0-100, integer.
    pub progress: u32,
    /// Rolling average of the last 5 one-second samples, bytes/sec.
    pub speed: u64,
    /// Has this segment ever been migrated to a different route?
    pub shifted: bool,
    /// Is this segment's current route the slowest active one?
    pub worst_connection: bool,
    pub part_path: PathBuf,
}

/// Integer percentage, rounded to nearest.
fn percent_of(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    ((done * 100 + total / 2) / total) as u32
}

/// Accept only share lists the engine can partition exactly: non-empty,
/// every share positive, shares summing to at most 100.
pub(crate) fn shares_are_valid(requests: &[SegmentRequest]) -> bool {
    if requests.is_empty() {
        return false;
    }
    let mut sum = 0.0;
    for r in requests {
        if r.share <= 0.0 {
            return false;
        }
        sum += r.share;
    }
    sum <= 100.0 + 1e-9
}

/// Lay out segments cumulatively in request order. Each gets
/// `floor(content_length * share / 100)` bytes; the final segment absorbs
/// all rounding remainder so its end is exactly `content_length`.
pub(crate) fn plan_segments(
    requests: &[SegmentRequest],
    content_length: u64,
    destination: &Path,
) -> Vec<Arc<SegmentState>> {
    let mut segments = Vec::with_capacity(requests.len());
    let mut covered = 0u64;
    for (index, request) in requests.iter().enumerate() {
        let total = (content_length as f64 * request.share / 100.0).floor() as u64;
        let (from, mut to) = (covered, covered + total);
        if index == requests.len() - 1 {
            to = content_length;
        }
        covered = to;
        segments.push(Arc::new(SegmentState {
            index,
            url: request.url.clone(),
            from_bytes: from,
            to_bytes: to,
            total_bytes: to - from,
            part_path: part_path(destination, index),
            route: Mutex::new(request.route.clone()),
            downloaded: AtomicU64::new(0),
            progress: AtomicU32::new(0),
            speed: AtomicU64::new(0),
            shifted: AtomicBool::new(false),
            worst: AtomicBool::new(false),
        }));
    }
    segments
}

/// Per-segment partial file: destination path plus a segment-index suffix.
fn part_path(destination: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.part{}", destination.display(), index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(share: f64) -> SegmentRequest {
        SegmentRequest {
            url: "http://example.test/file".into(),
            route: Route::SocksProxy {
                host: "127.0.0.1".into(),
                port: 9050,
            },
            share,
        }
    }

    #[test]
    fn sixty_forty_split_of_1000() {
        let reqs = [request(60.0), request(40.0)];
        let segs = plan_segments(&reqs, 1000, Path::new("/tmp/out.bin"));
        assert_eq!(segs[0].from_bytes, 0);
        assert_eq!(segs[0].to_bytes, 600);
        assert_eq!(segs[1].from_bytes, 600);
        assert_eq!(segs[1].to_bytes, 1000);
        assert_eq!(segs[1].total_bytes, 400);
    }

    #[test]
    fn last_segment_absorbs_rounding_remainder() {
        let reqs = [request(33.0), request(33.0), request(34.0)];
        let segs = plan_segments(&reqs, 1001, Path::new("/tmp/out.bin"));
        // floor(1001*0.33) = 330 twice; the last covers the rest.
        assert_eq!(segs[0].to_bytes, 330);
        assert_eq!(segs[1].to_bytes, 660);
        assert_eq!(segs[2].to_bytes, 1001);
        assert_eq!(segs[2].total_bytes, 341);
    }

    #[test]
    fn ranges_partition_without_gaps_or_overlaps() {
        let reqs = [request(12.5), request(37.5), request(25.0), request(25.0)];
        let segs = plan_segments(&reqs, 999_983, Path::new("/tmp/out.bin"));
        let mut covered = 0;
        for s in &segs {
            assert_eq!(s.from_bytes, covered);
            assert!(s.to_bytes >= s.from_bytes);
            covered = s.to_bytes;
        }
        assert_eq!(covered, 999_983);
    }

    #[test]
    fn part_files_are_indexed_from_destination() {
        let reqs = [request(50.0), request(50.0)];
        let segs = plan_segments(&reqs, 100, Path::new("/data/iso/debian.iso"));
        assert_eq!(
            segs[0].part_path,
            PathBuf::from("/data/iso/debian.iso.part0")
        );
        assert_eq!(
            segs[1].part_path,
            PathBuf::from("/data/iso/debian.iso.part1")
        );
    }

    #[test]
    fn share_validation() {
        assert!(!shares_are_valid(&[]));
        assert!(!shares_are_valid(&[request(0.0)]));
        assert!(!shares_are_valid(&[request(-5.0), request(105.0)]));
        assert!(!shares_are_valid(&[request(60.0), request(60.0)]));
        assert!(shares_are_valid(&[request(60.0), request(40.0)]));
        assert!(shares_are_valid(&[request(33.3), request(33.3), request(33.3)]));
    }

    #[test]
    fn progress_rounds_to_nearest() {
        assert_eq!(percent_of(0, 1000), 0);
        assert_eq!(percent_of(605, 1000), 61);
        assert_eq!(percent_of(604, 1000), 60);
        assert_eq!(percent_of(1000, 1000), 100);
        assert_eq!(percent_of(0, 0), 100);
    }

    #[test]
    fn migration_marks_shifted_and_swaps_route() {
        let reqs = [request(100.0)];
        let segs = plan_segments(&reqs, 100, Path::new("/tmp/out.bin"));
        assert!(!segs[0].shifted());
        let better = Route::LocalInterface {
            name: "eth1".into(),
            address: "10.1.1.1".into(),
        };
        segs[0].migrate_to(better.clone());
        assert!(segs[0].shifted());
        assert_eq!(segs[0].route(), better);
    }
}
