//! Minimal HTTP/1.1 server with HEAD and Range GET for integration tests.
//!
//! Serves a single static body. Failure injection knobs let tests force
//! mid-stream transport errors (close the connection after N body bytes)
//! and slow routes (pace the body), which is what migration feeds on.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Close the connection after sending this many body bytes. The full
    /// Content-Length is still announced, so the client sees a truncated
    /// stream.
    pub max_body_bytes_per_conn: Option<u64>,
    /// Pace the body: write this many bytes, then sleep 10ms.
    pub throttle_chunk: Option<usize>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            max_body_bytes_per_conn: None,
            throttle_chunk: None,
        }
    }
}

/// Starts a server in a background thread serving `body`. Returns the base
/// URL (e.g. "http://127.0.0.1:12345/file.bin"). The server runs until the
/// process exits.
pub fn start(body: Vec<u8>) -> String {
    start_with_options(body, RangeServerOptions::default())
}

/// Like `start` but with failure injection / pacing knobs.
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            thread::spawn(move || handle(stream, &body, opts));
        }
    });
    format!("http://127.0.0.1:{port}/file.bin")
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));

    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
            return;
        }
        let response =
            format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\nAccept-Ranges: bytes\r\n\r\n");
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
        return;
    }

    let (status, slice) = match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            let start = start.min(total);
            let end_excl = end_incl.saturating_add(1).min(total);
            if start >= end_excl {
                let _ = stream.write_all(
                    format!(
                        "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{total}\r\nContent-Length: 0\r\n\r\n"
                    )
                    .as_bytes(),
                );
                return;
            }
            (
                "206 Partial Content",
                &body[start as usize..end_excl as usize],
            )
        }
        None => ("200 OK", body),
    };

    let header = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n\r\n",
        slice.len()
    );
    if stream.write_all(header.as_bytes()).is_err() {
        return;
    }
    send_body(&mut stream, slice, opts);
}

/// Write the body honoring the per-connection byte cap and throttle. A
/// capped connection just stops writing and drops; the announced
/// Content-Length makes that a truncated stream on the client side.
fn send_body(stream: &mut TcpStream, slice: &[u8], opts: RangeServerOptions) {
    let cap = opts.max_body_bytes_per_conn.unwrap_or(u64::MAX);
    let to_send = &slice[..(cap.min(slice.len() as u64) as usize)];
    let chunk = opts.throttle_chunk.unwrap_or(64 * 1024).max(1);
    for piece in to_send.chunks(chunk) {
        if stream.write_all(piece).is_err() {
            return;
        }
        if opts.throttle_chunk.is_some() {
            let _ = stream.flush();
            thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Returns (method, optional (start, end_inclusive) from `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(spec) = value.strip_prefix("bytes=") {
                    if let Some((a, b)) = spec.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end_incl = if b.trim().is_empty() {
                            u64::MAX
                        } else {
                            b.trim().parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, range)
}
