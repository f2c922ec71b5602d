//! Sizing probe: header-only request for `Content-Length`.
//!
//! Uses the curl crate (libcurl) to issue a HEAD request and parse the
//! response headers. The engine never begins a download it cannot size, so
//! a failed probe or a missing/zero length aborts the invocation up front.

mod parse;

use anyhow::{Context, Result};
use std::str;
use std::time::Duration;

/// Parsed probe response: the size and whether byte ranges are advertised.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Total size in bytes, if `Content-Length` was present and parseable.
    pub content_length: Option<u64>,
    /// True if the server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
}

/// Performs a HEAD request and returns the parsed metadata. Follows
/// redirects. Runs on the calling thread.
pub fn probe(url: &str, user_agent: &str, connect_timeout: Duration) -> Result<ProbeResult> {
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?; // HEAD request
    easy.follow_location(true)?;
    easy.useragent(user_agent)?;
    easy.connect_timeout(connect_timeout)?;
    easy.timeout(Duration::from_secs(30))?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                headers.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("HEAD {} returned HTTP {}", url, code);
    }

    Ok(parse::parse_headers(&headers))
}
