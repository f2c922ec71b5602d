//! Parse HTTP response header lines into a ProbeResult.

use super::ProbeResult;

/// Scan collected header lines. When redirects were followed the lines hold
/// several header blocks; the last occurrence of each header wins, which is
/// the block of the final response.
pub(crate) fn parse_headers(lines: &[String]) -> ProbeResult {
    let mut content_length = None;
    let mut accept_ranges = false;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    content_length = Some(n);
                }
            }
            if name.eq_ignore_ascii_case("accept-ranges") {
                accept_ranges = value.eq_ignore_ascii_case("bytes");
            }
        }
    }

    ProbeResult {
        content_length,
        accept_ranges,
    }
}
