//! Default output filename derivation from the source URL.

/// Fallback when the URL path yields nothing usable.
const FALLBACK_NAME: &str = "download.bin";

/// Maximum filename length in bytes (Linux NAME_MAX).
const NAME_MAX: usize = 255;

/// Derive a safe output filename from the URL's last path segment, or
/// `download.bin` when the path is empty or unusable.
pub fn default_output_name(url: &str) -> String {
    let candidate = url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path()
                .split('/')
                .filter(|s| !s.is_empty())
                .next_back()
                .map(str::to_string)
        })
        .unwrap_or_default();
    let sanitized = sanitize(&candidate);
    if sanitized.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        sanitized
    }
}

/// Replace path separators, whitespace, and control characters with `_`,
/// trim leading/trailing dots and underscores, and cap at NAME_MAX bytes.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '/' || c == '\\' || c.is_control() || c.is_whitespace() {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }
    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
