//! Checksum verification of the final artifact, off the hot path.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Streams through the hasher; suitable for large files.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).with_context(|| format!("read {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compare a file against an expected hex digest, case-insensitively.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<bool> {
    let actual = sha256_path(path)?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}
