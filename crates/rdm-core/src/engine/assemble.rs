//! Final reassembly: ordered part-file concatenation and failure cleanup.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Append every part file to `destination` in segment-definition order
/// (byte-range order, not completion order), deleting each part after it
/// is appended. Any pre-existing file at the destination is replaced.
pub(crate) fn merge_parts(parts: &[PathBuf], destination: &Path) -> Result<()> {
    if destination.exists() {
        fs::remove_file(destination)
            .with_context(|| format!("failed to replace {}", destination.display()))?;
    }
    for part in parts {
        let mut reader =
            File::open(part).with_context(|| format!("failed to open {}", part.display()))?;
        let mut writer = OpenOptions::new()
            .append(true)
            .create(true)
            .open(destination)
            .with_context(|| format!("failed to open {}", destination.display()))?;
        io::copy(&mut reader, &mut writer)
            .with_context(|| format!("failed to append {}", part.display()))?;
        fs::remove_file(part)
            .with_context(|| format!("failed to remove {}", part.display()))?;
    }
    Ok(())
}

/// Delete whatever part files exist. Used on failure and stop; missing
/// parts (segments that never started) are not an error.
pub(crate) fn remove_parts(parts: &[PathBuf]) {
    for part in parts {
        if part.exists() {
            if let Err(e) = fs::remove_file(part) {
                warn!(part = %part.display(), error = %e, "failed to remove part file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn merge_concatenates_in_definition_order() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let parts: Vec<PathBuf> = (0..3)
            .map(|i| dir.path().join(format!("out.bin.part{i}")))
            .collect();
        // Written out of order; merge order must still follow indices.
        fs::write(&parts[2], b"cc").unwrap();
        fs::write(&parts[0], b"aaaa").unwrap();
        fs::write(&parts[1], b"b").unwrap();

        merge_parts(&parts, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"aaaabcc");
        for part in &parts {
            assert!(!part.exists(), "part should be deleted after merge");
        }
    }

    #[test]
    fn merge_replaces_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        fs::write(&dest, b"stale contents").unwrap();
        let part = dir.path().join("out.bin.part0");
        fs::write(&part, b"fresh").unwrap();

        merge_parts(&[part], &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"fresh");
    }

    #[test]
    fn merge_fails_on_missing_part() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let missing = dir.path().join("out.bin.part0");
        assert!(merge_parts(&[missing], &dest).is_err());
    }

    #[test]
    fn remove_parts_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.part0");
        let missing = dir.path().join("a.part1");
        fs::write(&present, b"x").unwrap();
        remove_parts(&[present.clone(), missing]);
        assert!(!present.exists());
    }
}
