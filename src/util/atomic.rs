//! Crash-safe persistence for small state files under `~/.roundtable`.
//!
//! Content is written to a [`tempfile::NamedTempFile`] beside the target and
//! then renamed over it, so a concurrent reader sees either the old file or
//! the new one.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Atomically replace `path` with `content`, creating missing parent
/// directories first.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created, writing the
/// temporary file fails, or the final rename fails.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .with_context(|| format!("no parent directory for {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(content.as_bytes())
        .and_then(|()| tmp.flush())
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Pretty-print `value` as JSON and write it with [`atomic_write`].
///
/// # Errors
///
/// Serialization or write failure.
pub fn atomic_write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut body = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    body.push('\n');
    atomic_write(path, &body)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_creates_missing_parent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("nested/state.json");
        atomic_write(&target, "{}").expect("write");
        assert_eq!(std::fs::read_to_string(&target).expect("read"), "{}");
    }

    #[test]
    fn test_replaces_existing_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("state.json");
        atomic_write(&target, "old").expect("first");
        atomic_write(&target, "new").expect("second");
        assert_eq!(std::fs::read_to_string(&target).expect("read"), "new");
    }

    #[test]
    fn test_json_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("map.json");
        let map = BTreeMap::from([("codex", true), ("gemini", false)]);
        atomic_write_json(&target, &map).expect("write");
        let back: BTreeMap<String, bool> =
            serde_json::from_str(&std::fs::read_to_string(&target).expect("read")).expect("parse");
        assert_eq!(back.get("codex"), Some(&true));
        assert_eq!(back.get("gemini"), Some(&false));
    }
}
