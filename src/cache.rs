//! Durable plaintext cache for submitted part selections.
//!
//! The chain only ever stores encrypted handles, so the plaintext a user
//! submitted is recoverable only on the device that created or updated the
//! character. One JSON file per character id, written after a confirmed
//! transaction and read on every detail render. Absence is a normal state;
//! so is a stale entry for a character later deleted on-chain.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

use crate::types::{CharacterId, CharacterParts};

/// Filesystem-backed parts cache. Every failure degrades to a miss (reads)
/// or a logged no-op (writes); the cache never fails its caller.
pub struct PartsCache {
    dir: PathBuf,
}

impl PartsCache {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store the plaintext parts for `id`, overwriting any prior entry.
    pub fn put(&self, id: CharacterId, parts: &CharacterParts) {
        if let Err(err) = self.write_entry(id, parts) {
            warn!(id, error = %format!("{err:#}"), "failed to persist plaintext parts");
        }
    }

    /// Fetch the cached parts for `id`. Missing, unreadable, and corrupt
    /// entries all report as `None`.
    pub fn get(&self, id: CharacterId) -> Option<CharacterParts> {
        let path = self.entry_path(id);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(parts) => Some(parts),
            Err(err) => {
                warn!(id, error = %err, "discarding corrupt parts cache entry");
                None
            }
        }
    }

    fn write_entry(&self, id: CharacterId, parts: &CharacterParts) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).context("create cache directory")?;
        let payload = serde_json::to_vec(parts).context("encode parts entry")?;
        fs::write(self.entry_path(id), payload).context("write parts entry")?;
        Ok(())
    }

    fn entry_path(&self, id: CharacterId) -> PathBuf {
        self.dir.join(format!("character_{id}_parts.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_entry_reads_as_none() {
        let dir = tempdir().expect("tempdir");
        let cache = PartsCache::open(dir.path());
        assert_eq!(cache.get(42), None);
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().expect("tempdir");
        let cache = PartsCache::open(dir.path());
        let parts = CharacterParts::from_array([3, 1, 0, 5, 2, 0]);
        cache.put(42, &parts);
        assert_eq!(cache.get(42), Some(parts));
    }

    #[test]
    fn put_overwrites_without_merging() {
        let dir = tempdir().expect("tempdir");
        let cache = PartsCache::open(dir.path());
        let first = CharacterParts::from_array([1, 1, 1, 1, 1, 1]);
        let second = CharacterParts::from_array([2, 0, 0, 0, 0, 9]);
        cache.put(7, &first);
        cache.put(7, &second);
        assert_eq!(cache.get(7), Some(second));
    }

    #[test]
    fn corrupt_entry_reads_as_none() {
        let dir = tempdir().expect("tempdir");
        let cache = PartsCache::open(dir.path());
        fs::create_dir_all(dir.path()).expect("dir");
        fs::write(dir.path().join("character_9_parts.json"), b"{not json")
            .expect("write corrupt entry");
        assert_eq!(cache.get(9), None);
    }

    #[test]
    fn unavailable_storage_is_swallowed() {
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("occupied");
        fs::write(&blocker, b"file, not a directory").expect("blocker");
        let cache = PartsCache::open(&blocker);
        cache.put(1, &CharacterParts::default());
        assert_eq!(cache.get(1), None);
    }

    #[test]
    fn entries_are_keyed_per_character() {
        let dir = tempdir().expect("tempdir");
        let cache = PartsCache::open(dir.path());
        let a = CharacterParts::from_array([1, 2, 3, 4, 5, 6]);
        let b = CharacterParts::from_array([6, 5, 4, 3, 2, 1]);
        cache.put(1, &a);
        cache.put(2, &b);
        assert_eq!(cache.get(1), Some(a));
        assert_eq!(cache.get(2), Some(b));
    }
}
