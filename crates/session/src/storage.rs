// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable client storage: small keyed JSON entries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::StorageError;

/// Entry holding the serialized credential pair.
pub const CREDENTIALS_KEY: &str = "credentials";
/// Entry holding the last-known user profile (`null` when unknown).
pub const USER_KEY: &str = "user";

/// Keyed string storage. Values are opaque to the store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per entry inside a state directory.
///
/// Writes go to a unique temp file and are renamed into place, so a reader
/// never observes a half-written entry.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_path = self.dir.join(format!("{key}.json.{}.{seq}.tmp", std::process::id()));
        write_private(&tmp_path, value)?;
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Owner-only file write. Entries hold secrets.
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

/// In-process storage for tests and `--ephemeral` sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrips_and_removes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get(CREDENTIALS_KEY)?, None);
        store.set(CREDENTIALS_KEY, r#"{"access":"a","refresh":"r"}"#)?;
        assert_eq!(store.get(CREDENTIALS_KEY)?.as_deref(), Some(r#"{"access":"a","refresh":"r"}"#));

        // Overwrite with a shorter value leaves no trailing bytes.
        store.set(CREDENTIALS_KEY, "{}")?;
        assert_eq!(store.get(CREDENTIALS_KEY)?.as_deref(), Some("{}"));

        store.remove(CREDENTIALS_KEY)?;
        store.remove(CREDENTIALS_KEY)?;
        assert_eq!(store.get(CREDENTIALS_KEY)?, None);
        Ok(())
    }

    #[test]
    fn file_store_leaves_no_temp_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::new(dir.path());
        store.set(USER_KEY, "null")?;
        store.set(USER_KEY, r#"{"id":1}"#)?;

        let names: Vec<String> = std::fs::read_dir(dir.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["user.json".to_owned()]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn file_store_entries_are_owner_only() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let store = FileStore::new(dir.path());
        store.set(CREDENTIALS_KEY, "{}")?;
        let mode = std::fs::metadata(dir.path().join("credentials.json"))?.permissions().mode();
        assert_eq!(mode & 0o077, 0);
        Ok(())
    }

    #[test]
    fn memory_store_basic_ops() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("k", "v")?;
        assert_eq!(store.get("k")?.as_deref(), Some("v"));
        assert_eq!(store.len(), 1);
        store.remove("k")?;
        store.remove("k")?;
        assert!(store.is_empty());
        Ok(())
    }
}
