//! Local store adapters: in-memory and file-backed.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use cap_std::{ambient_authority, fs::Dir};

use crate::domain::ports::{LocalStore, LocalStoreError};

/// In-memory key/value store.
///
/// Backs tests and short-lived sessions where nothing should touch disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), LocalStoreError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// File-backed key/value store rooted in one data directory.
///
/// Each key becomes one file; writes stage to a temporary name and rename
/// into place so a crash never leaves a half-written value behind.
#[derive(Debug)]
pub struct FileStore {
    dir: Dir,
    // Kept for diagnostics only; all I/O goes through `dir`.
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, LocalStoreError> {
        let root = root.as_ref().to_path_buf();
        Dir::create_ambient_dir_all(&root, ambient_authority())
            .map_err(|error| Self::io_error(&root, &error))?;
        let dir = Dir::open_ambient_dir(&root, ambient_authority())
            .map_err(|error| Self::io_error(&root, &error))?;
        Ok(Self { dir, root })
    }

    fn io_error(path: &Path, error: &io::Error) -> LocalStoreError {
        LocalStoreError::io(format!("{}: {error}", path.display()))
    }

    fn file_name(key: &str) -> String {
        // Keys are dotted identifiers; keep anything path-like out of them.
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{safe}.json")
    }
}

impl LocalStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        match self.dir.read_to_string(Self::file_name(key)) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(Self::io_error(&self.root, &error)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let final_name = Self::file_name(key);
        let staged_name = format!(".tmp-{final_name}");
        self.dir
            .write(&staged_name, value.as_bytes())
            .map_err(|error| Self::io_error(&self.root, &error))?;
        self.dir
            .rename(&staged_name, &self.dir, &final_name)
            .map_err(|error| Self::io_error(&self.root, &error))
    }

    fn remove_item(&self, key: &str) -> Result<(), LocalStoreError> {
        match self.dir.remove_file(Self::file_name(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(Self::io_error(&self.root, &error)),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn memory_store_round_trips_values() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("atas.session").expect("read works"), None);
        store.set_item("atas.session", "v1").expect("write works");
        assert_eq!(
            store.get_item("atas.session").expect("read works"),
            Some("v1".to_owned())
        );
        store.remove_item("atas.session").expect("remove works");
        store
            .remove_item("atas.session")
            .expect("removing an absent key succeeds");
        assert_eq!(store.get_item("atas.session").expect("read works"), None);
    }

    #[rstest]
    fn file_store_round_trips_values() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = FileStore::open(tmp.path()).expect("store opens");

        store.set_item("atas.users", "[]").expect("write works");
        store.set_item("atas.users", "[1]").expect("overwrite works");
        assert_eq!(
            store.get_item("atas.users").expect("read works"),
            Some("[1]".to_owned())
        );

        store.remove_item("atas.users").expect("remove works");
        assert_eq!(store.get_item("atas.users").expect("read works"), None);
        store
            .remove_item("atas.users")
            .expect("removing an absent key succeeds");
    }

    #[rstest]
    fn file_store_survives_reopening() {
        let tmp = tempfile::tempdir().expect("temp dir");
        {
            let store = FileStore::open(tmp.path()).expect("store opens");
            store.set_item("atas.session", "{}").expect("write works");
        }
        let reopened = FileStore::open(tmp.path()).expect("store reopens");
        assert_eq!(
            reopened.get_item("atas.session").expect("read works"),
            Some("{}".to_owned())
        );
    }

    #[rstest]
    fn keys_with_separators_never_escape_the_root() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = FileStore::open(tmp.path()).expect("store opens");
        store
            .set_item("../escape/attempt", "x")
            .expect("write works");
        assert_eq!(
            store.get_item("../escape/attempt").expect("read works"),
            Some("x".to_owned())
        );
        assert!(!tmp.path().parent().expect("parent exists").join("escape").exists());
    }
}
