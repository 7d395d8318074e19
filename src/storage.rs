//! Local persistence for the auth token and per-user UI preferences.
//!
//! [`KeyValueStore`] is the raw string store; [`LocalStorage`] layers the
//! application keys on top.  Storage failures never propagate out of
//! [`LocalStorage`]: they are logged and reads fall back to defaults.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{from_reader, to_writer_pretty};

use crate::error::{Error, Result};

/// Key under which the auth token is stored.
pub const AUTH_TOKEN_KEY: &str = "dense_ai_auth_token";

/// Base key for the per-user sidebar preference.
pub const SIDEBAR_OPEN_STATUS_BASE_KEY: &str = "denseAiSidebarOpenStatusUser";

/// A string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`.  Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// An in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::io_message("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// A store backed by a single JSON object on disk.
///
/// The whole file is rewritten on every mutation.  A missing file reads as
/// an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store persisted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(Error::io("failed to open preferences file", err)),
        };
        let reader = BufReader::new(file);
        from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse preferences file", Some(Box::new(err)))
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|err| Error::io("failed to create preferences directory", err))?;
        }
        let file = File::create(&self.path)
            .map_err(|err| Error::io("failed to create preferences file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, entries).map_err(|err| {
            Error::serialization("failed to write preferences file", Some(Box::new(err)))
        })
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::io_message("file store lock poisoned"))?;
        let mut entries = self.load()?;
        f(&mut entries);
        self.save(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::io_message("file store lock poisoned"))?;
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }
}

/// Application-level view over a [`KeyValueStore`].
#[derive(Clone)]
pub struct LocalStorage {
    store: Arc<dyn KeyValueStore>,
}

impl LocalStorage {
    /// Wraps a store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// A storage backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Saves the auth token; `None` removes it.
    pub fn save_auth_token(&self, token: Option<&str>) {
        let result = match token {
            Some(token) => self.store.set(AUTH_TOKEN_KEY, token),
            None => self.store.remove(AUTH_TOKEN_KEY),
        };
        if let Err(err) = result {
            tracing::error!(error = %err, "error saving auth token");
        }
    }

    /// Loads the auth token, if one is stored.
    pub fn load_auth_token(&self) -> Option<String> {
        match self.store.get(AUTH_TOKEN_KEY) {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(error = %err, "error loading auth token");
                None
            }
        }
    }

    /// Removes the auth token.
    pub fn remove_auth_token(&self) {
        if let Err(err) = self.store.remove(AUTH_TOKEN_KEY) {
            tracing::error!(error = %err, "error removing auth token");
        }
    }

    /// Saves whether the sidebar is open for `user_id`.  Without a user this is a no-op.
    pub fn save_sidebar_open_for_user(&self, is_open: bool, user_id: Option<&str>) {
        let Some(key) = user_specific_key(SIDEBAR_OPEN_STATUS_BASE_KEY, user_id) else {
            return;
        };
        let value = if is_open { "true" } else { "false" };
        if let Err(err) = self.store.set(&key, value) {
            tracing::error!(error = %err, user_id, "error saving sidebar status");
        }
    }

    /// Loads whether the sidebar is open for `user_id`, defaulting to open.
    pub fn load_sidebar_open_for_user(&self, user_id: Option<&str>) -> bool {
        let Some(key) = user_specific_key(SIDEBAR_OPEN_STATUS_BASE_KEY, user_id) else {
            return true;
        };
        match self.store.get(&key) {
            Ok(Some(stored)) => match serde_json::from_str::<bool>(&stored) {
                Ok(is_open) => is_open,
                Err(err) => {
                    tracing::error!(error = %err, user_id, "error parsing sidebar status");
                    true
                }
            },
            Ok(None) => true,
            Err(err) => {
                tracing::error!(error = %err, user_id, "error loading sidebar status");
                true
            }
        }
    }
}

fn user_specific_key(base_key: &str, user_id: Option<&str>) -> Option<String> {
    user_id
        .filter(|id| !id.is_empty())
        .map(|id| format!("{base_key}_{id}"))
}
