//! # Durable Store
//!
//! An ordered in-memory map with explicit load and flush. Every index owns
//! exactly one `Store`; mutating it has no persistence side effects until
//! [`Store::sync`] is called.
//!
//! ## On-disk format
//!
//! ```json
//! {"version":1,"entries":[[key, value], ...]}
//! ```
//!
//! Entries are written as pairs so keys do not need a string form.
//!
//! ## Atomicity
//!
//! `sync` serializes the whole map into a temporary file created in the
//! target's directory and renames it over the target. Readers see either the
//! old file or the new one. A failed serialization removes the temporary file
//! and leaves the target untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;

const STORE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, K, V> {
    version: u32,
    entries: Vec<(&'a K, &'a V)>,
}

#[derive(Deserialize)]
struct Envelope<K, V> {
    version: u32,
    entries: Vec<(K, V)>,
}

/// Persistent ordered map backed by a single JSON file
#[derive(Debug)]
pub struct Store<K, V> {
    path: PathBuf,
    entries: BTreeMap<K, V>,
}

impl<K, V> Store<K, V>
where
    K: Ord + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    /// Load the store at `path`.
    ///
    /// A missing file yields an empty store. An existing file that cannot be
    /// read or parsed is an error; nothing is silently reset.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Store file missing, starting empty");
                return Ok(Self {
                    path,
                    entries: BTreeMap::new(),
                });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let envelope: Envelope<K, V> = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(source) => return Err(StoreError::Corrupt { path, source }),
        };

        if envelope.version != STORE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path,
                version: envelope.version,
            });
        }

        let entries: BTreeMap<K, V> = envelope.entries.into_iter().collect();
        debug!(path = %path.display(), entries = entries.len(), "Loaded store");

        Ok(Self { path, entries })
    }

    /// Atomically write the current contents to disk.
    pub fn sync(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;

        {
            let envelope = EnvelopeRef {
                version: STORE_VERSION,
                entries: self.entries.iter().collect(),
            };
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &envelope).map_err(|source| {
                StoreError::Serialize {
                    path: self.path.clone(),
                    source,
                }
            })?;
            writer.flush().map_err(io_err)?;
        }

        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Synced store");
        Ok(())
    }

    /// Flush and release the store.
    pub fn close(self) -> Result<(), StoreError> {
        self.sync()
    }
}

impl<K: Ord, V> Store<K, V> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entry(&mut self, key: K) -> btree_map::Entry<'_, K, V> {
        self.entries.entry(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, V> {
        self.entries.iter()
    }

    pub fn values(&self) -> btree_map::Values<'_, K, V> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a Store<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = btree_map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
