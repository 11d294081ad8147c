//! # Local File Index
//!
//! Caches the shorthash of local files keyed by canonical path. A cached
//! entry is trusted only while the file's modification time is unchanged;
//! otherwise the file is validated and re-hashed and the entry replaced.
//! Paths that are not valid UTF-8 cannot be persisted, so they are hashed on
//! every lookup and never cached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, Metadata};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{IndexError, Result, StoreError};
use crate::inspect::ImageInspector;
use crate::shorthash::{ShortHash, TAIL_SIZE};
use crate::store::Store;

/// Cached identity of one local file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub last_modified: DateTime<Utc>,
    pub shorthash: ShortHash,
}

pub struct FileIndex {
    store: Store<PathBuf, FileRecord>,
    inspector: Arc<dyn ImageInspector>,
}

impl FileIndex {
    pub fn open(path: impl AsRef<Path>, inspector: Arc<dyn ImageInspector>) -> Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
            inspector,
        })
    }

    /// Shorthash of the file at `path`.
    ///
    /// Returns the cached value when the modification time matches. Otherwise
    /// validates and reads the file, then refreshes the cache. A file that
    /// fails validation loses any cached entry.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn lookup(&mut self, path: &Path) -> Result<ShortHash> {
        let canonical = fs::canonicalize(path).map_err(|e| IndexError::invalid_file(path, e))?;
        let metadata = fs::metadata(&canonical).map_err(|e| IndexError::invalid_file(path, e))?;
        if !metadata.is_file() {
            return Err(IndexError::invalid_file(path, "not a regular file"));
        }

        let modified: DateTime<Utc> = metadata
            .modified()
            .map_err(|e| IndexError::invalid_file(path, e))?
            .into();

        if let Some(record) = self.store.get(&canonical) {
            if record.last_modified == modified {
                return Ok(record.shorthash.clone());
            }
            debug!("Cached shorthash is stale");
        }

        match self.compute(&canonical, &metadata) {
            Ok(shorthash) if canonical.to_str().is_none() => {
                debug!(%shorthash, "Computed shorthash for a non UTF-8 path, not cached");
                Ok(shorthash)
            }
            Ok(shorthash) => {
                debug!(%shorthash, "Computed shorthash");
                self.store.insert(
                    canonical,
                    FileRecord {
                        last_modified: modified,
                        shorthash: shorthash.clone(),
                    },
                );
                Ok(shorthash)
            }
            Err(err) => {
                self.store.remove(&canonical);
                Err(err)
            }
        }
    }

    fn compute(&self, path: &Path, metadata: &Metadata) -> Result<ShortHash> {
        let info = self.inspector.inspect(path)?;
        let size = metadata.len();
        let tail = read_tail(path, size).map_err(|e| IndexError::invalid_file(path, e))?;

        Ok(ShortHash::new(&tail, info.format, size, info.width, info.height))
    }

    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.store.get(&path.to_path_buf())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn sync(&self) -> std::result::Result<(), StoreError> {
        self.store.sync()
    }

    pub fn close(self) -> std::result::Result<(), StoreError> {
        self.store.close()
    }
}

fn read_tail(path: &Path, size: u64) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(size.saturating_sub(TAIL_SIZE as u64)))?;

    let mut tail = Vec::with_capacity(TAIL_SIZE);
    file.take(TAIL_SIZE as u64).read_to_end(&mut tail)?;
    Ok(tail)
}
