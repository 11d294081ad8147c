//! # Sync Coordinator
//!
//! Ties the three indexes together and answers the questions the front ends
//! ask: is this local file already in the remote store, mark it as handled,
//! upload it.
//!
//! ## Workflow
//!
//! 1. Open the file, metadata and hash stores from the configuration directory
//! 2. Refresh the remote metadata and hash indexes (unless suppressed)
//! 3. Classify, ignore or upload local files
//! 4. Flush all stores with [`SyncCoordinator::sync`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_index::{Classification, ImageCrateInspector, SyncCoordinator};
//! use std::sync::Arc;
//!
//! let mut coordinator =
//!     SyncCoordinator::open(&config, service, Arc::new(ImageCrateInspector), None).await?;
//!
//! if coordinator.classify(path) == Classification::New {
//!     coordinator.upload(path, None).await?;
//! }
//! coordinator.sync()?;
//! ```

use bridge_traits::{PhotoService, UploadProgress};
use core_runtime::PifConfig;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, StoreError};
use crate::file_index::FileIndex;
use crate::hash_index::{FetchOptions, HashIndex};
use crate::inspect::ImageInspector;
use crate::photo_index::PhotoIndex;
use crate::progress::{Progress, PHASE_UPLOAD};
use crate::shorthash::ShortHash;

/// Where a local file stands relative to the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Not present remotely
    New,
    /// Present remotely or marked as handled
    Old,
    /// Not a readable image of a supported format
    Invalid,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::New => "new",
            Classification::Old => "old",
            Classification::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct SyncCoordinator {
    files: FileIndex,
    hashes: HashIndex,
    service: Arc<dyn PhotoService>,
}

impl SyncCoordinator {
    /// Open the indexes under `config.config_dir`, creating the directory if
    /// needed, and refresh them unless `config.skip_refresh` is set.
    pub async fn open(
        config: &PifConfig,
        service: Arc<dyn PhotoService>,
        inspector: Arc<dyn ImageInspector>,
        progress: Option<&Progress<'_>>,
    ) -> Result<Self> {
        fs::create_dir_all(&config.config_dir).map_err(|source| StoreError::Io {
            path: config.config_dir.clone(),
            source,
        })?;

        let files = FileIndex::open(config.file_index_path(), inspector)?;
        let photos = PhotoIndex::open(config.photo_index_path())?;
        let hashes = HashIndex::open(
            config.hash_index_path(),
            photos,
            Arc::clone(&service),
            FetchOptions::from(config),
        )?;

        info!(
            config_dir = %config.config_dir.display(),
            files = files.len(),
            photos = hashes.photos().len(),
            hashes = hashes.len(),
            "Opened indexes"
        );

        let mut coordinator = Self {
            files,
            hashes,
            service,
        };

        if config.skip_refresh {
            debug!("Skipping remote refresh");
        } else {
            coordinator.refresh(progress).await?;
        }

        Ok(coordinator)
    }

    /// Pull remote changes into the metadata and hash indexes.
    pub async fn refresh(&mut self, progress: Option<&Progress<'_>>) -> Result<Vec<ShortHash>> {
        self.hashes.refresh(progress).await
    }

    pub fn classify(&mut self, path: &Path) -> Classification {
        match self.files.lookup(path) {
            Ok(shorthash) if self.hashes.contains(&shorthash) => Classification::Old,
            Ok(_) => Classification::New,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Skipping invalid file");
                Classification::Invalid
            }
        }
    }

    /// Mark a local file as already handled.
    pub fn ignore(&mut self, path: &Path) -> Result<ShortHash> {
        let shorthash = self.files.lookup(path)?;
        if self.hashes.ignore(shorthash.clone()) {
            debug!(path = %path.display(), %shorthash, "Marked as handled");
        }
        Ok(shorthash)
    }

    /// Upload a local file and mark its content as handled.
    #[instrument(skip(self, progress), fields(path = %path.display()))]
    pub async fn upload(&mut self, path: &Path, progress: Option<&Progress<'_>>) -> Result<String> {
        let shorthash = self.files.lookup(path)?;

        let forward = progress.map(|callback| {
            move |sent: u64, total: u64| callback(PHASE_UPLOAD, (sent, total))
        });
        let forward: Option<UploadProgress<'_>> =
            forward.as_ref().map(|f| f as UploadProgress<'_>);

        let id = self.service.upload(path, forward).await?;
        self.hashes.ignore(shorthash);

        info!(id = %id, "Uploaded");
        Ok(id)
    }

    /// Flush every store: hashes, then metadata, then files.
    pub fn sync(&self) -> Result<()> {
        self.hashes.sync()?;
        self.hashes.photos().sync()?;
        self.files.sync()?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.sync()
    }

    pub fn files(&self) -> &FileIndex {
        &self.files
    }

    pub fn hashes(&self) -> &HashIndex {
        &self.hashes
    }
}
