//! # Remote Metadata Index
//!
//! Mirrors the metadata of remote items, keyed by remote ID, and pulls
//! incremental updates from a [`PhotoService`].
//!
//! ## Watermark
//!
//! The watermark is the highest `last_update` among stored records (0 when
//! empty). A refresh lists items updated at or after `watermark + 1`. The
//! watermark is derived from the records themselves, so it cannot drift from
//! what has actually been merged.
//!
//! ## Two phases
//!
//! [`PhotoIndex::pull`] performs every listing request without touching the
//! index and returns a [`PendingUpdate`]. [`PhotoIndex::commit`] merges it.
//! Callers that do more work per update (fingerprinting) commit only after
//! that work succeeds; a failed cycle then leaves the watermark where it was
//! and the next cycle sees the same items again.

use bridge_traits::{PhotoService, RemotePhoto};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::{Result, StoreError};
use crate::progress::{report, Progress, PHASE_UPDATE};
use crate::store::Store;

/// Optional fields requested on every listed item
pub const PHOTO_EXTRAS: &[&str] = &[
    "date_upload",
    "last_update",
    "o_dims",
    "original_format",
    "url_o",
];

/// Result of listing, not yet merged into the index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingUpdate {
    photos: BTreeMap<String, RemotePhoto>,
    updated: BTreeSet<String>,
}

impl PendingUpdate {
    /// IDs that are new or whose content was replaced, in ID order
    pub fn updated(&self) -> impl Iterator<Item = &RemotePhoto> + '_ {
        self.updated.iter().filter_map(|id| self.photos.get(id))
    }

    pub fn updated_ids(&self) -> Vec<String> {
        self.updated.iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&RemotePhoto> {
        self.photos.get(id)
    }

    /// Number of listed records, updated or not
    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Fill in a size learned after listing.
    pub fn record_size(&mut self, id: &str, size: u64) {
        if let Some(photo) = self.photos.get_mut(id) {
            photo.size = Some(size);
        }
    }
}

pub struct PhotoIndex {
    store: Store<String, RemotePhoto>,
}

impl PhotoIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
        })
    }

    /// Highest `last_update` merged so far, 0 when empty
    pub fn watermark(&self) -> i64 {
        self.store
            .values()
            .map(|photo| photo.last_update)
            .max()
            .unwrap_or(0)
    }

    pub fn get(&self, id: &str) -> Option<&RemotePhoto> {
        self.store.get(&id.to_string())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemotePhoto> + '_ {
        self.store.values()
    }

    /// List every page of items updated since the watermark.
    ///
    /// An item counts as updated when it is unknown or its upload date
    /// differs from the stored record. Metadata-only edits are listed and
    /// merged but not reported as updated.
    #[instrument(skip_all)]
    pub async fn pull(
        &self,
        service: &dyn PhotoService,
        progress: Option<&Progress<'_>>,
    ) -> Result<PendingUpdate> {
        let min_last_update = self.watermark() + 1;
        let mut pending = PendingUpdate::default();
        let mut page = 1u32;

        loop {
            let response = service
                .list_recently_updated(page, min_last_update, PHOTO_EXTRAS)
                .await?;

            debug!(
                page,
                pages = response.pages,
                items = response.photos.len(),
                min_last_update,
                "Listed recently updated page"
            );

            for photo in response.photos {
                let replaced = match self.store.get(&photo.id) {
                    Some(stored) => stored.date_upload != photo.date_upload,
                    None => true,
                };
                if replaced {
                    pending.updated.insert(photo.id.clone());
                } else {
                    pending.updated.remove(&photo.id);
                }
                pending.photos.insert(photo.id.clone(), photo);
            }

            report(progress, PHASE_UPDATE, page as u64, response.pages as u64);

            if page >= response.pages {
                break;
            }
            page += 1;
        }

        Ok(pending)
    }

    /// Merge a pulled update, returning the updated IDs.
    pub fn commit(&mut self, pending: PendingUpdate) -> Vec<String> {
        let updated = pending.updated_ids();
        let merged = pending.photos.len();

        for (id, photo) in pending.photos {
            self.store.insert(id, photo);
        }

        info!(
            merged,
            updated = updated.len(),
            watermark = self.watermark(),
            "Merged remote metadata"
        );
        updated
    }

    /// Pull and commit in one step.
    pub async fn refresh(
        &mut self,
        service: &dyn PhotoService,
        progress: Option<&Progress<'_>>,
    ) -> Result<Vec<String>> {
        let pending = self.pull(service, progress).await?;
        Ok(self.commit(pending))
    }

    pub fn sync(&self) -> std::result::Result<(), StoreError> {
        self.store.sync()
    }

    pub fn close(self) -> std::result::Result<(), StoreError> {
        self.store.close()
    }
}
