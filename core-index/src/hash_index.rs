//! # Hash Index
//!
//! Maps a shorthash to the remote items carrying that content. A `None`
//! member is a sentinel meaning "already handled" without a remote owner.
//!
//! ## Refresh cycle
//!
//! 1. Pull pending metadata from the [`PhotoIndex`] (not yet committed).
//! 2. Fetch the tail of every updated item through a bounded pool of
//!    concurrent requests.
//! 3. Re-run only the transient failures, up to the configured number of
//!    passes. Items still failing give [`IndexError::FetchIncomplete`]; a
//!    non-transient failure gives [`IndexError::Fetch`] at once.
//! 4. Merge every fetched shorthash, moving items whose content changed.
//! 5. Commit the pending metadata.
//!
//! A failed cycle merges nothing and commits nothing.

use bridge_traits::{PhotoService, RemotePhoto};
use core_runtime::PifConfig;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{IndexError, Result, StoreError};
use crate::photo_index::PhotoIndex;
use crate::progress::{report, Progress, PHASE_HASHES};
use crate::shorthash::{ImageFormat, ShortHash, TAIL_SIZE};
use crate::store::Store;

/// Members of one shorthash entry
pub type Members = Vec<Option<String>>;

/// Tail fetch tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Concurrent tail fetches
    pub concurrency: usize,
    /// Passes over the still-failing items
    pub attempts: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            attempts: 3,
        }
    }
}

impl From<&PifConfig> for FetchOptions {
    fn from(config: &PifConfig) -> Self {
        Self {
            concurrency: config.fetch_concurrency,
            attempts: config.fetch_attempts,
        }
    }
}

/// An updated remote item that can be fingerprinted
struct Candidate {
    photo: RemotePhoto,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl Candidate {
    fn from_photo(photo: &RemotePhoto) -> Option<Self> {
        let format = photo
            .original_format
            .as_deref()
            .and_then(ImageFormat::parse)?;

        Some(Self {
            photo: photo.clone(),
            format,
            width: photo.width?,
            height: photo.height?,
        })
    }
}

pub struct HashIndex {
    store: Store<ShortHash, Members>,
    photos: PhotoIndex,
    service: Arc<dyn PhotoService>,
    options: FetchOptions,
}

impl HashIndex {
    pub fn open(
        path: impl AsRef<Path>,
        photos: PhotoIndex,
        service: Arc<dyn PhotoService>,
        options: FetchOptions,
    ) -> Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
            photos,
            service,
            options,
        })
    }

    pub fn photos(&self) -> &PhotoIndex {
        &self.photos
    }

    pub fn get(&self, shorthash: &ShortHash) -> Option<&Members> {
        self.store.get(shorthash)
    }

    /// Whether any member, real or sentinel, claims `shorthash`.
    pub fn contains(&self, shorthash: &ShortHash) -> bool {
        self.store
            .get(shorthash)
            .is_some_and(|members| !members.is_empty())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ShortHash, &Members)> + '_ {
        self.store.iter()
    }

    /// Mark `shorthash` as handled. Returns false if it already was.
    pub fn ignore(&mut self, shorthash: ShortHash) -> bool {
        let members = self.store.entry(shorthash).or_default();
        if members.contains(&None) {
            return false;
        }
        members.push(None);
        true
    }

    /// Run one refresh cycle, returning the shorthashes that gained or lost
    /// members.
    #[instrument(skip_all)]
    pub async fn refresh(&mut self, progress: Option<&Progress<'_>>) -> Result<Vec<ShortHash>> {
        let mut pending = self.photos.pull(self.service.as_ref(), progress).await?;

        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        for photo in pending.updated() {
            match Candidate::from_photo(photo) {
                Some(candidate) => candidates.push(candidate),
                None => {
                    warn!(
                        id = %photo.id,
                        format = ?photo.original_format,
                        "Skipping remote item without a supported format or dimensions"
                    );
                    skipped.push(photo.id.clone());
                }
            }
        }

        let fetched = self.fetch_all(&candidates, progress).await?;

        for (id, shorthash) in &fetched {
            pending.record_size(id, shorthash.size());
        }

        let changed = self.merge(fetched, skipped);
        self.photos.commit(pending);

        info!(changed = changed.len(), entries = self.store.len(), "Refreshed hash index");
        Ok(changed)
    }

    async fn fetch_all(
        &self,
        candidates: &[Candidate],
        progress: Option<&Progress<'_>>,
    ) -> Result<BTreeMap<String, ShortHash>> {
        let total = candidates.len() as u64;
        let mut fetched = BTreeMap::new();
        let mut remaining: Vec<&Candidate> = candidates.iter().collect();
        let service = self.service.as_ref();

        report(progress, PHASE_HASHES, 0, total);

        for attempt in 1..=self.options.attempts.max(1) {
            if remaining.is_empty() {
                break;
            }
            debug!(attempt, items = remaining.len(), "Fetching remote tails");

            let outcomes: Vec<_> = stream::iter(std::mem::take(&mut remaining))
                .map(|candidate| async move {
                    let outcome = service.fetch_tail(&candidate.photo, TAIL_SIZE).await;
                    (candidate, outcome)
                })
                .buffer_unordered(self.options.concurrency.max(1))
                .collect()
                .await;

            for (candidate, outcome) in outcomes {
                match outcome {
                    Ok(tail) => {
                        let shorthash = ShortHash::new(
                            &tail.bytes,
                            candidate.format,
                            tail.total_size,
                            candidate.width,
                            candidate.height,
                        );
                        fetched.insert(candidate.photo.id.clone(), shorthash);
                        report(progress, PHASE_HASHES, fetched.len() as u64, total);
                    }
                    Err(err) if err.is_transient() => {
                        debug!(id = %candidate.photo.id, attempt, error = %err, "Tail fetch failed");
                        remaining.push(candidate);
                    }
                    Err(err) => {
                        return Err(IndexError::Fetch {
                            id: candidate.photo.id.clone(),
                            source: err,
                        });
                    }
                }
            }
        }

        if !remaining.is_empty() {
            let mut ids: Vec<String> = remaining.iter().map(|c| c.photo.id.clone()).collect();
            ids.sort();
            warn!(failed = ids.len(), "Giving up on remote tails");
            return Err(IndexError::FetchIncomplete { ids });
        }

        Ok(fetched)
    }

    /// Apply fetched shorthashes. Items in `dropped` no longer carry
    /// fingerprintable content and lose any entry they owned.
    fn merge(&mut self, fetched: BTreeMap<String, ShortHash>, dropped: Vec<String>) -> Vec<ShortHash> {
        let mut owners: HashMap<String, ShortHash> = HashMap::new();
        for (shorthash, members) in self.store.iter() {
            for id in members.iter().flatten() {
                owners.insert(id.clone(), shorthash.clone());
            }
        }

        let mut changed = BTreeSet::new();

        for id in dropped {
            if let Some(previous) = owners.remove(&id) {
                self.detach(&id, &previous);
                debug!(%id, from = %previous, "Remote content no longer indexable");
                changed.insert(previous);
            }
        }

        for (id, shorthash) in fetched {
            match owners.get(&id) {
                Some(previous) if *previous == shorthash => continue,
                Some(previous) => {
                    let previous = previous.clone();
                    self.detach(&id, &previous);
                    debug!(%id, from = %previous, to = %shorthash, "Remote content replaced");
                    changed.insert(previous);
                }
                None => {}
            }

            let members = self.store.entry(shorthash.clone()).or_default();
            if let Some(existing) = members.iter().flatten().find(|member| **member != id) {
                warn!(%shorthash, %id, %existing, "Shorthash collision between remote items");
            }
            members.push(Some(id.clone()));

            owners.insert(id, shorthash.clone());
            changed.insert(shorthash);
        }

        changed.into_iter().collect()
    }

    /// Remove `id` from the members of `shorthash`, dropping the entry once empty.
    fn detach(&mut self, id: &str, shorthash: &ShortHash) {
        let now_empty = match self.store.get_mut(shorthash) {
            Some(members) => {
                members.retain(|member| member.as_deref() != Some(id));
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.store.remove(shorthash);
        }
    }

    pub fn sync(&self) -> std::result::Result<(), StoreError> {
        self.store.sync()
    }

    /// Flush both this index and the metadata index it owns.
    pub fn close(self) -> std::result::Result<(), StoreError> {
        self.store.close()?;
        self.photos.close()
    }
}
