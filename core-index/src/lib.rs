//! # Photo Index Core
//!
//! Decides which local images are already present in a remote photo store
//! without downloading remote content.
//!
//! ## Overview
//!
//! Every image is identified by a [`ShortHash`]: a digest of its trailing
//! bytes plus format, size and dimensions. Three persistent indexes keep
//! those identities current:
//!
//! - **File index** (`file_index`): local path to shorthash, trusted while the
//!   modification time is unchanged
//! - **Photo index** (`photo_index`): remote ID to metadata, pulled
//!   incrementally past a watermark
//! - **Hash index** (`hash_index`): shorthash to remote IDs, built by fetching
//!   remote tails through a bounded pool of requests
//!
//! The [`SyncCoordinator`] composes them to classify local files as new, old
//! or invalid, and to mark or upload them.
//!
//! ## Persistence
//!
//! Each index owns one [`Store`], loaded whole at open and written atomically
//! on sync.

pub mod coordinator;
pub mod error;
pub mod file_index;
pub mod hash_index;
pub mod inspect;
pub mod photo_index;
pub mod progress;
pub mod shorthash;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Classification, SyncCoordinator};
pub use error::{IndexError, Result, StoreError};
pub use file_index::{FileIndex, FileRecord};
pub use hash_index::{FetchOptions, HashIndex, Members};
pub use inspect::{ImageCrateInspector, ImageInfo, ImageInspector};
pub use photo_index::{PendingUpdate, PhotoIndex, PHOTO_EXTRAS};
pub use progress::{Progress, PHASE_HASHES, PHASE_UPDATE, PHASE_UPLOAD};
pub use shorthash::{shorthash, ImageFormat, ShortHash, TAIL_SIZE};
pub use store::Store;
