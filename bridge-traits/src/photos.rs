//! Remote Photo Service Abstraction
//!
//! The capability the core needs from a remote photo store: an incremental
//! listing of recently updated items, a ranged fetch of an item's trailing
//! bytes, and an upload. Wire protocol and authentication live in the
//! provider crates.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Progress callback for uploads: `(bytes_sent, bytes_total)`.
pub type UploadProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Metadata of a single remote item, as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePhoto {
    /// Remote item ID
    pub id: String,

    /// Format of the original upload (`jpg`, `png`, `gif`, ...)
    pub original_format: Option<String>,

    /// Secret needed to address the original content
    pub original_secret: Option<String>,

    /// Secret for the resized renditions
    pub secret: Option<String>,

    /// Routing: storage farm
    pub farm: Option<String>,

    /// Routing: storage server
    pub server: Option<String>,

    /// Width of the original
    pub width: Option<u32>,

    /// Height of the original
    pub height: Option<u32>,

    /// Content size in bytes, when the listing reports it. Otherwise the
    /// size is learned from the tail fetch.
    pub size: Option<u64>,

    /// Upload timestamp. A different value for the same ID means the content
    /// was replaced.
    pub date_upload: i64,

    /// Last-update timestamp (metadata or content)
    pub last_update: i64,

    /// Direct locator of the original content, when provided
    pub url: Option<String>,
}

/// One page of a recently-updated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPage {
    /// 1-based page number of this response
    pub page: u32,

    /// Total number of pages for the query
    pub pages: u32,

    pub photos: Vec<RemotePhoto>,
}

/// Trailing bytes of a remote item together with the item's total size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailBytes {
    pub bytes: Bytes,
    pub total_size: u64,
}

/// Remote photo store trait
///
/// # Errors
///
/// Implementations report transport failures as
/// [`BridgeError::Network`](crate::error::BridgeError::Network), unexpected
/// statuses as [`BridgeError::HttpStatus`](crate::error::BridgeError::HttpStatus)
/// and responses lacking the expected structure as
/// [`BridgeError::Protocol`](crate::error::BridgeError::Protocol).
#[async_trait]
pub trait PhotoService: Send + Sync {
    /// List items updated at or after `min_last_update`.
    ///
    /// `extras` names the optional fields the caller needs on each item.
    async fn list_recently_updated(
        &self,
        page: u32,
        min_last_update: i64,
        extras: &[&str],
    ) -> Result<PhotoPage>;

    /// Fetch the trailing `byte_count` bytes of an item's original content.
    ///
    /// A shorter item yields all of its bytes. Anything other than a partial
    /// content answer is an error.
    async fn fetch_tail(&self, photo: &RemotePhoto, byte_count: usize) -> Result<TailBytes>;

    /// Upload a local file, returning the new remote item ID.
    async fn upload(&self, path: &Path, progress: Option<UploadProgress<'_>>) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_photo_round_trips_through_json() {
        let photo = RemotePhoto {
            id: "123".to_string(),
            original_format: Some("jpg".to_string()),
            original_secret: Some("abc".to_string()),
            secret: Some("def".to_string()),
            farm: Some("1".to_string()),
            server: Some("42".to_string()),
            width: Some(640),
            height: Some(480),
            size: None,
            date_upload: 1_200_000_000,
            last_update: 1_200_000_100,
            url: None,
        };

        let json = serde_json::to_string(&photo).unwrap();
        let back: RemotePhoto = serde_json::from_str(&json).unwrap();
        assert_eq!(back, photo);
    }
}
