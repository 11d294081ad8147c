//! Scripted remote photo service for unit tests.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BridgeError, PhotoPage, PhotoService, RemotePhoto, TailBytes, UploadProgress};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::shorthash::{ImageFormat, ShortHash};

pub(crate) const WIDTH: u32 = 10;
pub(crate) const HEIGHT: u32 = 10;

#[derive(Default)]
struct State {
    photos: BTreeMap<String, RemotePhoto>,
    contents: HashMap<String, Vec<u8>>,
    transient_failures: HashMap<String, u32>,
    fatal: HashSet<String>,
    malformed: bool,
    list_calls: Vec<(u32, i64)>,
    fetch_calls: HashMap<String, u32>,
    uploads: Vec<PathBuf>,
}

pub(crate) struct MockPhotoService {
    page_size: usize,
    state: Mutex<State>,
}

impl MockPhotoService {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            page_size,
            state: Mutex::new(State::default()),
        }
    }

    /// Add or replace a remote JPEG item.
    pub(crate) fn put(&self, id: &str, content: &[u8], date_upload: i64, last_update: i64) {
        let photo = RemotePhoto {
            id: id.to_string(),
            original_format: Some("jpg".to_string()),
            original_secret: Some(format!("os{}", id)),
            secret: Some(format!("s{}", id)),
            farm: Some("1".to_string()),
            server: Some("100".to_string()),
            width: Some(WIDTH),
            height: Some(HEIGHT),
            size: None,
            date_upload,
            last_update,
            url: None,
        };
        self.put_photo(photo, content);
    }

    pub(crate) fn put_photo(&self, photo: RemotePhoto, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.contents.insert(photo.id.clone(), content.to_vec());
        state.photos.insert(photo.id.clone(), photo);
    }

    /// Fail the next `times` fetches of `id` with a transient error.
    pub(crate) fn fail_transiently(&self, id: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .transient_failures
            .insert(id.to_string(), times);
    }

    pub(crate) fn fail_fatally(&self, id: &str) {
        self.state.lock().unwrap().fatal.insert(id.to_string());
    }

    pub(crate) fn set_malformed(&self, malformed: bool) {
        self.state.lock().unwrap().malformed = malformed;
    }

    pub(crate) fn list_calls(&self) -> Vec<(u32, i64)> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub(crate) fn fetch_calls(&self, id: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .fetch_calls
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn uploads(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().uploads.clone()
    }
}

/// Shorthash the index should compute for content served by the mock.
pub(crate) fn expected_hash(content: &[u8]) -> ShortHash {
    ShortHash::new(content, ImageFormat::Jpg, content.len() as u64, WIDTH, HEIGHT)
}

#[async_trait]
impl PhotoService for MockPhotoService {
    async fn list_recently_updated(
        &self,
        page: u32,
        min_last_update: i64,
        _extras: &[&str],
    ) -> BridgeResult<PhotoPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push((page, min_last_update));

        if state.malformed {
            return Err(BridgeError::Protocol("response has no photos".to_string()));
        }

        let matching: Vec<RemotePhoto> = state
            .photos
            .values()
            .filter(|p| p.last_update >= min_last_update)
            .cloned()
            .collect();
        let pages = matching.len().div_ceil(self.page_size) as u32;
        let photos = matching
            .into_iter()
            .skip((page as usize - 1) * self.page_size)
            .take(self.page_size)
            .collect();

        Ok(PhotoPage {
            page,
            pages,
            photos,
        })
    }

    async fn fetch_tail(&self, photo: &RemotePhoto, byte_count: usize) -> BridgeResult<TailBytes> {
        let mut state = self.state.lock().unwrap();
        *state.fetch_calls.entry(photo.id.clone()).or_default() += 1;

        if state.fatal.contains(&photo.id) {
            return Err(BridgeError::HttpStatus {
                status: 403,
                message: "forbidden".to_string(),
            });
        }
        if let Some(remaining) = state.transient_failures.get_mut(&photo.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BridgeError::Network("connection reset".to_string()));
            }
        }

        let content = state
            .contents
            .get(&photo.id)
            .ok_or_else(|| BridgeError::HttpStatus {
                status: 404,
                message: "not found".to_string(),
            })?;
        let start = content.len().saturating_sub(byte_count);

        Ok(TailBytes {
            bytes: content[start..].to_vec().into(),
            total_size: content.len() as u64,
        })
    }

    async fn upload(&self, path: &Path, progress: Option<UploadProgress<'_>>) -> BridgeResult<String> {
        let mut state = self.state.lock().unwrap();
        state.uploads.push(path.to_path_buf());
        if let Some(progress) = progress {
            progress(0, 100);
            progress(100, 100);
        }
        Ok(format!("uploaded-{}", state.uploads.len()))
    }
}
