//! Flickr API response types
//!
//! Data structures for deserializing Flickr REST responses requested with
//! `format=json&nojsoncallback=1`. Flickr is inconsistent about quoting
//! numbers, so numeric fields accept both forms.

use bridge_traits::RemotePhoto;
use serde::{Deserialize, Deserializer};

use crate::error::{FlickrError, Result};

/// A JSON value that may be a number or a string holding one
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Flexible {
    Number(i64),
    Text(String),
}

impl Flexible {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Flexible::Number(n) => Some(*n),
            Flexible::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Flexible::Number(n) => n.to_string(),
            Flexible::Text(s) => s,
        }
    }
}

fn flexible_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let value = Flexible::deserialize(deserializer)?;
    value
        .as_i64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| serde::de::Error::custom(format!("expected a page number, got {:?}", value)))
}

/// Envelope common to every REST response
#[derive(Debug, Deserialize)]
pub struct Status {
    pub stat: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Status {
    /// Turn a `stat: fail` envelope into an error.
    pub fn check(&self) -> Result<()> {
        if self.stat == "ok" {
            return Ok(());
        }
        Err(FlickrError::ApiFailure {
            code: self.code.unwrap_or(-1),
            message: self
                .message
                .clone()
                .unwrap_or_else(|| format!("stat={}", self.stat)),
        })
    }
}

/// `flickr.photos.recentlyUpdated` response
#[derive(Debug, Deserialize)]
pub struct RecentlyUpdatedResponse {
    pub photos: Option<PhotosContainer>,
}

#[derive(Debug, Deserialize)]
pub struct PhotosContainer {
    #[serde(deserialize_with = "flexible_u32")]
    pub page: u32,

    #[serde(deserialize_with = "flexible_u32")]
    pub pages: u32,

    #[serde(default)]
    pub photo: Vec<FlickrPhoto>,
}

/// A photo as listed with the extras the index requests
#[derive(Debug, Clone, Deserialize)]
pub struct FlickrPhoto {
    pub id: String,

    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default)]
    pub server: Option<String>,

    #[serde(default)]
    pub farm: Option<Flexible>,

    #[serde(default)]
    pub dateupload: Option<Flexible>,

    #[serde(default)]
    pub lastupdate: Option<Flexible>,

    #[serde(default)]
    pub o_width: Option<Flexible>,

    #[serde(default)]
    pub o_height: Option<Flexible>,

    #[serde(default)]
    pub originalsecret: Option<String>,

    #[serde(default)]
    pub originalformat: Option<String>,

    #[serde(default)]
    pub url_o: Option<String>,
}

impl FlickrPhoto {
    /// Convert to the provider-neutral record.
    ///
    /// The upload and update timestamps are mandatory; everything else may be
    /// missing and is left for the index to judge.
    pub fn into_remote(self) -> Result<RemotePhoto> {
        let date_upload = self
            .dateupload
            .as_ref()
            .and_then(Flexible::as_i64)
            .ok_or_else(|| FlickrError::Malformed(format!("photo {} has no dateupload", self.id)))?;
        let last_update = self
            .lastupdate
            .as_ref()
            .and_then(Flexible::as_i64)
            .ok_or_else(|| FlickrError::Malformed(format!("photo {} has no lastupdate", self.id)))?;

        let dimension = |value: &Option<Flexible>| {
            value
                .as_ref()
                .and_then(Flexible::as_i64)
                .and_then(|n| u32::try_from(n).ok())
        };

        Ok(RemotePhoto {
            width: dimension(&self.o_width),
            height: dimension(&self.o_height),
            id: self.id,
            original_format: self.originalformat,
            original_secret: self.originalsecret,
            secret: self.secret,
            farm: self.farm.map(Flexible::into_string),
            server: self.server,
            size: None,
            date_upload,
            last_update,
            url: self.url_o,
        })
    }
}

/// `flickr.test.login` response
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub user: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<Content>,
}

/// Flickr's `{"_content": "..."}` wrapper
#[derive(Debug, Deserialize)]
pub struct Content {
    #[serde(rename = "_content")]
    pub content: String,
}
