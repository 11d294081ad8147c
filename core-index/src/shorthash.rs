//! # Shorthash
//!
//! Content identity of an image computed without reading the whole file:
//! a SHA-512 digest of the trailing [`TAIL_SIZE`] bytes combined with the
//! image format, total size and dimensions.
//!
//! Two images agreeing on all five components are treated as the same
//! content. The identity is probabilistic; collisions are detected by the
//! hash index, not prevented here.
//!
//! The string form is `{digest}:{format}:{size}:{width}:{height}` and is
//! what gets persisted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};
use std::fmt;
use std::str::FromStr;

use crate::error::{IndexError, Result};

/// Number of trailing bytes that contribute to the digest.
pub const TAIL_SIZE: usize = 512;

/// Image formats that can be fingerprinted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Gif,
    Jpg,
    Png,
}

impl ImageFormat {
    /// Case-insensitive parse; `jpeg` and `jpg` are the same format.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gif" => Some(ImageFormat::Gif),
            "jpg" | "jpeg" => Some(ImageFormat::Jpg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Gif => "gif",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    /// File extensions recognized for this format
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImageFormat::Gif => &["gif"],
            ImageFormat::Jpg => &["jpg", "jpeg"],
            ImageFormat::Png => &["png"],
        }
    }

    /// Returns true if `ext` names a supported image format.
    pub fn is_supported_extension(ext: &str) -> bool {
        Self::parse(ext).is_some()
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| IndexError::UnsupportedFormat(s.to_string()))
    }
}

/// Composite content identity of an image
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortHash {
    digest: String,
    format: ImageFormat,
    size: u64,
    width: u32,
    height: u32,
}

impl ShortHash {
    /// Compute the identity of an image.
    ///
    /// Only the last [`TAIL_SIZE`] bytes of `tail` are hashed. A shorter slice
    /// is hashed whole.
    pub fn new(tail: &[u8], format: ImageFormat, size: u64, width: u32, height: u32) -> Self {
        let start = tail.len().saturating_sub(TAIL_SIZE);
        let digest = Sha512::digest(&tail[start..]);

        Self {
            digest: to_hex(&digest),
            format,
            size,
            width,
            height,
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Compute a shorthash from a format name.
///
/// Fails with [`IndexError::UnsupportedFormat`] when `format` is not one of
/// gif, jpg/jpeg or png (case-insensitive).
pub fn shorthash(tail: &[u8], format: &str, size: u64, width: u32, height: u32) -> Result<ShortHash> {
    let format = format.parse::<ImageFormat>()?;
    Ok(ShortHash::new(tail, format, size, width, height))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl fmt::Display for ShortHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.digest, self.format, self.size, self.width, self.height
        )
    }
}

impl FromStr for ShortHash {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || IndexError::UnsupportedFormat(format!("malformed shorthash '{}'", s));

        let parts: Vec<&str> = s.split(':').collect();
        let [digest, format, size, width, height] = parts.as_slice() else {
            return Err(malformed());
        };

        if digest.len() != 128 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(malformed());
        }

        Ok(Self {
            digest: digest.to_ascii_lowercase(),
            format: format.parse()?,
            size: size.parse().map_err(|_| malformed())?,
            width: width.parse().map_err(|_| malformed())?,
            height: height.parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for ShortHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShortHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
