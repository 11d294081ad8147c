//! # Flickr Provider
//!
//! Implements the `PhotoService` trait for the Flickr REST API.
//!
//! ## Overview
//!
//! This module provides:
//! - Credential check through `flickr.test.login`
//! - Incremental listing with `flickr.photos.recentlyUpdated`
//! - Ranged fetch of the trailing bytes of original photos
//! - Multipart upload of local files

pub mod connector;
pub mod error;
pub mod types;

pub use connector::FlickrConnector;
pub use error::{FlickrError, Result};
