//! # Core Authentication Types
//!
//! Credentials and the authentication error class shared by providers.
//!
//! Providers receive an [`ApiCredentials`] value when they connect and report
//! handshake failures as [`AuthError`]. A failed handshake is fatal to the run.

pub mod error;
pub mod types;

pub use error::{AuthError, Result};
pub use types::{ApiCredentials, ACCESS_TOKEN_VAR, API_KEY_VAR};
