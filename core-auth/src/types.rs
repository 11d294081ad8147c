use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};

/// Environment variable holding the application API key.
pub const API_KEY_VAR: &str = "PIF_API_KEY";

/// Environment variable holding the user access token.
pub const ACCESS_TOKEN_VAR: &str = "PIF_ACCESS_TOKEN";

/// Credentials handed to a provider when it connects.
///
/// The lifetime of a credential set is one run: it is built by the host,
/// passed into the connector, and never stored in process-wide state.
///
/// # Security
///
/// The `Debug` implementation redacts both values.
///
/// # Examples
///
/// ```
/// use core_auth::ApiCredentials;
///
/// let credentials = ApiCredentials::new("key", "token").unwrap();
/// assert!(format!("{:?}", credentials).contains("[REDACTED]"));
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiCredentials {
    /// Application API key
    pub api_key: String,
    /// Bearer token authorizing calls on behalf of the user
    pub access_token: String,
}

impl ApiCredentials {
    /// Create a credential set, rejecting empty values.
    pub fn new(api_key: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let access_token = access_token.into();

        if api_key.trim().is_empty() {
            return Err(AuthError::InvalidCredential("API key is empty".to_string()));
        }
        if access_token.trim().is_empty() {
            return Err(AuthError::InvalidCredential(
                "Access token is empty".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            access_token,
        })
    }

    /// Load credentials from `PIF_API_KEY` and `PIF_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load credentials through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key =
            lookup(API_KEY_VAR).ok_or_else(|| AuthError::MissingCredential(API_KEY_VAR.into()))?;
        let access_token = lookup(ACCESS_TOKEN_VAR)
            .ok_or_else(|| AuthError::MissingCredential(ACCESS_TOKEN_VAR.into()))?;

        tracing::debug!(source = "environment", "Loaded API credentials");
        Self::new(api_key, access_token)
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}
