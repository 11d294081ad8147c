//! # Host Bridge Traits
//!
//! Capability traits that the core requires but that are provided by the host
//! or by a provider crate.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`PhotoService`](photos::PhotoService) - Remote photo store: incremental
//!   listing, ranged tail fetch, upload
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Implementations
//!
//! | Trait          | Implementation Crate |
//! |----------------|----------------------|
//! | `HttpClient`   | `bridge-desktop`     |
//! | `PhotoService` | `provider-flickr`    |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. The core
//! decides whether to retry an operation from
//! [`BridgeError::is_transient`](error::BridgeError::is_transient), so
//! implementations must map transport failures and bad statuses to the right
//! variants.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds; the core drives several
//! requests concurrently against the same instance.

pub mod error;
pub mod http;
pub mod log;
pub mod photos;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use log::{LogEntry, LogLevel, LoggerSink};
pub use photos::{PhotoPage, PhotoService, RemotePhoto, TailBytes, UploadProgress};
