//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-index`, `provider-flickr`, `bridge-desktop`).
//! Host applications can depend on `pif-workspace` and enable the documented
//! features without needing to wire each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "flickr"))]
pub use core_index;

#[cfg(any(feature = "desktop-shims", feature = "flickr"))]
pub use provider_flickr;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
