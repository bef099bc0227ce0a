//! Sourcing Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the sourcing workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`SourcingError`] and the [`Result`] alias
//! - **Checksums**: content digests used as deduplication keys
//! - **Compression**: gzip helpers for stored payloads
//! - **Logging**: `tracing` subscriber initialisation
//! - **Types**: environment tiers shared by every collector
//!
//! # Example
//!
//! ```no_run
//! use sourcing_common::checksum::ContentDigest;
//! use sourcing_common::compression::{gzip, gunzip};
//!
//! fn main() -> sourcing_common::Result<()> {
//!     let payload = br#"{"RefId":"X","Constraint":[]}"#;
//!     let digest = ContentDigest::of(payload);
//!     let packed = gzip(payload)?;
//!     assert_eq!(gunzip(&packed)?, payload);
//!     println!("stored {} ({} bytes compressed)", digest, packed.len());
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod compression;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SourcingError};
pub use checksum::ContentDigest;
pub use types::Environment;
