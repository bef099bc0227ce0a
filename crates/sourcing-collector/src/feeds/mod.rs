//! Collector policies shipped with the binary

mod http_snapshot;

pub use http_snapshot::{HttpSnapshotConfig, HttpSnapshotPolicy};
