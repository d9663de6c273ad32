#![warn(missing_docs)]
//! Brickyard core library.
//!
//! Changes to the storage clusters are driven as operations which are staged in the store,
//! executed against the remote storage nodes and then either finalized or rolled back.

mod common;

/// Core level errors and their aggregation across hosts and clusters.
pub use common::{error_map, errors};

/// Configuration, admission control, the store registry and the external collaborators.
pub mod controller;
/// The operation lifecycle, its implementations, driver, loader and cleaner.
pub mod operations;
