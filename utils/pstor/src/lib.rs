//! The persistent stor is an interface to a datastore which suits the projects needs.
//! Every access goes through a transaction: `Store::view` for read-only access and
//! `Store::update` for atomic, single-writer modifications.

/// Error exposed by the pstor.
pub mod error;
/// Export error module.
pub use error::Error;

/// The stor interface.
mod api;
/// Export pstor module.
pub use api::{ObjectKey, StorableObject, Store, Transaction};

/// Key space management.
mod common;
pub use common::{generate_key, key_prefix, key_prefix_obj, ApiVersion, StorableObjectType};

/// A local implementation of the persistent store, kept in memory and optionally
/// persisted to a json document.
pub mod local;
pub use local::LocalStore;
