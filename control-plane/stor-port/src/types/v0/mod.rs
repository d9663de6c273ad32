/// Types which are persisted in the store.
pub mod store;
/// Types exchanged with the remote executor and the identifiers of every resource.
pub mod transport;
