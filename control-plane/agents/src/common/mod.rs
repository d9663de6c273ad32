/// Aggregation of per-target errors.
pub mod error_map;
/// The core error type.
pub mod errors;
