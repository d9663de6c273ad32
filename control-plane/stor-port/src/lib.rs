#![allow(clippy::crate_in_macro_def)]

/// Resource kinds and error reporting helpers shared by the core components.
pub mod transport_api;
/// Common types for the various resources used by the core components.
pub mod types;

/// Re-export pstor types and modules.
pub use pstor;
