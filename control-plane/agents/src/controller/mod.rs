/// Immutable configuration of the core.
pub mod config;
/// Remote executor interface used to drive the storage nodes.
pub mod executor;
/// Dispatch of commands across the management hosts of a cluster.
pub mod hosts;
/// The registry which holds the store and the shared components.
pub mod registry;
/// Brick placement.
pub mod scheduling;
/// Completion tracking of asynchronous operations.
pub mod tasks;
/// Admission control of in-flight operations.
pub mod tracker;
