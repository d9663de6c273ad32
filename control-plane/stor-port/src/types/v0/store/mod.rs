//! Definitions of the objects which are saved in the persistent store.

use crate::types::v0::transport::OperationId;
use serde::{Deserialize, Serialize};

/// Administrative state of a node or device.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Default,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum EntryState {
    /// Available for new bricks.
    #[default]
    Online,
    /// Temporarily not used for new bricks.
    Offline,
    /// Permanently removed from use.
    Failed,
}

/// Entities which can be marked as being in the middle of a change.
/// A marked entity must not be targeted by another operation and is hidden from
/// listings of complete entities until the marker is cleared.
pub trait PendingMarker {
    /// The operation which currently owns the entity, if any.
    fn pending(&self) -> Option<&OperationId>;
    /// Set or clear the owning operation.
    fn set_pending(&mut self, operation: Option<OperationId>);
    /// Check if the entity is owned by an operation.
    fn is_pending(&self) -> bool {
        self.pending().is_some()
    }
    /// Check if the entity is owned by the given operation.
    fn is_pending_on(&self, operation: &OperationId) -> bool {
        self.pending() == Some(operation)
    }
}

macro_rules! impl_pending_marker {
    ($Spec:ty) => {
        impl $crate::types::v0::store::PendingMarker for $Spec {
            fn pending(&self) -> Option<&$crate::types::v0::transport::OperationId> {
                self.pending.as_ref()
            }
            fn set_pending(&mut self, operation: Option<$crate::types::v0::transport::OperationId>) {
                self.pending = operation;
            }
        }
    };
}
pub(crate) use impl_pending_marker;

pub mod block_volume;
pub mod brick;
pub mod cluster;
pub mod definitions;
pub mod node;
pub mod operation;
pub mod volume;
