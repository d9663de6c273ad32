//! Definition of brick types that can be saved to the persistent store.

use crate::types::v0::{
    store::{
        definitions::{key_prefix_obj, ApiVersion, ObjectKey, StorableObject, StorableObjectType},
        impl_pending_marker,
    },
    transport::{BrickId, BrickPath, DeviceId, NodeId, OperationId, VolumeId},
};
use serde::{Deserialize, Serialize};

/// The slice of a volume which lives on a single device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct BrickSpec {
    /// Id of the brick.
    pub id: BrickId,
    /// Device the brick is carved from.
    pub device: DeviceId,
    /// Node which owns the device.
    pub node: NodeId,
    /// Volume the brick belongs to.
    pub volume: VolumeId,
    /// Size in KiB.
    pub size_kib: u64,
    /// Mount path on the node.
    pub path: String,
    /// The brick this one was cloned from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<BrickId>,
    /// Operation in progress.
    pub pending: Option<OperationId>,
}
impl_pending_marker!(BrickSpec);

impl BrickSpec {
    /// Remote location of the brick given the storage host of its node.
    pub fn brick_path(&self, host: &str) -> BrickPath {
        BrickPath::new(host, &self.path)
    }
}

/// Key used by the store to uniquely identify a BrickSpec structure.
pub struct BrickSpecKey(BrickId);

impl From<&BrickId> for BrickSpecKey {
    fn from(id: &BrickId) -> Self {
        Self(id.clone())
    }
}

impl ObjectKey for BrickSpecKey {
    type Kind = StorableObjectType;

    fn version(&self) -> ApiVersion {
        ApiVersion::V0
    }
    fn key_type(&self) -> StorableObjectType {
        StorableObjectType::BrickSpec
    }
    fn key_uuid(&self) -> String {
        self.0.to_string()
    }
}

impl StorableObject for BrickSpec {
    type Key = BrickSpecKey;

    fn key(&self) -> Self::Key {
        BrickSpecKey(self.id.clone())
    }
    fn key_prefix() -> String {
        key_prefix_obj(StorableObjectType::BrickSpec, ApiVersion::V0)
    }
}
