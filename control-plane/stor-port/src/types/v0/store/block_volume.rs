//! Definition of block volume types that can be saved to the persistent store.

use crate::types::v0::{
    store::{
        definitions::{key_prefix_obj, ApiVersion, ObjectKey, StorableObject, StorableObjectType},
        impl_pending_marker,
    },
    transport::{BlockVolumeId, BlockVolumeInfo, ClusterId, OperationId, VolumeId},
};
use serde::{Deserialize, Serialize};

/// A block volume carved out of a hosting volume.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct BlockVolumeSpec {
    /// Id of the block volume.
    pub id: BlockVolumeId,
    /// Name of the block volume.
    pub name: String,
    /// Size in GiB.
    pub size_gib: u64,
    /// Hosting volume.
    pub hosting_volume: VolumeId,
    /// Cluster of the hosting volume.
    pub cluster: ClusterId,
    /// Number of target hosts.
    pub ha: u32,
    /// Chap authentication requested.
    pub auth: bool,
    /// Export information, filled in once created.
    #[serde(default)]
    pub export: BlockVolumeInfo,
    /// Operation in progress.
    pub pending: Option<OperationId>,
}
impl_pending_marker!(BlockVolumeSpec);

impl BlockVolumeSpec {
    /// New block volume with a generated id, named after the id unless a name is given.
    pub fn new(size_gib: u64, ha: u32, auth: bool, name: Option<String>) -> Self {
        let id = BlockVolumeId::new();
        Self {
            name: name.unwrap_or_else(|| format!("blockvol_{id}")),
            id,
            size_gib,
            ha,
            auth,
            ..Default::default()
        }
    }
}

/// Key used by the store to uniquely identify a BlockVolumeSpec structure.
pub struct BlockVolumeSpecKey(BlockVolumeId);

impl From<&BlockVolumeId> for BlockVolumeSpecKey {
    fn from(id: &BlockVolumeId) -> Self {
        Self(id.clone())
    }
}

impl ObjectKey for BlockVolumeSpecKey {
    type Kind = StorableObjectType;

    fn version(&self) -> ApiVersion {
        ApiVersion::V0
    }
    fn key_type(&self) -> StorableObjectType {
        StorableObjectType::BlockVolumeSpec
    }
    fn key_uuid(&self) -> String {
        self.0.to_string()
    }
}

impl StorableObject for BlockVolumeSpec {
    type Key = BlockVolumeSpecKey;

    fn key(&self) -> Self::Key {
        BlockVolumeSpecKey(self.id.clone())
    }
    fn key_prefix() -> String {
        key_prefix_obj(StorableObjectType::BlockVolumeSpec, ApiVersion::V0)
    }
}
