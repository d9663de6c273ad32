//! Definition of volume types that can be saved to the persistent store.

use crate::types::v0::{
    store::{
        definitions::{key_prefix_obj, ApiVersion, ObjectKey, StorableObject, StorableObjectType},
        impl_pending_marker,
    },
    transport::{BlockVolumeId, BrickId, ClusterId, Durability, OperationId, VolumeId},
};
use serde::{Deserialize, Serialize};

/// Block hosting accounting of a volume.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct BlockHostingInfo {
    /// The volume hosts block volumes.
    pub hosting: bool,
    /// Space available for new block volumes in GiB.
    pub free_size_gib: u64,
    /// Space held back from block volumes in GiB.
    pub reserved_size_gib: u64,
    /// Block volumes carved from this volume.
    pub block_volumes: Vec<BlockVolumeId>,
}

impl BlockHostingInfo {
    /// Accounting for a new hosting volume of `size_gib` which reserves `reserved_percent`.
    pub fn hosting(size_gib: u64, reserved_percent: u64) -> Self {
        let mut info = Self {
            hosting: true,
            ..Default::default()
        };
        info.add_raw_capacity(size_gib, reserved_percent);
        info
    }
    /// Add `size_gib` of raw space, keeping `reserved_percent` of it aside.
    pub fn add_raw_capacity(&mut self, size_gib: u64, reserved_percent: u64) {
        let reserved = (size_gib * reserved_percent + 99) / 100;
        self.reserved_size_gib += reserved;
        self.free_size_gib += size_gib - reserved.min(size_gib);
    }
}

/// A volume spread across brick sets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct VolumeSpec {
    /// Id of the volume.
    pub id: VolumeId,
    /// Name of the volume on the remote system.
    pub name: String,
    /// Cluster the volume lives in.
    pub cluster: ClusterId,
    /// Usable size in GiB.
    pub size_gib: u64,
    /// Data protection.
    pub durability: Durability,
    /// Bricks, ordered by brick set.
    pub bricks: Vec<BrickId>,
    /// Block hosting accounting.
    pub block_info: BlockHostingInfo,
    /// Volume this one was cloned from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<VolumeId>,
    /// Operation in progress.
    pub pending: Option<OperationId>,
}
impl_pending_marker!(VolumeSpec);

impl VolumeSpec {
    /// New volume with a generated id, named after the id unless a name is given.
    pub fn new(
        cluster: ClusterId,
        size_gib: u64,
        durability: Durability,
        name: Option<String>,
    ) -> Self {
        let id = VolumeId::new();
        Self {
            name: name.unwrap_or_else(|| format!("vol_{id}")),
            id,
            cluster,
            size_gib,
            durability,
            ..Default::default()
        }
    }
    /// Check if this volume hosts block volumes.
    pub fn is_block_hosting(&self) -> bool {
        self.block_info.hosting
    }
    /// Add a brick, if it's not already there.
    pub fn brick_add(&mut self, brick: &BrickId) {
        if !self.bricks.contains(brick) {
            self.bricks.push(brick.clone());
        }
    }
    /// Remove a brick.
    pub fn brick_remove(&mut self, brick: &BrickId) {
        self.bricks.retain(|b| b != brick);
    }
}

/// Key used by the store to uniquely identify a VolumeSpec structure.
pub struct VolumeSpecKey(VolumeId);

impl From<&VolumeId> for VolumeSpecKey {
    fn from(id: &VolumeId) -> Self {
        Self(id.clone())
    }
}

impl ObjectKey for VolumeSpecKey {
    type Kind = StorableObjectType;

    fn version(&self) -> ApiVersion {
        ApiVersion::V0
    }
    fn key_type(&self) -> StorableObjectType {
        StorableObjectType::VolumeSpec
    }
    fn key_uuid(&self) -> String {
        self.0.to_string()
    }
}

impl StorableObject for VolumeSpec {
    type Key = VolumeSpecKey;

    fn key(&self) -> Self::Key {
        VolumeSpecKey(self.id.clone())
    }
    fn key_prefix() -> String {
        key_prefix_obj(StorableObjectType::VolumeSpec, ApiVersion::V0)
    }
}
