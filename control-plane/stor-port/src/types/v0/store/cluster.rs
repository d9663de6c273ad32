//! Definition of cluster types that can be saved to the persistent store.

use crate::types::v0::{
    store::definitions::{key_prefix_obj, ApiVersion, ObjectKey, StorableObject, StorableObjectType},
    transport::{BlockVolumeId, ClusterId, NodeId, VolumeId},
};
use serde::{Deserialize, Serialize};

/// A group of storage nodes which volumes are carved from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ClusterSpec {
    /// Id of the cluster.
    pub id: ClusterId,
    /// Nodes which are part of the cluster.
    pub nodes: Vec<NodeId>,
    /// Volumes created in the cluster, including the pending ones.
    pub volumes: Vec<VolumeId>,
    /// Block volumes created in the cluster, including the pending ones.
    pub block_volumes: Vec<BlockVolumeId>,
    /// Allows file volumes.
    pub file: bool,
    /// Allows block hosting volumes.
    pub block: bool,
}

impl ClusterSpec {
    /// New cluster which allows both file and block volumes.
    pub fn new(id: ClusterId) -> Self {
        Self {
            id,
            file: true,
            block: true,
            ..Default::default()
        }
    }
    /// Add a volume, if it's not already there.
    pub fn volume_add(&mut self, volume: &VolumeId) {
        if !self.volumes.contains(volume) {
            self.volumes.push(volume.clone());
        }
    }
    /// Remove a volume.
    pub fn volume_remove(&mut self, volume: &VolumeId) {
        self.volumes.retain(|v| v != volume);
    }
    /// Add a block volume, if it's not already there.
    pub fn block_volume_add(&mut self, volume: &BlockVolumeId) {
        if !self.block_volumes.contains(volume) {
            self.block_volumes.push(volume.clone());
        }
    }
    /// Remove a block volume.
    pub fn block_volume_remove(&mut self, volume: &BlockVolumeId) {
        self.block_volumes.retain(|v| v != volume);
    }
}

/// Key used by the store to uniquely identify a ClusterSpec structure.
pub struct ClusterSpecKey(ClusterId);

impl From<&ClusterId> for ClusterSpecKey {
    fn from(id: &ClusterId) -> Self {
        Self(id.clone())
    }
}

impl ObjectKey for ClusterSpecKey {
    type Kind = StorableObjectType;

    fn version(&self) -> ApiVersion {
        ApiVersion::V0
    }
    fn key_type(&self) -> StorableObjectType {
        StorableObjectType::ClusterSpec
    }
    fn key_uuid(&self) -> String {
        self.0.to_string()
    }
}

impl StorableObject for ClusterSpec {
    type Key = ClusterSpecKey;

    fn key(&self) -> Self::Key {
        ClusterSpecKey(self.id.clone())
    }
    fn key_prefix() -> String {
        key_prefix_obj(StorableObjectType::ClusterSpec, ApiVersion::V0)
    }
}
