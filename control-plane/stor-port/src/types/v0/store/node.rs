//! Definition of node and device types that can be saved to the persistent store.

use crate::types::v0::{
    store::{
        definitions::{key_prefix_obj, ApiVersion, ObjectKey, StorableObject, StorableObjectType},
        impl_pending_marker, EntryState,
    },
    transport::{BrickId, ClusterId, DeviceId, NodeId, OperationId},
};
use serde::{Deserialize, Serialize};

/// A storage node of a cluster.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct NodeSpec {
    /// Id of the node.
    pub id: NodeId,
    /// Cluster the node belongs to.
    pub cluster: ClusterId,
    /// Failure domain of the node.
    pub zone: u32,
    /// Hostname used to run management commands.
    pub manage_host: String,
    /// Hostname used for the storage traffic.
    pub storage_host: String,
    /// Devices attached to the node.
    pub devices: Vec<DeviceId>,
    /// Administrative state.
    pub state: EntryState,
}

impl NodeSpec {
    /// Check if new bricks may be placed on this node.
    pub fn is_online(&self) -> bool {
        self.state == EntryState::Online
    }
}

/// Key used by the store to uniquely identify a NodeSpec structure.
pub struct NodeSpecKey(NodeId);

impl From<&NodeId> for NodeSpecKey {
    fn from(id: &NodeId) -> Self {
        Self(id.clone())
    }
}

impl ObjectKey for NodeSpecKey {
    type Kind = StorableObjectType;

    fn version(&self) -> ApiVersion {
        ApiVersion::V0
    }
    fn key_type(&self) -> StorableObjectType {
        StorableObjectType::NodeSpec
    }
    fn key_uuid(&self) -> String {
        self.0.to_string()
    }
}

impl StorableObject for NodeSpec {
    type Key = NodeSpecKey;

    fn key(&self) -> Self::Key {
        NodeSpecKey(self.id.clone())
    }
    fn key_prefix() -> String {
        key_prefix_obj(StorableObjectType::NodeSpec, ApiVersion::V0)
    }
}

/// A raw block device which bricks are carved from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DeviceSpec {
    /// Id of the device.
    pub id: DeviceId,
    /// Node which the device is attached to.
    pub node: NodeId,
    /// Device path on the node, eg: /dev/sdb.
    pub name: String,
    /// Total usable space in KiB.
    pub total_kib: u64,
    /// Space not yet allocated to bricks in KiB.
    pub free_kib: u64,
    /// Space allocated to bricks in KiB.
    pub used_kib: u64,
    /// Bricks allocated on the device.
    pub bricks: Vec<BrickId>,
    /// Administrative state.
    pub state: EntryState,
    /// Operation in progress.
    pub pending: Option<OperationId>,
}
impl_pending_marker!(DeviceSpec);

impl DeviceSpec {
    /// New online device with all of its space free.
    pub fn new(id: DeviceId, node: NodeId, name: impl Into<String>, total_kib: u64) -> Self {
        Self {
            id,
            node,
            name: name.into(),
            total_kib,
            free_kib: total_kib,
            ..Default::default()
        }
    }
    /// Check if `kib` can be allocated from this device.
    pub fn storage_check(&self, kib: u64) -> bool {
        self.free_kib >= kib
    }
    /// Allocate `kib` from the free space.
    pub fn storage_allocate(&mut self, kib: u64) {
        self.free_kib = self.free_kib.saturating_sub(kib);
        self.used_kib += kib;
    }
    /// Return `kib` to the free space.
    pub fn storage_free(&mut self, kib: u64) {
        self.free_kib = (self.free_kib + kib).min(self.total_kib);
        self.used_kib = self.used_kib.saturating_sub(kib);
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
    /// Check if new bricks may be placed on this device.
    pub fn is_online(&self) -> bool {
        self.state == EntryState::Online
    }
}

/// Key used by the store to uniquely identify a DeviceSpec structure.
pub struct DeviceSpecKey(DeviceId);

impl From<&DeviceId> for DeviceSpecKey {
    fn from(id: &DeviceId) -> Self {
        Self(id.clone())
    }
}

impl ObjectKey for DeviceSpecKey {
    type Kind = StorableObjectType;

    fn version(&self) -> ApiVersion {
        ApiVersion::V0
    }
    fn key_type(&self) -> StorableObjectType {
        StorableObjectType::DeviceSpec
    }
    fn key_uuid(&self) -> String {
        self.0.to_string()
    }
}

impl StorableObject for DeviceSpec {
    type Key = DeviceSpecKey;

    fn key(&self) -> Self::Key {
        DeviceSpecKey(self.id.clone())
    }
    fn key_prefix() -> String {
        key_prefix_obj(StorableObjectType::DeviceSpec, ApiVersion::V0)
    }
}
