/// Brick set sizing and placement of bricks on devices.
pub mod placement;

use crate::{
    errors::SvcError,
    operations::helpers::{get_spec, get_spec_opt},
};
use std::fmt::Debug;
use stor_port::{
    transport_api::ResourceKind,
    types::v0::{
        store::{
            cluster::ClusterSpec,
            definitions::Transaction,
            node::{DeviceSpec, NodeSpec},
        },
        transport::{BrickId, ClusterId, NodeId},
    },
};

/// A device which may receive a brick.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// The device.
    pub device: DeviceSpec,
    /// Node which owns the device.
    pub node: NodeId,
    /// Zone of the node.
    pub zone: u32,
}

/// Yields the devices which may receive a brick.
pub trait Allocator: Send + Sync + Debug {
    /// Devices of `cluster` which may receive the brick `brick`, in order of preference.
    fn candidates(
        &self,
        txn: &Transaction<'_>,
        cluster: &ClusterId,
        brick: &BrickId,
    ) -> Result<Vec<DeviceCandidate>, SvcError>;
}

/// Prefers the online devices with the most free space.
#[derive(Debug, Default)]
pub struct SimpleAllocator {}

impl Allocator for SimpleAllocator {
    fn candidates(
        &self,
        txn: &Transaction<'_>,
        cluster: &ClusterId,
        _brick: &BrickId,
    ) -> Result<Vec<DeviceCandidate>, SvcError> {
        let cluster: ClusterSpec = get_spec(txn, ResourceKind::Cluster, cluster)?;
        let mut candidates = vec![];
        for node_id in &cluster.nodes {
            let Some(node) = get_spec_opt::<NodeSpec, _>(txn, node_id)? else {
                continue;
            };
            if !node.is_online() {
                continue;
            }
            for device_id in &node.devices {
                let Some(device) = get_spec_opt::<DeviceSpec, _>(txn, device_id)? else {
                    continue;
                };
                if device.is_online() {
                    candidates.push(DeviceCandidate {
                        device,
                        node: node.id.clone(),
                        zone: node.zone,
                    });
                }
            }
        }
        candidates.sort_by(|a, b| {
            b.device
                .free_kib
                .cmp(&a.device.free_kib)
                .then_with(|| a.device.id.cmp(&b.device.id))
        });
        Ok(candidates)
    }
}
