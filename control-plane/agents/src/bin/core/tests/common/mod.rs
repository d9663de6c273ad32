#![cfg(test)]


pub use executor::{Command, MockExecutor};

use agents::{
    controller::{config::CoreConfig, registry::Registry},
    errors::SvcError,
    operations::{
        driver::{run_operation, run_operation_after_build},
        Operation,
    },
};
use std::sync::Arc;
use stor_port::{
    pstor::{LocalStore, Store},
    types::v0::{
        store::{
            brick::BrickSpec,
            cluster::ClusterSpec,
            node::{DeviceSpec, NodeSpec},
            volume::VolumeSpec,
            EntryState,
        },
        transport::{ClusterId, DeviceId, NodeId},
    },
};

pub const GIB: u64 = utils::GIB_TO_KIB;

/// Configuration without retries, tests opt into them.
pub fn test_config() -> CoreConfig {
    CoreConfig::default().with_volume_create_retries(0)
}

/// A registry over an in-memory store along with a mock executor.
pub struct TestEnv {
    pub registry: Registry,
    pub executor: Arc<MockExecutor>,
    pub cluster: ClusterId,
    pub nodes: Vec<NodeId>,
    pub devices: Vec<DeviceId>,
}

impl TestEnv {
    /// A single cluster with `nodes` nodes, each with one device of `device_gib`.
    pub fn new(config: CoreConfig, nodes: usize, device_gib: u64) -> Self {
        let registry = Registry::new(LocalStore::new(), config);
        let mut env = Self {
            registry,
            executor: Arc::new(MockExecutor::default()),
            cluster: ClusterId::new(),
            nodes: vec![],
            devices: vec![],
        };
        env.registry
            .cluster_add(ClusterSpec::new(env.cluster.clone()))
            .unwrap();
        let cluster = env.cluster.clone();
        for _ in 0 .. nodes {
            env.add_node(&cluster, device_gib);
        }
        env
    }

    /// Add a node with a single device of `device_gib` to `cluster`.
    pub fn add_node(&mut self, cluster: &ClusterId, device_gib: u64) -> NodeId {
        let index = self.nodes.len();
        let node = NodeSpec {
            id: NodeId::new(),
            cluster: cluster.clone(),
            zone: index as u32 + 1,
            manage_host: format!("manage-{index}"),
            storage_host: format!("storage-{index}"),
            devices: vec![],
            state: EntryState::Online,
        };
        let device = DeviceSpec::new(DeviceId::new(), node.id.clone(), "/dev/sdb", device_gib * GIB);
        self.devices.push(device.id.clone());
        self.nodes.push(node.id.clone());
        let id = node.id.clone();
        self.registry.node_add(node).unwrap();
        self.registry.device_add(device).unwrap();
        id
    }

    pub async fn run(&self, op: &mut dyn Operation) -> Result<(), SvcError> {
        run_operation(op, self.executor.as_ref()).await
    }

    pub async fn run_after_build(&self, op: &mut dyn Operation) -> Result<(), SvcError> {
        run_operation_after_build(op, self.executor.as_ref()).await
    }

    pub fn volumes(&self) -> Vec<VolumeSpec> {
        self.registry.specs::<VolumeSpec>().unwrap()
    }
    pub fn volume(&self, name: &str) -> VolumeSpec {
        self.volumes()
            .into_iter()
            .find(|v| v.name == name)
            .expect("volume should exist")
    }
    pub fn bricks(&self) -> Vec<BrickSpec> {
        self.registry.specs::<BrickSpec>().unwrap()
    }
    pub fn device(&self, id: &DeviceId) -> DeviceSpec {
        self.registry
            .specs::<DeviceSpec>()
            .unwrap()
            .into_iter()
            .find(|d| &d.id == id)
            .expect("device should exist")
    }
    pub fn cluster_spec(&self) -> ClusterSpec {
        self.registry
            .specs::<ClusterSpec>()
            .unwrap()
            .into_iter()
            .find(|c| c.id == self.cluster)
            .expect("cluster should exist")
    }
    /// Total space used across all devices, in GiB.
    pub fn used_gib(&self) -> u64 {
        self.registry
            .specs::<DeviceSpec>()
            .unwrap()
            .iter()
            .map(|d| d.used_kib)
            .sum::<u64>()
            / GIB
    }
    pub fn pending_count(&self) -> usize {
        self.registry.pending_operations().unwrap().len()
    }
    pub fn set_device_state(&self, id: &DeviceId, state: EntryState) {
        let mut device = self.device(id);
        device.state = state;
        self.registry
            .store()
            .update(|txn| txn.put_obj(&device))
            .unwrap();
    }
}
