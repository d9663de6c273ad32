//! Registry holding the store along with the components shared by every operation.
//! It's constructed once by the application and handed to every operation.

use crate::{
    controller::{
        config::CoreConfig,
        scheduling::{Allocator, SimpleAllocator},
        tasks::TaskRegistry,
        tracker::OpTracker,
    },
    errors::SvcError,
    operations::helpers::get_spec,
};
use std::{ops::Deref, sync::Arc};
use stor_port::{
    transport_api::ResourceKind,
    types::v0::store::{
        cluster::ClusterSpec,
        definitions::{LocalStore, StorableObject, Store},
        node::{DeviceSpec, NodeSpec},
        operation::PendingOperation,
        PendingMarker,
    },
};

/// Registry of the store and shared components.
#[derive(Clone, Debug)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Deref for Registry {
    type Target = Arc<RegistryInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The shared components.
#[derive(Debug)]
pub struct RegistryInner {
    store: LocalStore,
    config: CoreConfig,
    tracker: Arc<OpTracker>,
    allocator: Arc<dyn Allocator>,
    tasks: TaskRegistry,
}

impl Registry {
    /// New registry over `store`, placing bricks with the `SimpleAllocator`.
    pub fn new(store: LocalStore, config: CoreConfig) -> Self {
        Self::new_with_allocator(store, config, Arc::new(SimpleAllocator::default()))
    }
    /// New registry over `store`, placing bricks with `allocator`.
    pub fn new_with_allocator(
        store: LocalStore,
        config: CoreConfig,
        allocator: Arc<dyn Allocator>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store,
                tracker: Arc::new(OpTracker::new(config.max_inflight_operations())),
                config,
                allocator,
                tasks: TaskRegistry::new(),
            }),
        }
    }

    /// Get a reference to the persistent store.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }
    /// Get the core configuration.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
    /// Get the tracker of the operations in flight.
    pub fn tracker(&self) -> &Arc<OpTracker> {
        &self.tracker
    }
    /// Get the brick allocator.
    pub fn allocator(&self) -> &dyn Allocator {
        self.allocator.as_ref()
    }
    /// Get the registry of asynchronous tasks.
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// All objects of type `O`, pending ones included.
    pub fn specs<O: StorableObject>(&self) -> Result<Vec<O>, SvcError> {
        self.store.view(|txn| Ok(txn.get_objs::<O>()?))
    }
    /// All objects of type `O` which are not in the middle of a change.
    pub fn complete_specs<O: StorableObject + PendingMarker>(&self) -> Result<Vec<O>, SvcError> {
        Ok(self
            .specs::<O>()?
            .into_iter()
            .filter(|spec| !spec.is_pending())
            .collect())
    }
    /// All pending operation records.
    pub fn pending_operations(&self) -> Result<Vec<PendingOperation>, SvcError> {
        self.specs::<PendingOperation>()
    }

    /// Add a new cluster.
    pub fn cluster_add(&self, cluster: ClusterSpec) -> Result<(), SvcError> {
        self.store.update(|txn| Ok(txn.put_obj(&cluster)?))
    }
    /// Add a new node to its cluster.
    pub fn node_add(&self, node: NodeSpec) -> Result<(), SvcError> {
        self.store.update(|txn| {
            let mut cluster: ClusterSpec = get_spec(txn, ResourceKind::Cluster, &node.cluster)?;
            if !cluster.nodes.contains(&node.id) {
                cluster.nodes.push(node.id.clone());
            }
            txn.put_obj(&cluster)?;
            txn.put_obj(&node)?;
            Ok(())
        })
    }
    /// Add a new device to its node.
    pub fn device_add(&self, device: DeviceSpec) -> Result<(), SvcError> {
        self.store.update(|txn| {
            let mut node: NodeSpec = get_spec(txn, ResourceKind::Node, &device.node)?;
            if !node.devices.contains(&device.id) {
                node.devices.push(device.id.clone());
            }
            txn.put_obj(&node)?;
            txn.put_obj(&device)?;
            Ok(())
        })
    }
}
