use crate::{controller::executor::Executor, error_map::HostErrorMap, errors::SvcError};
use futures::StreamExt;
use std::collections::HashMap;
use stor_port::{
    transport_api::ResourceKind,
    types::v0::{
        store::{
            brick::BrickSpec,
            definitions::{StorableObject, StoreError, Transaction},
            node::{DeviceSpec, NodeSpec},
            operation::{ChangeKind, PendingOperation},
            volume::VolumeSpec,
            PendingMarker,
        },
        transport::{BrickId, BrickInfo, BrickPath, CreateBrick, DestroyBrick, NodeId},
    },
};

/// Get the object with the given key, if it exists.
pub fn get_obj_opt<O: StorableObject>(
    txn: &Transaction<'_>,
    key: &O::Key,
) -> Result<Option<O>, SvcError> {
    match txn.get_obj(key) {
        Ok(object) => Ok(Some(object)),
        Err(StoreError::MissingEntry { .. }) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Get the spec with the given id, if it exists.
pub fn get_spec_opt<O, I>(txn: &Transaction<'_>, id: &I) -> Result<Option<O>, SvcError>
where
    O: StorableObject,
    for<'a> O::Key: From<&'a I>,
{
    get_obj_opt(txn, &O::Key::from(id))
}

/// Get the spec with the given id, failing with `NotFound` if it does not exist.
pub fn get_spec<O, I>(txn: &Transaction<'_>, kind: ResourceKind, id: &I) -> Result<O, SvcError>
where
    O: StorableObject,
    for<'a> O::Key: From<&'a I>,
    I: ToString,
{
    get_spec_opt(txn, id)?.ok_or_else(|| SvcError::NotFound {
        kind,
        id: id.to_string(),
    })
}

/// Fail with `Conflict` if the spec is already owned by an operation.
pub fn check_not_pending<S: PendingMarker>(
    spec: &S,
    kind: ResourceKind,
    id: &impl ToString,
) -> Result<(), SvcError> {
    match spec.pending() {
        Some(operation) => Err(SvcError::Conflict {
            kind,
            id: id.to_string(),
            operation: operation.clone(),
        }),
        None => Ok(()),
    }
}

/// Clear the pending marker of the spec, if it exists.
pub fn clear_pending<O, I>(txn: &mut Transaction<'_>, id: &I) -> Result<(), SvcError>
where
    O: StorableObject + PendingMarker,
    for<'a> O::Key: From<&'a I>,
{
    if let Some(mut spec) = get_spec_opt::<O, I>(txn, id)? {
        spec.set_pending(None);
        txn.put_obj(&spec)?;
    }
    Ok(())
}

/// Write the placed `bricks` as pending on `record`, allocate their space from their devices
/// and log them as added.
pub fn stage_bricks(
    txn: &mut Transaction<'_>,
    record: &mut PendingOperation,
    bricks: &mut [BrickSpec],
) -> Result<(), SvcError> {
    for brick in bricks.iter_mut() {
        let mut device: DeviceSpec = get_spec(txn, ResourceKind::Device, &brick.device)?;
        device.storage_allocate(brick.size_kib);
        device.brick_add(&brick.id);
        txn.put_obj(&device)?;
        brick.pending = Some(record.id.clone());
        txn.put_obj(&*brick)?;
        record.record(ChangeKind::AddBrick, &brick.id);
    }
    Ok(())
}

/// Delete the brick and detach it from its device, returning its space if `reclaim`.
pub fn remove_brick(
    txn: &mut Transaction<'_>,
    brick: &BrickId,
    reclaim: bool,
) -> Result<(), SvcError> {
    let Some(spec) = get_spec_opt::<BrickSpec, _>(txn, brick)? else {
        return Ok(());
    };
    if let Some(mut device) = get_spec_opt::<DeviceSpec, _>(txn, &spec.device)? {
        device.brick_remove(brick);
        if reclaim {
            device.storage_free(spec.size_kib);
        }
        txn.put_obj(&device)?;
    }
    txn.delete_obj(&spec.key())?;
    Ok(())
}

/// Ids of the bricks logged under `change`.
pub fn logged_bricks(record: &PendingOperation, change: ChangeKind) -> Vec<BrickId> {
    record
        .changed(change)
        .map(|action| BrickId::from(action.id.as_str()))
        .collect()
}

/// A brick along with where it lives.
#[derive(Debug, Clone)]
pub struct BrickTarget {
    /// The brick.
    pub brick: BrickSpec,
    /// Host used to run commands for the brick.
    pub manage_host: String,
    /// Host serving the brick.
    pub storage_host: String,
    /// Name of the device on the host.
    pub device_name: String,
}

impl BrickTarget {
    /// Location of the brick on the remote system.
    pub fn brick_path(&self) -> BrickPath {
        self.brick.brick_path(&self.storage_host)
    }
    fn create(&self) -> CreateBrick {
        CreateBrick {
            id: self.brick.id.clone(),
            host: self.storage_host.clone(),
            device: self.device_name.clone(),
            size_kib: self.brick.size_kib,
            path: self.brick.path.clone(),
        }
    }
    fn destroy(&self) -> DestroyBrick {
        DestroyBrick {
            id: self.brick.id.clone(),
            host: self.storage_host.clone(),
            device: self.device_name.clone(),
            path: self.brick.path.clone(),
        }
    }
}

/// Resolve the location of the given bricks, skipping the ones which no longer exist.
pub fn brick_targets(
    txn: &Transaction<'_>,
    bricks: &[BrickId],
) -> Result<Vec<BrickTarget>, SvcError> {
    let mut targets = Vec::with_capacity(bricks.len());
    for id in bricks {
        let Some(brick) = get_spec_opt::<BrickSpec, _>(txn, id)? else {
            continue;
        };
        let node: NodeSpec = get_spec(txn, ResourceKind::Node, &brick.node)?;
        let device: DeviceSpec = get_spec(txn, ResourceKind::Device, &brick.device)?;
        targets.push(BrickTarget {
            brick,
            manage_host: node.manage_host,
            storage_host: node.storage_host,
            device_name: device.name,
        });
    }
    Ok(targets)
}

/// Management hosts of the nodes which hold the bricks of the volume, in brick order.
pub fn volume_hosts(txn: &Transaction<'_>, volume: &VolumeSpec) -> Result<Vec<String>, SvcError> {
    let mut hosts = Vec::new();
    for id in &volume.bricks {
        let Some(brick) = get_spec_opt::<BrickSpec, _>(txn, id)? else {
            continue;
        };
        node_manage_host(txn, &brick.node, &mut hosts)?;
    }
    Ok(hosts)
}

/// Management hosts of the nodes of the given targets, in order.
pub fn target_hosts(targets: &[BrickTarget]) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for target in targets {
        if !hosts.contains(&target.manage_host) {
            hosts.push(target.manage_host.clone());
        }
    }
    hosts
}

fn node_manage_host(
    txn: &Transaction<'_>,
    node: &NodeId,
    hosts: &mut Vec<String>,
) -> Result<(), SvcError> {
    let node: NodeSpec = get_spec(txn, ResourceKind::Node, node)?;
    if !hosts.contains(&node.manage_host) {
        hosts.push(node.manage_host);
    }
    Ok(())
}

/// Create the bricks concurrently, waiting for every creation to complete.
/// Fails with the errors of every host which failed to create a brick.
pub async fn create_bricks(
    executor: &dyn Executor,
    targets: &[BrickTarget],
) -> Result<Vec<BrickInfo>, SvcError> {
    let commands = targets
        .iter()
        .map(|target| async move {
            let result = executor.brick_create(&target.manage_host, &target.create()).await;
            (target, result)
        })
        .collect::<Vec<_>>();
    let results = futures::stream::iter(commands)
        .buffer_unordered(utils::BRICK_FANOUT_LIMIT)
        .collect::<Vec<_>>()
        .await;

    let mut errors = HostErrorMap::new();
    let mut created = Vec::with_capacity(results.len());
    for (target, result) in results {
        match result {
            Ok(info) => created.push(info),
            Err(error) => {
                tracing::error!(brick.id = %target.brick.id, host = target.manage_host, %error, "Failed to create brick");
                errors.add(&target.manage_host, error);
            }
        }
    }
    match errors.to_error() {
        None => Ok(created),
        Some(error) => Err(error),
    }
}

/// Destroy the bricks concurrently, waiting for every destruction to complete.
/// Returns, for each destroyed brick, whether its space was reclaimed by its device.
pub async fn destroy_bricks(
    executor: &dyn Executor,
    targets: &[BrickTarget],
) -> Result<HashMap<BrickId, bool>, SvcError> {
    let commands = targets
        .iter()
        .map(|target| async move {
            let result = executor.brick_destroy(&target.manage_host, &target.destroy()).await;
            (target, result)
        })
        .collect::<Vec<_>>();
    let results = futures::stream::iter(commands)
        .buffer_unordered(utils::BRICK_FANOUT_LIMIT)
        .collect::<Vec<_>>()
        .await;

    let mut errors = HostErrorMap::new();
    let mut reclaimed = HashMap::with_capacity(results.len());
    for (target, result) in results {
        match result {
            Ok(space_reclaimed) => {
                reclaimed.insert(target.brick.id.clone(), space_reclaimed);
            }
            Err(error) => {
                tracing::error!(brick.id = %target.brick.id, host = target.manage_host, %error, "Failed to destroy brick");
                errors.add(&target.manage_host, error);
            }
        }
    }
    match errors.to_error() {
        None => Ok(reclaimed),
        Some(error) => Err(error),
    }
}
