use crate::{
    controller::{
        executor::Executor, hosts::on_any_host, registry::Registry,
        scheduling::placement::place_replacement_brick,
    },
    errors::SvcError,
    operations::{
        helpers::{
            brick_targets, check_not_pending, clear_pending, create_bricks, destroy_bricks,
            get_spec, get_spec_opt, logged_bricks, remove_brick, stage_bricks, volume_hosts,
            BrickTarget,
        },
        Operation, OperationBase,
    },
};
use std::collections::HashMap;
use stor_port::{
    transport_api::ResourceKind,
    types::v0::{
        store::{
            brick::BrickSpec,
            definitions::{Store, Transaction},
            node::{DeviceSpec, NodeSpec},
            operation::{ChangeKind, OperationKind, PendingOperation},
            volume::VolumeSpec,
            EntryState,
        },
        transport::{BrickId, BrickInfo, BrickPath, DeviceId, NodeId, OperationId, ReplaceBrick},
    },
};

/// Removes an offline device from use, migrating its bricks to other devices first.
#[derive(Debug)]
pub struct DeviceRemoveOperation {
    base: OperationBase,
    device: DeviceId,
    /// The device had no bricks and was failed by `build` directly.
    emptied: bool,
    infos: Vec<BrickInfo>,
    swapped: Vec<(BrickId, BrickId)>,
    reclaimed: HashMap<BrickId, bool>,
}

impl DeviceRemoveOperation {
    /// New removal of `device`.
    pub fn new(registry: &Registry, device: &DeviceId) -> Self {
        Self {
            base: OperationBase::new(registry, OperationKind::RemoveDevice),
            device: device.clone(),
            emptied: false,
            infos: vec![],
            swapped: vec![],
            reclaimed: HashMap::new(),
        }
    }
    /// Resume from a persisted record.
    pub fn load(registry: &Registry, record: PendingOperation) -> Result<Self, SvcError> {
        let device = record
            .first_changed(ChangeKind::RemoveDevice)
            .map(DeviceId::from)
            .unwrap_or_default();
        Ok(Self {
            base: OperationBase::loaded(registry, record),
            device,
            emptied: false,
            infos: vec![],
            swapped: vec![],
            reclaimed: HashMap::new(),
        })
    }
    /// Check if the device was failed straight away, without a pending record.
    pub fn emptied(&self) -> bool {
        self.emptied
    }

    /// The bricks being migrated, as (old, new) pairs.
    fn pairs(&self) -> Vec<(BrickId, BrickId)> {
        let record = self.base.record();
        logged_bricks(record, ChangeKind::DeleteBrick)
            .into_iter()
            .zip(logged_bricks(record, ChangeKind::AddBrick))
            .collect()
    }

    /// Resolve where every migrated brick lives, along with its volume.
    fn migrations(&self) -> Result<Vec<Migration>, SvcError> {
        let pairs = self.pairs();
        self.base.registry().store().view(|txn| {
            let mut migrations = Vec::with_capacity(pairs.len());
            for (old, new) in &pairs {
                let (Some(old), Some(new)) = (
                    brick_targets(txn, std::slice::from_ref(old))?.pop(),
                    brick_targets(txn, std::slice::from_ref(new))?.pop(),
                ) else {
                    return Err(SvcError::Internal {
                        details: format!("migration of brick {old} to {new} is incomplete"),
                    });
                };
                let volume: VolumeSpec = get_spec(txn, ResourceKind::Volume, &old.brick.volume)?;
                let hosts = volume_hosts(txn, &volume)?;
                migrations.push(Migration {
                    old,
                    new,
                    volume: volume.name,
                    hosts,
                });
            }
            Ok(migrations)
        })
    }

    /// Destroy the bricks which were replaced, their space is only reclaimed on success.
    async fn destroy_replaced(&mut self, executor: &dyn Executor, migrations: Vec<Migration>) {
        let old_targets: Vec<BrickTarget> = migrations.into_iter().map(|m| m.old).collect();
        match destroy_bricks(executor, &old_targets).await {
            Ok(reclaimed) => self.reclaimed = reclaimed,
            Err(error) => {
                tracing::warn!(device.id = %self.device, %error, "Failed to destroy replaced bricks");
            }
        }
    }

    /// Fail the device right away if it holds no bricks.
    fn fail_if_empty(&self) -> Result<bool, SvcError> {
        let id = &self.device;
        self.base.registry().store().update(|txn| {
            let mut device = removable_device(txn, id)?;
            if !device.bricks.is_empty() {
                return Ok(false);
            }
            device.state = EntryState::Failed;
            txn.put_obj(&device)?;
            Ok::<_, SvcError>(true)
        })
    }
}

/// A brick moving off the device.
struct Migration {
    old: BrickTarget,
    new: BrickTarget,
    /// Name of the volume of the brick.
    volume: String,
    hosts: Vec<String>,
}

fn removable_device(txn: &Transaction<'_>, id: &DeviceId) -> Result<DeviceSpec, SvcError> {
    let device: DeviceSpec = get_spec(txn, ResourceKind::Device, id)?;
    check_not_pending(&device, ResourceKind::Device, id)?;
    if device.state != EntryState::Offline {
        return Err(SvcError::InvalidState {
            kind: ResourceKind::Device,
            id: id.to_string(),
            state: device.state.to_string(),
        });
    }
    Ok(device)
}

/// Nodes and zones of the other bricks of the set which `brick` belongs to.
fn set_siblings(
    txn: &Transaction<'_>,
    volume: &VolumeSpec,
    brick: &BrickId,
) -> Result<Vec<(NodeId, u32)>, SvcError> {
    let set_size = volume.durability.set_size().max(1);
    let Some(index) = volume.bricks.iter().position(|b| b == brick) else {
        return Err(SvcError::Internal {
            details: format!("brick {brick} is not part of volume {}", volume.id),
        });
    };
    let start = index - index % set_size;
    let mut siblings = Vec::with_capacity(set_size);
    for id in volume.bricks.iter().skip(start).take(set_size) {
        if id == brick {
            continue;
        }
        let sibling: BrickSpec = get_spec(txn, ResourceKind::Brick, id)?;
        let node: NodeSpec = get_spec(txn, ResourceKind::Node, &sibling.node)?;
        siblings.push((node.id, node.zone));
    }
    Ok(siblings)
}

fn check_volume_free(volume: &VolumeSpec, operation: &OperationId) -> Result<(), SvcError> {
    match &volume.pending {
        Some(owner) if owner != operation => Err(SvcError::Conflict {
            kind: ResourceKind::Volume,
            id: volume.id.to_string(),
            operation: owner.clone(),
        }),
        _ => Ok(()),
    }
}

#[async_trait::async_trait]
impl Operation for DeviceRemoveOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }
    fn resource_url(&self) -> String {
        format!("/devices/{}", self.device)
    }

    fn build(&mut self) -> Result<(), SvcError> {
        if self.fail_if_empty()? {
            tracing::info!(device.id = %self.device, "Failed device without bricks");
            self.emptied = true;
            return Ok(());
        }

        let registry = self.base.registry().clone();
        let id = &self.device;
        self.base.build_with(|txn, record| {
            let mut device = removable_device(txn, id)?;
            device.pending = Some(record.id.clone());
            txn.put_obj(&device)?;
            record.record(ChangeKind::RemoveDevice, id);

            for brick_id in &device.bricks {
                let mut old: BrickSpec = get_spec(txn, ResourceKind::Brick, brick_id)?;
                check_not_pending(&old, ResourceKind::Brick, brick_id)?;
                let mut volume: VolumeSpec = get_spec(txn, ResourceKind::Volume, &old.volume)?;
                check_volume_free(&volume, &record.id)?;

                let siblings = set_siblings(txn, &volume, brick_id)?;
                let new = place_replacement_brick(
                    txn,
                    registry.config(),
                    registry.allocator(),
                    &volume.cluster,
                    &volume.id,
                    old.size_kib,
                    id,
                    &siblings,
                )?;
                stage_bricks(txn, record, &mut [new])?;

                old.pending = Some(record.id.clone());
                txn.put_obj(&old)?;
                record.record(ChangeKind::DeleteBrick, brick_id);
                volume.pending = Some(record.id.clone());
                txn.put_obj(&volume)?;
            }
            Ok(())
        })
    }

    async fn exec(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        if self.emptied {
            return Ok(());
        }
        let migrations = self.migrations()?;

        let new_targets: Vec<BrickTarget> = migrations.iter().map(|m| m.new.clone()).collect();
        self.infos = create_bricks(executor, &new_targets).await?;

        for migration in &migrations {
            let new_path = match self.infos.iter().find(|info| info.id == migration.new.brick.id) {
                Some(info) => BrickPath::new(&migration.new.storage_host, &info.path),
                None => migration.new.brick_path(),
            };
            let request = &ReplaceBrick {
                name: migration.volume.clone(),
                old: migration.old.brick_path(),
                new: new_path,
            };
            on_any_host(executor, &migration.hosts, |host| async move {
                executor.volume_replace_brick(&host, request).await
            })
            .await?;
            self.swapped
                .push((migration.old.brick.id.clone(), migration.new.brick.id.clone()));
            tracing::info!(volume.name = migration.volume, old = %request.old, new = %request.new, "Replaced brick");
        }

        self.destroy_replaced(executor, migrations).await;
        Ok(())
    }

    /// Swaps back the bricks which were already replaced and destroys the new bricks.
    async fn rollback(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        if self.emptied {
            return Ok(());
        }
        let pairs = self.pairs();
        let news: Vec<BrickId> = pairs.iter().map(|(_, new)| new.clone()).collect();
        let (targets, swaps) = self.base.registry().store().view(|txn| {
            let mut swaps = Vec::with_capacity(self.swapped.len());
            for (old, new) in &self.swapped {
                let old = brick_targets(txn, std::slice::from_ref(old))?;
                let new = brick_targets(txn, std::slice::from_ref(new))?;
                let (Some(old), Some(new)) = (old.first(), new.first()) else {
                    continue;
                };
                let volume: VolumeSpec = get_spec(txn, ResourceKind::Volume, &old.brick.volume)?;
                let hosts = volume_hosts(txn, &volume)?;
                let request = ReplaceBrick {
                    name: volume.name,
                    old: new.brick_path(),
                    new: old.brick_path(),
                };
                swaps.push((request, hosts));
            }
            Ok::<_, SvcError>((brick_targets(txn, &news)?, swaps))
        })?;

        for (request, hosts) in &swaps {
            on_any_host(executor, hosts, |host| async move {
                executor.volume_replace_brick(&host, request).await
            })
            .await?;
        }
        self.swapped.clear();
        destroy_bricks(executor, &targets).await?;

        let device = &self.device;
        self.base.complete_with(|txn, _| {
            for (old, new) in &pairs {
                remove_brick(txn, new, true)?;
                if let Some(mut brick) = get_spec_opt::<BrickSpec, _>(txn, old)? {
                    brick.pending = None;
                    txn.put_obj(&brick)?;
                    clear_pending::<VolumeSpec, _>(txn, &brick.volume)?;
                }
            }
            clear_pending::<DeviceSpec, _>(txn, device)
        })
    }

    fn finalize(&mut self) -> Result<(), SvcError> {
        if self.emptied {
            return Ok(());
        }
        let pairs = self.pairs();
        let device_id = &self.device;
        let infos = &self.infos;
        let reclaimed = &self.reclaimed;
        self.base.complete_with(|txn, _| {
            for (old, new) in &pairs {
                let Some(old_brick) = get_spec_opt::<BrickSpec, _>(txn, old)? else {
                    continue;
                };
                if let Some(mut volume) =
                    get_spec_opt::<VolumeSpec, _>(txn, &old_brick.volume)?
                {
                    for brick in volume.bricks.iter_mut().filter(|b| *b == old) {
                        *brick = new.clone();
                    }
                    volume.pending = None;
                    txn.put_obj(&volume)?;
                }
                remove_brick(txn, old, reclaimed.get(old).copied().unwrap_or_default())?;

                if let Some(mut brick) = get_spec_opt::<BrickSpec, _>(txn, new)? {
                    if let Some(info) = infos.iter().find(|info| &info.id == new) {
                        brick.path = info.path.clone();
                    }
                    brick.pending = None;
                    txn.put_obj(&brick)?;
                }
            }
            if let Some(mut device) = get_spec_opt::<DeviceSpec, _>(txn, device_id)? {
                device.state = EntryState::Failed;
                device.pending = None;
                txn.put_obj(&device)?;
            }
            Ok(())
        })?;
        tracing::info!(device.id = %self.device, bricks = pairs.len(), "Removed device");
        Ok(())
    }

    /// Resumed from the remote layout of the volumes: once every brick was replaced the
    /// removal is rolled forward, otherwise the replaced bricks are swapped back.
    async fn clean(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        if self.emptied {
            return Ok(());
        }
        let migrations = self.migrations()?;
        let mut layouts: HashMap<String, Vec<BrickPath>> = HashMap::new();
        self.swapped.clear();
        for migration in &migrations {
            if !layouts.contains_key(&migration.volume) {
                let name = migration.volume.as_str();
                let info = on_any_host(executor, &migration.hosts, |host| async move {
                    executor.volume_info(&host, name).await
                })
                .await?;
                layouts.insert(migration.volume.clone(), info.bricks);
            }
            let new_path = migration.new.brick_path();
            if layouts
                .get(&migration.volume)
                .is_some_and(|layout| layout.contains(&new_path))
            {
                self.swapped
                    .push((migration.old.brick.id.clone(), migration.new.brick.id.clone()));
            }
        }

        if !migrations.is_empty() && self.swapped.len() == migrations.len() {
            tracing::info!(device.id = %self.device, "Every brick was replaced, finishing the removal");
            self.destroy_replaced(executor, migrations).await;
            return self.finalize();
        }
        self.rollback(executor).await
    }
}
