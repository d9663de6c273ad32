use crate::{
    controller::{executor::Executor, hosts::on_any_host, registry::Registry},
    errors::SvcError,
    operations::{
        helpers::{
            brick_targets, check_not_pending, clear_pending, destroy_bricks, get_spec,
            get_spec_opt, logged_bricks, remove_brick, target_hosts,
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
            cluster::ClusterSpec,
            definitions::{StorableObject, Store},
            operation::{ChangeKind, OperationKind, PendingOperation},
            volume::VolumeSpec,
        },
        transport::{BrickId, VolumeId},
    },
};

/// Deletes a volume along with its bricks.
#[derive(Debug)]
pub struct VolumeDeleteOperation {
    base: OperationBase,
    volume: VolumeId,
    reclaimed: HashMap<BrickId, bool>,
    /// The remote volume is gone, the deletion can only be rolled forward.
    destroyed: bool,
}

impl VolumeDeleteOperation {
    /// New deletion of `volume`.
    pub fn new(registry: &Registry, volume: &VolumeId) -> Self {
        Self {
            base: OperationBase::new(registry, OperationKind::DeleteVolume),
            volume: volume.clone(),
            reclaimed: HashMap::new(),
            destroyed: false,
        }
    }
    /// Resume from a persisted record.
    pub fn load(registry: &Registry, record: PendingOperation) -> Result<Self, SvcError> {
        let volume = record
            .first_changed(ChangeKind::DeleteVolume)
            .map(VolumeId::from)
            .unwrap_or_default();
        Ok(Self {
            base: OperationBase::loaded(registry, record),
            volume,
            reclaimed: HashMap::new(),
            destroyed: false,
        })
    }
}

#[async_trait::async_trait]
impl Operation for VolumeDeleteOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }
    fn resource_url(&self) -> String {
        String::new()
    }

    fn build(&mut self) -> Result<(), SvcError> {
        let volume_id = &self.volume;
        self.base.build_with(|txn, record| {
            let mut volume: VolumeSpec = get_spec(txn, ResourceKind::Volume, volume_id)?;
            check_not_pending(&volume, ResourceKind::Volume, volume_id)?;
            if !volume.block_info.block_volumes.is_empty() {
                return Err(SvcError::InUse {
                    kind: ResourceKind::Volume,
                    id: volume_id.to_string(),
                    users: format!("{} block volumes", volume.block_info.block_volumes.len()),
                });
            }
            for id in &volume.bricks {
                let mut brick: BrickSpec = get_spec(txn, ResourceKind::Brick, id)?;
                check_not_pending(&brick, ResourceKind::Brick, id)?;
                brick.pending = Some(record.id.clone());
                txn.put_obj(&brick)?;
                record.record(ChangeKind::DeleteBrick, id);
            }
            volume.pending = Some(record.id.clone());
            txn.put_obj(&volume)?;
            record.record(ChangeKind::DeleteVolume, volume_id);
            Ok(())
        })
    }

    async fn exec(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        let bricks = logged_bricks(self.base.record(), ChangeKind::DeleteBrick);
        let (volume, targets) = self.base.registry().store().view(|txn| {
            let volume = get_spec_opt::<VolumeSpec, _>(txn, &self.volume)?;
            Ok::<_, SvcError>((volume, brick_targets(txn, &bricks)?))
        })?;

        if let Some(volume) = &volume {
            let name = volume.name.as_str();
            on_any_host(executor, &target_hosts(&targets), |host| async move {
                executor.volume_destroy(&host, name).await
            })
            .await?;
        }
        self.destroyed = true;
        self.reclaimed = destroy_bricks(executor, &targets).await?;
        tracing::info!(volume.id = %self.volume, "Destroyed volume");
        Ok(())
    }

    async fn rollback(&mut self, _executor: &dyn Executor) -> Result<(), SvcError> {
        if self.destroyed {
            return Err(SvcError::InvalidState {
                kind: ResourceKind::Volume,
                id: self.volume.to_string(),
                state: "already destroyed on the storage nodes".to_string(),
            });
        }
        let volume = &self.volume;
        self.base.complete_with(|txn, record| {
            for brick in logged_bricks(record, ChangeKind::DeleteBrick) {
                clear_pending::<BrickSpec, _>(txn, &brick)?;
            }
            clear_pending::<VolumeSpec, _>(txn, volume)
        })
    }

    fn finalize(&mut self) -> Result<(), SvcError> {
        let volume_id = &self.volume;
        let reclaimed = &self.reclaimed;
        self.base.complete_with(|txn, record| {
            for brick in logged_bricks(record, ChangeKind::DeleteBrick) {
                let reclaim = reclaimed.get(&brick).copied().unwrap_or_default();
                remove_brick(txn, &brick, reclaim)?;
            }
            if let Some(volume) = get_spec_opt::<VolumeSpec, _>(txn, volume_id)? {
                if let Some(mut cluster) = get_spec_opt::<ClusterSpec, _>(txn, &volume.cluster)? {
                    cluster.volume_remove(volume_id);
                    txn.put_obj(&cluster)?;
                }
                txn.delete_obj(&volume.key())?;
            }
            Ok(())
        })
    }

    /// A partially executed deletion cannot be undone, so it's rolled forward.
    async fn clean(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        self.exec(executor).await?;
        self.finalize()
    }
}
