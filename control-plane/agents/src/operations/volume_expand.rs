use crate::{
    controller::{
        executor::Executor, hosts::on_any_host, registry::Registry,
        scheduling::placement::place_volume_bricks,
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
use stor_port::{
    transport_api::ResourceKind,
    types::v0::{
        store::{
            brick::BrickSpec,
            definitions::Store,
            operation::{ChangeKind, OperationKind, PendingOperation},
            volume::VolumeSpec,
        },
        transport::{BrickInfo, ExpandVolume, VolumeId},
    },
};

/// Grows a volume by adding brick sets.
#[derive(Debug)]
pub struct VolumeExpandOperation {
    base: OperationBase,
    volume: VolumeId,
    delta_gib: u64,
    brick_infos: Vec<BrickInfo>,
}

impl VolumeExpandOperation {
    /// New expansion of `volume` by `delta_gib`.
    pub fn new(registry: &Registry, volume: &VolumeId, delta_gib: u64) -> Result<Self, SvcError> {
        if delta_gib == 0 {
            return Err(SvcError::InvalidArguments {
                message: "expansion size must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            base: OperationBase::new(registry, OperationKind::ExpandVolume),
            volume: volume.clone(),
            delta_gib,
            brick_infos: vec![],
        })
    }
    /// Resume from a persisted record.
    pub fn load(registry: &Registry, record: PendingOperation) -> Result<Self, SvcError> {
        let action = record.changed(ChangeKind::ExpandVolume).next().cloned();
        let (volume, delta_gib) = match action {
            Some(action) => (VolumeId::from(action.id), action.delta_gib.unwrap_or_default()),
            None => (VolumeId::default(), 0),
        };
        Ok(Self {
            base: OperationBase::loaded(registry, record),
            volume,
            delta_gib,
            brick_infos: vec![],
        })
    }
}

impl VolumeExpandOperation {
    /// The volume, the hosts to reach it through and the new bricks.
    fn layout(&self) -> Result<(VolumeSpec, Vec<String>, Vec<BrickTarget>), SvcError> {
        let bricks = logged_bricks(self.base.record(), ChangeKind::AddBrick);
        self.base.registry().store().view(|txn| {
            let volume: VolumeSpec = get_spec(txn, ResourceKind::Volume, &self.volume)?;
            let hosts = volume_hosts(txn, &volume)?;
            let targets = brick_targets(txn, &bricks)?;
            Ok((volume, hosts, targets))
        })
    }
}

#[async_trait::async_trait]
impl Operation for VolumeExpandOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }
    fn resource_url(&self) -> String {
        format!("/volumes/{}", self.volume)
    }

    fn build(&mut self) -> Result<(), SvcError> {
        let registry = self.base.registry().clone();
        let volume_id = &self.volume;
        let delta_gib = self.delta_gib;
        self.base.build_with(|txn, record| {
            let mut volume: VolumeSpec = get_spec(txn, ResourceKind::Volume, volume_id)?;
            check_not_pending(&volume, ResourceKind::Volume, volume_id)?;
            let mut bricks = place_volume_bricks(
                txn,
                registry.config(),
                registry.allocator(),
                &volume.cluster,
                &volume.id,
                delta_gib,
                volume.durability,
            )?;
            stage_bricks(txn, record, &mut bricks)?;
            volume.pending = Some(record.id.clone());
            txn.put_obj(&volume)?;
            record.record_delta(ChangeKind::ExpandVolume, volume_id, delta_gib);
            Ok(())
        })
    }

    async fn exec(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        let (volume, hosts, targets) = self.layout()?;

        self.brick_infos = create_bricks(executor, &targets)
            .await
            .map_err(SvcError::retryable)?;

        let request = &ExpandVolume {
            name: volume.name.clone(),
            bricks: targets.iter().map(|t| t.brick_path()).collect(),
        };
        on_any_host(executor, &hosts, |host| async move {
            executor.volume_expand(&host, request).await
        })
        .await
        .map_err(SvcError::retryable)?;
        tracing::info!(volume.id = %volume.id, delta_gib = self.delta_gib, "Expanded volume");
        Ok(())
    }

    async fn rollback(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        let bricks = logged_bricks(self.base.record(), ChangeKind::AddBrick);
        let targets = self
            .base
            .registry()
            .store()
            .view(|txn| brick_targets(txn, &bricks))?;
        destroy_bricks(executor, &targets).await?;

        let volume = &self.volume;
        self.base.complete_with(|txn, _| {
            for brick in &bricks {
                remove_brick(txn, brick, true)?;
            }
            clear_pending::<VolumeSpec, _>(txn, volume)
        })
    }

    fn finalize(&mut self) -> Result<(), SvcError> {
        let volume_id = &self.volume;
        let delta_gib = self.delta_gib;
        let infos = &self.brick_infos;
        let reserved_percent = self.base.registry().config().block_hosting().reserved_percent;
        self.base.complete_with(|txn, record| {
            let mut volume: VolumeSpec = get_spec(txn, ResourceKind::Volume, volume_id)?;
            for id in logged_bricks(record, ChangeKind::AddBrick) {
                let Some(mut brick) = get_spec_opt::<BrickSpec, _>(txn, &id)? else {
                    continue;
                };
                if let Some(info) = infos.iter().find(|info| info.id == brick.id) {
                    brick.path = info.path.clone();
                }
                brick.pending = None;
                txn.put_obj(&brick)?;
                volume.brick_add(&id);
            }
            volume.size_gib += delta_gib;
            if volume.is_block_hosting() {
                volume.block_info.add_raw_capacity(delta_gib, reserved_percent);
            }
            volume.pending = None;
            txn.put_obj(&volume)?;
            Ok(())
        })
    }

    /// Once the remote volume uses the new bricks the expansion can't be undone, so it's
    /// rolled forward.
    async fn clean(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        let (volume, hosts, targets) = self.layout()?;
        let name = volume.name.as_str();
        let info = on_any_host(executor, &hosts, |host| async move {
            executor.volume_info(&host, name).await
        })
        .await?;
        if targets.iter().any(|t| info.bricks.contains(&t.brick_path())) {
            tracing::info!(volume.id = %volume.id, "Volume was already expanded, finalizing");
            return self.finalize();
        }
        self.rollback(executor).await
    }
}
