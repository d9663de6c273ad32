use crate::{
    controller::{
        executor::Executor, hosts::on_any_host, registry::Registry,
        scheduling::placement::place_volume_bricks,
    },
    error_map::ClusterErrorMap,
    errors::SvcError,
    operations::{
        helpers::{
            brick_targets, clear_pending, create_bricks, destroy_bricks, get_spec, get_spec_opt,
            logged_bricks, remove_brick, stage_bricks, target_hosts,
        },
        Operation, OperationBase,
    },
};
use stor_port::{
    transport_api::ResourceKind,
    types::v0::{
        store::{
            brick::BrickSpec,
            cluster::ClusterSpec,
            definitions::{StorableObject, Store, Transaction},
            operation::{ChangeKind, OperationKind, PendingOperation},
            volume::VolumeSpec,
        },
        transport::{BrickInfo, ClusterId, CreateVolume, Durability, VolumeId},
    },
};

/// Request to create a volume.
#[derive(Debug, Clone, Default)]
pub struct VolumeCreateRequest {
    /// Usable size in GiB.
    pub size_gib: u64,
    /// Data protection.
    pub durability: Durability,
    /// Name of the volume, generated from its id if not set.
    pub name: Option<String>,
    /// Candidate clusters, every cluster which allows file volumes if empty.
    pub clusters: Vec<ClusterId>,
}

/// Creates a volume: places and creates its bricks, then the volume out of them.
#[derive(Debug)]
pub struct VolumeCreateOperation {
    base: OperationBase,
    volume: VolumeSpec,
    clusters: Vec<ClusterId>,
    brick_infos: Vec<BrickInfo>,
}

impl VolumeCreateOperation {
    /// New volume creation, retried as configured.
    pub fn new(registry: &Registry, request: VolumeCreateRequest) -> Result<Self, SvcError> {
        if request.size_gib == 0 {
            return Err(SvcError::InvalidArguments {
                message: "volume size must be greater than zero".to_string(),
            });
        }
        if !request.durability.is_valid() {
            return Err(SvcError::InvalidArguments {
                message: format!("invalid durability {}", request.durability),
            });
        }
        let volume = VolumeSpec::new(
            ClusterId::default(),
            request.size_gib,
            request.durability,
            request.name,
        );
        Ok(Self {
            base: OperationBase::new(registry, OperationKind::CreateVolume)
                .with_max_retries(registry.config().volume_create_retries()),
            volume,
            clusters: request.clusters,
            brick_infos: vec![],
        })
    }
    /// Resume from a persisted record.
    pub fn load(registry: &Registry, record: PendingOperation) -> Result<Self, SvcError> {
        let volume = loaded_volume(registry, &record, ChangeKind::AddVolume)?;
        Ok(Self {
            base: OperationBase::loaded(registry, record),
            volume,
            clusters: vec![],
            brick_infos: vec![],
        })
    }
    /// Id of the volume being created.
    pub fn volume_id(&self) -> &VolumeId {
        &self.volume.id
    }
}

#[async_trait::async_trait]
impl Operation for VolumeCreateOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }
    fn resource_url(&self) -> String {
        format!("/volumes/{}", self.volume.id)
    }

    fn build(&mut self) -> Result<(), SvcError> {
        let registry = self.base.registry().clone();
        let template = &self.volume;
        let clusters = &self.clusters;
        self.base.build_with(|txn, record| {
            let mut volume = template.clone();
            stage_volume(txn, &registry, record, &mut volume, clusters, ChangeKind::AddVolume)
        })
    }

    async fn exec(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        self.brick_infos = exec_volume_create(&self.base, executor, &self.volume.id).await?;
        Ok(())
    }

    async fn rollback(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        rollback_volume_create(&self.base, executor, ChangeKind::AddVolume).await?;
        self.base
            .complete_with(|txn, record| unstage_volume(txn, record, ChangeKind::AddVolume))
    }

    fn finalize(&mut self) -> Result<(), SvcError> {
        let infos = &self.brick_infos;
        self.base.complete_with(|txn, record| {
            finalize_volume(txn, record, ChangeKind::AddVolume, infos)
        })
    }
}

/// The volume logged under `change`, or a placeholder if it no longer exists.
pub(crate) fn loaded_volume(
    registry: &Registry,
    record: &PendingOperation,
    change: ChangeKind,
) -> Result<VolumeSpec, SvcError> {
    let Some(id) = record.first_changed(change).map(VolumeId::from) else {
        return Ok(VolumeSpec::default());
    };
    let volume = registry
        .store()
        .view(|txn| get_spec_opt::<VolumeSpec, _>(txn, &id))?;
    Ok(volume.unwrap_or(VolumeSpec {
        id,
        ..Default::default()
    }))
}

/// Stage `volume` in the first of `clusters` which can hold it, logging it under `change`.
pub(crate) fn stage_volume(
    txn: &mut Transaction<'_>,
    registry: &Registry,
    record: &mut PendingOperation,
    volume: &mut VolumeSpec,
    clusters: &[ClusterId],
    change: ChangeKind,
) -> Result<(), SvcError> {
    let candidates = match clusters.is_empty() {
        false => clusters.to_vec(),
        true => txn
            .get_objs::<ClusterSpec>()?
            .into_iter()
            .filter(|c| match volume.is_block_hosting() {
                true => c.block,
                false => c.file,
            })
            .map(|c| c.id)
            .collect(),
    };
    if candidates.is_empty() {
        return Err(SvcError::NoClusters {});
    }

    let mut errors = ClusterErrorMap::new();
    for cluster_id in candidates {
        match place_in_cluster(txn, registry, volume, &cluster_id) {
            Ok((cluster, bricks)) => {
                return write_volume(txn, record, volume, cluster, bricks, change);
            }
            Err(error) => {
                tracing::debug!(cluster.id = %cluster_id, %error, "Cannot place volume in cluster");
                errors.add(cluster_id.to_string(), error);
            }
        }
    }
    Err(errors.to_error().unwrap_or(SvcError::NoClusters {}))
}

fn place_in_cluster(
    txn: &Transaction<'_>,
    registry: &Registry,
    volume: &VolumeSpec,
    cluster_id: &ClusterId,
) -> Result<(ClusterSpec, Vec<BrickSpec>), SvcError> {
    let cluster: ClusterSpec = get_spec(txn, ResourceKind::Cluster, cluster_id)?;
    let limit = registry.config().max_volumes_per_cluster();
    if cluster.volumes.len() >= limit {
        return Err(SvcError::MaxVolumes {
            cluster: cluster.id,
            count: cluster.volumes.len(),
            limit,
        });
    }
    let bricks = place_volume_bricks(
        txn,
        registry.config(),
        registry.allocator(),
        &cluster.id,
        &volume.id,
        volume.size_gib,
        volume.durability,
    )?;
    Ok((cluster, bricks))
}

fn write_volume(
    txn: &mut Transaction<'_>,
    record: &mut PendingOperation,
    volume: &mut VolumeSpec,
    mut cluster: ClusterSpec,
    mut bricks: Vec<BrickSpec>,
    change: ChangeKind,
) -> Result<(), SvcError> {
    stage_bricks(txn, record, &mut bricks)?;
    volume.cluster = cluster.id.clone();
    volume.bricks = bricks.into_iter().map(|b| b.id).collect();
    volume.pending = Some(record.id.clone());
    txn.put_obj(&*volume)?;
    cluster.volume_add(&volume.id);
    txn.put_obj(&cluster)?;
    record.record(change, &volume.id);
    Ok(())
}

/// Create the bricks of the staged volume and then the volume itself.
/// Remote failures are retryable, the next attempt may land on other devices.
pub(crate) async fn exec_volume_create(
    base: &OperationBase,
    executor: &dyn Executor,
    volume: &VolumeId,
) -> Result<Vec<BrickInfo>, SvcError> {
    let (volume, targets) = base.registry().store().view(|txn| {
        let volume: VolumeSpec = get_spec(txn, ResourceKind::Volume, volume)?;
        let targets = brick_targets(txn, &volume.bricks)?;
        Ok::<_, SvcError>((volume, targets))
    })?;

    let infos = create_bricks(executor, &targets)
        .await
        .map_err(SvcError::retryable)?;

    let request = &CreateVolume {
        id: volume.id.clone(),
        name: volume.name.clone(),
        durability: volume.durability,
        bricks: targets.iter().map(|t| t.brick_path()).collect(),
    };
    on_any_host(executor, &target_hosts(&targets), |host| async move {
        executor.volume_create(&host, request).await
    })
    .await
    .map_err(SvcError::retryable)?;

    tracing::info!(volume.id = %volume.id, volume.name = volume.name, "Created volume");
    Ok(infos)
}

/// Undo the remote side of a volume creation logged under `change`.
/// A volume which cannot be destroyed is ignored as it may never have been created,
/// but the bricks must all be destroyed.
pub(crate) async fn rollback_volume_create(
    base: &OperationBase,
    executor: &dyn Executor,
    change: ChangeKind,
) -> Result<(), SvcError> {
    let record = base.record();
    let bricks = logged_bricks(record, ChangeKind::AddBrick);
    let volume_id = record.first_changed(change).map(VolumeId::from);
    let (volume, targets) = base.registry().store().view(|txn| {
        let volume = match &volume_id {
            Some(id) => get_spec_opt::<VolumeSpec, _>(txn, id)?,
            None => None,
        };
        let targets = brick_targets(txn, &bricks)?;
        Ok::<_, SvcError>((volume, targets))
    })?;

    if let Some(volume) = volume {
        let name = volume.name.as_str();
        let destroyed = on_any_host(executor, &target_hosts(&targets), |host| async move {
            executor.volume_destroy(&host, name).await
        })
        .await;
        if let Err(error) = destroyed {
            tracing::warn!(volume.id = %volume.id, %error, "Ignoring failure to destroy volume");
        }
    }
    destroy_bricks(executor, &targets).await?;
    Ok(())
}

/// Remove the staged volume logged under `change` along with the bricks logged as added.
pub(crate) fn unstage_volume(
    txn: &mut Transaction<'_>,
    record: &PendingOperation,
    change: ChangeKind,
) -> Result<(), SvcError> {
    for brick in logged_bricks(record, ChangeKind::AddBrick) {
        remove_brick(txn, &brick, true)?;
    }
    let Some(volume_id) = record.first_changed(change).map(VolumeId::from) else {
        return Ok(());
    };
    let Some(volume) = get_spec_opt::<VolumeSpec, _>(txn, &volume_id)? else {
        return Ok(());
    };
    if let Some(mut cluster) = get_spec_opt::<ClusterSpec, _>(txn, &volume.cluster)? {
        cluster.volume_remove(&volume.id);
        txn.put_obj(&cluster)?;
    }
    txn.delete_obj(&volume.key())?;
    Ok(())
}

/// Clear the pending markers of the volume logged under `change` and of the bricks logged
/// as added, applying what the storage hosts reported about the bricks.
pub(crate) fn finalize_volume(
    txn: &mut Transaction<'_>,
    record: &PendingOperation,
    change: ChangeKind,
    infos: &[BrickInfo],
) -> Result<(), SvcError> {
    for id in logged_bricks(record, ChangeKind::AddBrick) {
        let Some(mut brick) = get_spec_opt::<BrickSpec, _>(txn, &id)? else {
            continue;
        };
        if let Some(info) = infos.iter().find(|info| info.id == brick.id) {
            brick.path = info.path.clone();
        }
        brick.pending = None;
        txn.put_obj(&brick)?;
    }
    if let Some(volume_id) = record.first_changed(change).map(VolumeId::from) {
        clear_pending::<VolumeSpec, _>(txn, &volume_id)?;
    }
    Ok(())
}
