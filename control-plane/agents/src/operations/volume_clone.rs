use crate::{
    controller::{
        executor::Executor, hosts::on_any_host, registry::Registry,
        scheduling::placement::brick_path,
    },
    errors::SvcError,
    operations::{
        helpers::{
            brick_targets, check_not_pending, clear_pending, get_spec, get_spec_opt,
            logged_bricks, stage_bricks, target_hosts,
        },
        volume_create::{loaded_volume, unstage_volume},
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
            definitions::Store,
            operation::{ChangeKind, OperationKind, PendingOperation},
            volume::VolumeSpec,
        },
        transport::{BrickId, CloneVolume, VolumeId},
    },
};

/// Clones a volume through snapshots of its bricks.
/// The clone lives on the same devices as the source.
#[derive(Debug)]
pub struct VolumeCloneOperation {
    base: OperationBase,
    source: VolumeId,
    clone: VolumeSpec,
    paths: HashMap<BrickId, String>,
}

impl VolumeCloneOperation {
    /// New clone of `source`, named after its id unless `name` is given.
    pub fn new(registry: &Registry, source: &VolumeId, name: Option<String>) -> Self {
        let mut clone = VolumeSpec::new(Default::default(), 0, Default::default(), name);
        clone.origin = Some(source.clone());
        Self {
            base: OperationBase::new(registry, OperationKind::CloneVolume),
            source: source.clone(),
            clone,
            paths: HashMap::new(),
        }
    }
    /// Resume from a persisted record.
    pub fn load(registry: &Registry, record: PendingOperation) -> Result<Self, SvcError> {
        let source = record
            .first_changed(ChangeKind::CloneVolume)
            .map(VolumeId::from)
            .unwrap_or_default();
        let clone = loaded_volume(registry, &record, ChangeKind::AddVolume)?;
        Ok(Self {
            base: OperationBase::loaded(registry, record),
            source,
            clone,
            paths: HashMap::new(),
        })
    }
    /// Id of the new volume.
    pub fn clone_id(&self) -> &VolumeId {
        &self.clone.id
    }
}

#[async_trait::async_trait]
impl Operation for VolumeCloneOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }
    fn resource_url(&self) -> String {
        format!("/volumes/{}", self.clone.id)
    }

    fn build(&mut self) -> Result<(), SvcError> {
        let limit = self.base.registry().config().max_volumes_per_cluster();
        let source_id = &self.source;
        let template = &self.clone;
        self.base.build_with(|txn, record| {
            let mut source: VolumeSpec = get_spec(txn, ResourceKind::Volume, source_id)?;
            check_not_pending(&source, ResourceKind::Volume, source_id)?;
            let mut cluster: ClusterSpec = get_spec(txn, ResourceKind::Cluster, &source.cluster)?;
            if cluster.volumes.len() >= limit {
                return Err(SvcError::MaxVolumes {
                    cluster: cluster.id,
                    count: cluster.volumes.len(),
                    limit,
                });
            }

            let mut clone = VolumeSpec {
                cluster: source.cluster.clone(),
                size_gib: source.size_gib,
                durability: source.durability,
                ..template.clone()
            };
            let mut bricks = Vec::with_capacity(source.bricks.len());
            for id in &source.bricks {
                let brick: BrickSpec = get_spec(txn, ResourceKind::Brick, id)?;
                let clone_brick = BrickId::new();
                bricks.push(BrickSpec {
                    path: brick_path(&brick.device, &clone_brick),
                    id: clone_brick,
                    volume: clone.id.clone(),
                    origin: Some(brick.id),
                    pending: None,
                    ..brick
                });
            }
            stage_bricks(txn, record, &mut bricks)?;
            clone.bricks = bricks.into_iter().map(|b| b.id).collect();
            clone.pending = Some(record.id.clone());
            txn.put_obj(&clone)?;
            cluster.volume_add(&clone.id);
            txn.put_obj(&cluster)?;

            source.pending = Some(record.id.clone());
            txn.put_obj(&source)?;
            record.record(ChangeKind::CloneVolume, source_id);
            record.record(ChangeKind::AddVolume, &clone.id);
            Ok(())
        })
    }

    async fn exec(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        let clone_bricks = logged_bricks(self.base.record(), ChangeKind::AddBrick);
        let (source, source_targets, clones) = self.base.registry().store().view(|txn| {
            let source: VolumeSpec = get_spec(txn, ResourceKind::Volume, &self.source)?;
            let source_targets = brick_targets(txn, &source.bricks)?;
            let clones = brick_targets(txn, &clone_bricks)?;
            Ok::<_, SvcError>((source, source_targets, clones))
        })?;
        let hosts = target_hosts(&source_targets);
        let source_name = source.name.as_str();

        // the on-disk order of the bricks may differ from the one we know of
        let info = on_any_host(executor, &hosts, |host| async move {
            executor.volume_info(&host, source_name).await
        })
        .await?;
        let mut ordered = Vec::with_capacity(info.bricks.len());
        for path in &info.bricks {
            let Some(target) = source_targets.iter().find(|t| &t.brick_path() == path) else {
                return Err(SvcError::Internal {
                    details: format!("brick {path} of volume {source_name} is unknown"),
                });
            };
            ordered.push(target.brick.id.clone());
        }

        let request = &CloneVolume {
            source: source.name.clone(),
            clone: self.clone.name.clone(),
        };
        let cloned = on_any_host(executor, &hosts, |host| async move {
            executor.volume_clone(&host, request).await
        })
        .await?;
        if cloned.bricks.len() != ordered.len() {
            return Err(SvcError::Internal {
                details: format!(
                    "clone {} has {} bricks, expected {}",
                    request.clone,
                    cloned.bricks.len(),
                    ordered.len()
                ),
            });
        }

        let mut paths = HashMap::with_capacity(ordered.len());
        for (origin, remote) in ordered.iter().zip(&cloned.bricks) {
            let Some(target) = clones
                .iter()
                .find(|t| t.brick.origin.as_ref() == Some(origin))
            else {
                return Err(SvcError::Internal {
                    details: format!("no clone of brick {origin}"),
                });
            };
            if target.storage_host != remote.host {
                tracing::warn!(
                    brick.id = %target.brick.id,
                    expected = target.storage_host,
                    reported = remote.host,
                    "Cloned brick reported on an unexpected host"
                );
            }
            paths.insert(target.brick.id.clone(), remote.path.clone());
        }
        self.paths = paths;
        tracing::info!(volume.id = %self.source, clone.id = %self.clone.id, "Cloned volume");
        Ok(())
    }

    /// Destroys the clone volume but leaves the brick snapshots behind.
    async fn rollback(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        let clone_bricks = logged_bricks(self.base.record(), ChangeKind::AddBrick);
        let targets = self
            .base
            .registry()
            .store()
            .view(|txn| brick_targets(txn, &clone_bricks))?;
        let name = self.clone.name.as_str();
        let destroyed = on_any_host(executor, &target_hosts(&targets), |host| async move {
            executor.volume_destroy(&host, name).await
        })
        .await;
        if let Err(error) = destroyed {
            tracing::warn!(clone.id = %self.clone.id, %error, "Ignoring failure to destroy clone");
        }

        let source = &self.source;
        self.base.complete_with(|txn, record| {
            unstage_volume(txn, record, ChangeKind::AddVolume)?;
            clear_pending::<VolumeSpec, _>(txn, source)
        })
    }

    fn finalize(&mut self) -> Result<(), SvcError> {
        let source = &self.source;
        let clone = &self.clone.id;
        let paths = &self.paths;
        self.base.complete_with(|txn, record| {
            for id in logged_bricks(record, ChangeKind::AddBrick) {
                let Some(mut brick) = get_spec_opt::<BrickSpec, _>(txn, &id)? else {
                    continue;
                };
                if let Some(path) = paths.get(&id) {
                    brick.path = path.clone();
                }
                brick.pending = None;
                txn.put_obj(&brick)?;
            }
            clear_pending::<VolumeSpec, _>(txn, clone)?;
            clear_pending::<VolumeSpec, _>(txn, source)
        })
    }
}
