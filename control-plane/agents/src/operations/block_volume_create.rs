use crate::{
    controller::{executor::Executor, hosts::on_any_host, registry::Registry},
    errors::SvcError,
    operations::{
        helpers::{brick_targets, get_spec, get_spec_opt, target_hosts},
        volume_create::{
            exec_volume_create, finalize_volume, rollback_volume_create, stage_volume,
            unstage_volume,
        },
        Operation, OperationBase,
    },
};
use stor_port::{
    transport_api::ResourceKind,
    types::v0::{
        store::{
            block_volume::BlockVolumeSpec,
            cluster::ClusterSpec,
            definitions::{StorableObject, Store, Transaction},
            operation::{ChangeKind, OperationKind, PendingOperation},
            volume::{BlockHostingInfo, VolumeSpec},
        },
        transport::{
            BlockVolumeId, BlockVolumeInfo, BrickInfo, ClusterId, CreateBlockVolume,
            DestroyBlockVolume, VolumeId,
        },
    },
};

/// Request to create a block volume.
#[derive(Debug, Clone)]
pub struct BlockVolumeCreateRequest {
    /// Size in GiB.
    pub size_gib: u64,
    /// Name of the block volume, generated from its id if not set.
    pub name: Option<String>,
    /// Number of target hosts.
    pub ha: u32,
    /// Chap authentication.
    pub auth: bool,
    /// Candidate clusters, every cluster which allows block volumes if empty.
    pub clusters: Vec<ClusterId>,
}

impl Default for BlockVolumeCreateRequest {
    fn default() -> Self {
        Self {
            size_gib: 0,
            name: None,
            ha: 1,
            auth: false,
            clusters: vec![],
        }
    }
}

/// Creates a block volume inside a hosting volume, creating the hosting volume on demand.
#[derive(Debug)]
pub struct BlockVolumeCreateOperation {
    base: OperationBase,
    block: BlockVolumeSpec,
    clusters: Vec<ClusterId>,
    hosting_infos: Vec<BrickInfo>,
    export: Option<BlockVolumeInfo>,
}

impl BlockVolumeCreateOperation {
    /// New block volume creation.
    pub fn new(registry: &Registry, request: BlockVolumeCreateRequest) -> Result<Self, SvcError> {
        if request.size_gib == 0 {
            return Err(SvcError::InvalidArguments {
                message: "block volume size must be greater than zero".to_string(),
            });
        }
        if request.ha == 0 {
            return Err(SvcError::InvalidArguments {
                message: "block volume must have at least one target host".to_string(),
            });
        }
        Ok(Self {
            base: OperationBase::new(registry, OperationKind::CreateBlockVolume),
            block: BlockVolumeSpec::new(request.size_gib, request.ha, request.auth, request.name),
            clusters: request.clusters,
            hosting_infos: vec![],
            export: None,
        })
    }
    /// Resume from a persisted record.
    pub fn load(registry: &Registry, record: PendingOperation) -> Result<Self, SvcError> {
        let id = record
            .first_changed(ChangeKind::AddBlockVolume)
            .map(BlockVolumeId::from)
            .unwrap_or_default();
        let block = registry
            .store()
            .view(|txn| get_spec_opt::<BlockVolumeSpec, _>(txn, &id))?
            .unwrap_or(BlockVolumeSpec {
                id,
                ..Default::default()
            });
        Ok(Self {
            base: OperationBase::loaded(registry, record),
            block,
            clusters: vec![],
            hosting_infos: vec![],
            export: None,
        })
    }
    /// Id of the block volume being created.
    pub fn block_volume_id(&self) -> &BlockVolumeId {
        &self.block.id
    }
    fn hosting_staged(&self) -> bool {
        self.base
            .record()
            .first_changed(ChangeKind::AddHostingVolume)
            .is_some()
    }
}

#[async_trait::async_trait]
impl Operation for BlockVolumeCreateOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }
    fn resource_url(&self) -> String {
        format!("/blockvolumes/{}", self.block.id)
    }

    fn build(&mut self) -> Result<(), SvcError> {
        let registry = self.base.registry().clone();
        let template = &self.block;
        let clusters = &self.clusters;
        let mut staged = template.clone();
        self.base.build_with(|txn, record| {
            let mut block = template.clone();
            let mut hosting = match find_hosting_volume(txn, clusters, block.size_gib)? {
                Some(hosting) => hosting,
                None => {
                    let config = registry.config().block_hosting();
                    if !config.auto_create {
                        return Err(SvcError::BlockHostingDisabled {
                            size_gib: block.size_gib,
                        });
                    }
                    let mut hosting =
                        VolumeSpec::new(ClusterId::default(), config.size_gib, config.durability, None);
                    hosting.block_info =
                        BlockHostingInfo::hosting(config.size_gib, config.reserved_percent);
                    if block.size_gib > hosting.block_info.free_size_gib {
                        return Err(SvcError::BlockHostingTooSmall {
                            size_gib: block.size_gib,
                            free_gib: hosting.block_info.free_size_gib,
                        });
                    }
                    stage_volume(
                        txn,
                        &registry,
                        record,
                        &mut hosting,
                        clusters,
                        ChangeKind::AddHostingVolume,
                    )?;
                    hosting
                }
            };

            hosting.block_info.free_size_gib -= block.size_gib;
            hosting.block_info.block_volumes.push(block.id.clone());
            txn.put_obj(&hosting)?;

            block.hosting_volume = hosting.id.clone();
            block.cluster = hosting.cluster.clone();
            block.pending = Some(record.id.clone());
            txn.put_obj(&block)?;
            let mut cluster: ClusterSpec = get_spec(txn, ResourceKind::Cluster, &block.cluster)?;
            cluster.block_volume_add(&block.id);
            txn.put_obj(&cluster)?;
            record.record(ChangeKind::AddBlockVolume, &block.id);
            staged = block;
            Ok(())
        })?;
        self.block = staged;
        Ok(())
    }

    async fn exec(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        if self.hosting_staged() {
            self.hosting_infos =
                exec_volume_create(&self.base, executor, &self.block.hosting_volume).await?;
        }

        let (hosting, targets) = self.base.registry().store().view(|txn| {
            let hosting: VolumeSpec =
                get_spec(txn, ResourceKind::Volume, &self.block.hosting_volume)?;
            let targets = brick_targets(txn, &hosting.bricks)?;
            Ok::<_, SvcError>((hosting, targets))
        })?;
        let hosts = target_hosts(&targets);
        let mut storage_hosts: Vec<String> = Vec::new();
        for target in &targets {
            if !storage_hosts.contains(&target.storage_host) {
                storage_hosts.push(target.storage_host.clone());
            }
        }
        storage_hosts.truncate(self.block.ha as usize);

        let request = &CreateBlockVolume {
            id: self.block.id.clone(),
            name: self.block.name.clone(),
            hosting_volume: hosting.name.clone(),
            size_gib: self.block.size_gib,
            ha: self.block.ha,
            hosts: storage_hosts,
            auth: self.block.auth,
        };
        let export = on_any_host(executor, &hosts, |host| async move {
            executor.block_volume_create(&host, request).await
        })
        .await?;
        tracing::info!(
            block_volume.id = %self.block.id,
            hosting.id = %hosting.id,
            size_gib = export.size_gib,
            "Created block volume"
        );
        self.export = Some(export);
        Ok(())
    }

    async fn rollback(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        let block = &self.block;
        let hosting = self.base.registry().store().view(|txn| {
            get_spec_opt::<VolumeSpec, _>(txn, &block.hosting_volume)?
                .map(|hosting| Ok::<_, SvcError>((brick_targets(txn, &hosting.bricks)?, hosting)))
                .transpose()
        })?;
        if let Some((targets, hosting)) = hosting {
            let request = &DestroyBlockVolume {
                name: block.name.clone(),
                hosting_volume: hosting.name,
            };
            let destroyed = on_any_host(executor, &target_hosts(&targets), |host| async move {
                executor.block_volume_destroy(&host, request).await
            })
            .await;
            if let Err(error) = destroyed {
                tracing::warn!(block_volume.id = %block.id, %error, "Ignoring failure to destroy block volume");
            }
        }

        let hosting_staged = self.hosting_staged();
        if hosting_staged {
            rollback_volume_create(&self.base, executor, ChangeKind::AddHostingVolume).await?;
        }
        self.base.complete_with(|txn, record| {
            if hosting_staged {
                unstage_volume(txn, record, ChangeKind::AddHostingVolume)?;
            } else {
                release_hosting_space(txn, &block.hosting_volume, &block.id, block.size_gib)?;
            }
            remove_block_volume(txn, &block.id)
        })
    }

    fn finalize(&mut self) -> Result<(), SvcError> {
        let block_id = &self.block.id;
        let export = &self.export;
        let infos = &self.hosting_infos;
        self.base.complete_with(|txn, record| {
            let mut block: BlockVolumeSpec = get_spec(txn, ResourceKind::BlockVolume, block_id)?;
            if let Some(export) = export {
                if export.size_gib != 0 && export.size_gib != block.size_gib {
                    // the hosting volume accounts for what was really handed out
                    if let Some(mut hosting) =
                        get_spec_opt::<VolumeSpec, _>(txn, &block.hosting_volume)?
                    {
                        let free = hosting.block_info.free_size_gib + block.size_gib;
                        hosting.block_info.free_size_gib = free.saturating_sub(export.size_gib);
                        txn.put_obj(&hosting)?;
                    }
                    block.size_gib = export.size_gib;
                }
                if export.ha != 0 {
                    block.ha = export.ha;
                }
                block.export = export.clone();
            }
            block.pending = None;
            txn.put_obj(&block)?;
            finalize_volume(txn, record, ChangeKind::AddHostingVolume, infos)
        })
    }
}

/// First hosting volume of the candidate clusters with `size_gib` free.
/// Fails if none fits while a hosting volume is being created, as only one may be in flight.
fn find_hosting_volume(
    txn: &Transaction<'_>,
    clusters: &[ClusterId],
    size_gib: u64,
) -> Result<Option<VolumeSpec>, SvcError> {
    let candidates = match clusters.is_empty() {
        false => clusters.to_vec(),
        true => txn
            .get_objs::<ClusterSpec>()?
            .into_iter()
            .filter(|c| c.block)
            .map(|c| c.id)
            .collect(),
    };
    let mut hosting_pending = false;
    for cluster in candidates {
        let cluster: ClusterSpec = get_spec(txn, ResourceKind::Cluster, &cluster)?;
        for id in &cluster.volumes {
            let Some(volume) = get_spec_opt::<VolumeSpec, _>(txn, id)? else {
                continue;
            };
            if !volume.is_block_hosting() {
                continue;
            }
            if volume.pending.is_some() {
                hosting_pending = true;
            } else if volume.block_info.free_size_gib >= size_gib {
                return Ok(Some(volume));
            }
        }
    }
    match hosting_pending {
        true => Err(SvcError::HostingVolumePending {}),
        false => Ok(None),
    }
}

/// Give the space held by a block volume back to its hosting volume.
pub(crate) fn release_hosting_space(
    txn: &mut Transaction<'_>,
    hosting: &VolumeId,
    block: &BlockVolumeId,
    size_gib: u64,
) -> Result<(), SvcError> {
    if let Some(mut hosting) = get_spec_opt::<VolumeSpec, _>(txn, hosting)? {
        if hosting.block_info.block_volumes.contains(block) {
            hosting.block_info.block_volumes.retain(|b| b != block);
            hosting.block_info.free_size_gib += size_gib;
            txn.put_obj(&hosting)?;
        }
    }
    Ok(())
}

/// Delete the block volume and detach it from its cluster.
pub(crate) fn remove_block_volume(
    txn: &mut Transaction<'_>,
    block: &BlockVolumeId,
) -> Result<(), SvcError> {
    let Some(spec) = get_spec_opt::<BlockVolumeSpec, _>(txn, block)? else {
        return Ok(());
    };
    if let Some(mut cluster) = get_spec_opt::<ClusterSpec, _>(txn, &spec.cluster)? {
        cluster.block_volume_remove(block);
        txn.put_obj(&cluster)?;
    }
    txn.delete_obj(&spec.key())?;
    Ok(())
}
