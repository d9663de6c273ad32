use crate::{
    controller::{executor::Executor, hosts::on_any_host, registry::Registry},
    errors::SvcError,
    operations::{
        block_volume_create::{release_hosting_space, remove_block_volume},
        helpers::{brick_targets, check_not_pending, clear_pending, get_spec, get_spec_opt, target_hosts},
        Operation, OperationBase,
    },
};
use stor_port::{
    transport_api::ResourceKind,
    types::v0::{
        store::{
            block_volume::BlockVolumeSpec,
            definitions::Store,
            operation::{ChangeKind, OperationKind, PendingOperation},
            volume::VolumeSpec,
        },
        transport::{BlockVolumeId, DestroyBlockVolume},
    },
};

/// Deletes a block volume, leaving its hosting volume in place.
#[derive(Debug)]
pub struct BlockVolumeDeleteOperation {
    base: OperationBase,
    block: BlockVolumeId,
}

impl BlockVolumeDeleteOperation {
    /// New deletion of `block`.
    pub fn new(registry: &Registry, block: &BlockVolumeId) -> Self {
        Self {
            base: OperationBase::new(registry, OperationKind::DeleteBlockVolume),
            block: block.clone(),
        }
    }
    /// Resume from a persisted record.
    pub fn load(registry: &Registry, record: PendingOperation) -> Result<Self, SvcError> {
        let block = record
            .first_changed(ChangeKind::DeleteBlockVolume)
            .map(BlockVolumeId::from)
            .unwrap_or_default();
        Ok(Self {
            base: OperationBase::loaded(registry, record),
            block,
        })
    }
}

#[async_trait::async_trait]
impl Operation for BlockVolumeDeleteOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }
    fn resource_url(&self) -> String {
        String::new()
    }

    fn build(&mut self) -> Result<(), SvcError> {
        let id = &self.block;
        self.base.build_with(|txn, record| {
            let mut block: BlockVolumeSpec = get_spec(txn, ResourceKind::BlockVolume, id)?;
            check_not_pending(&block, ResourceKind::BlockVolume, id)?;
            block.pending = Some(record.id.clone());
            txn.put_obj(&block)?;
            record.record(ChangeKind::DeleteBlockVolume, id);
            Ok(())
        })
    }

    async fn exec(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        let located = self.base.registry().store().view(|txn| {
            let Some(block) = get_spec_opt::<BlockVolumeSpec, _>(txn, &self.block)? else {
                return Ok(None);
            };
            let hosting: VolumeSpec =
                get_spec(txn, ResourceKind::Volume, &block.hosting_volume)?;
            let targets = brick_targets(txn, &hosting.bricks)?;
            Ok::<_, SvcError>(Some((block, hosting, targets)))
        })?;
        let Some((block, hosting, targets)) = located else {
            return Ok(());
        };

        let request = &DestroyBlockVolume {
            name: block.name.clone(),
            hosting_volume: hosting.name.clone(),
        };
        on_any_host(executor, &target_hosts(&targets), |host| async move {
            executor.block_volume_destroy(&host, request).await
        })
        .await?;
        tracing::info!(block_volume.id = %block.id, hosting.id = %hosting.id, "Destroyed block volume");
        Ok(())
    }

    async fn rollback(&mut self, _executor: &dyn Executor) -> Result<(), SvcError> {
        let block = &self.block;
        self.base
            .complete_with(|txn, _| clear_pending::<BlockVolumeSpec, _>(txn, block))
    }

    fn finalize(&mut self) -> Result<(), SvcError> {
        let id = &self.block;
        self.base.complete_with(|txn, _| {
            if let Some(block) = get_spec_opt::<BlockVolumeSpec, _>(txn, id)? {
                release_hosting_space(txn, &block.hosting_volume, id, block.size_gib)?;
            }
            remove_block_volume(txn, id)
        })
    }

    /// The remote block volume may already be gone, so the deletion is rolled forward.
    async fn clean(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        self.exec(executor).await?;
        self.finalize()
    }
}
