//! Reconstructs operations from the records left behind by a previous run, and reports on
//! the records.

use crate::{
    controller::registry::Registry,
    errors::SvcError,
    operations::{
        block_volume_create::BlockVolumeCreateOperation,
        block_volume_delete::BlockVolumeDeleteOperation, device_remove::DeviceRemoveOperation,
        volume_clone::VolumeCloneOperation, volume_create::VolumeCreateOperation,
        volume_delete::VolumeDeleteOperation, volume_expand::VolumeExpandOperation, Operation,
    },
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use stor_port::types::v0::{
    store::{
        definitions::Store,
        operation::{OperationKind, OperationStatus, PendingOperation},
    },
    transport::OperationId,
};

/// Reconstruct the operation which owns `record`.
/// Fails with `NotLoadable` if this version doesn't know how to resume the record.
pub fn load_operation(
    registry: &Registry,
    record: PendingOperation,
) -> Result<Box<dyn Operation>, SvcError> {
    Ok(match record.kind {
        OperationKind::CreateVolume => Box::new(VolumeCreateOperation::load(registry, record)?),
        OperationKind::DeleteVolume => Box::new(VolumeDeleteOperation::load(registry, record)?),
        OperationKind::ExpandVolume => Box::new(VolumeExpandOperation::load(registry, record)?),
        OperationKind::CreateBlockVolume => {
            Box::new(BlockVolumeCreateOperation::load(registry, record)?)
        }
        OperationKind::DeleteBlockVolume => {
            Box::new(BlockVolumeDeleteOperation::load(registry, record)?)
        }
        OperationKind::RemoveDevice => Box::new(DeviceRemoveOperation::load(registry, record)?),
        OperationKind::CloneVolume => Box::new(VolumeCloneOperation::load(registry, record)?),
        OperationKind::Unknown => {
            return Err(SvcError::NotLoadable {
                id: record.id,
                kind: record.kind.to_string(),
            })
        }
    })
}

/// Stamp every `New` record as `Stale`.
/// Must run at start up, before any new operation is started, as every record then belongs
/// to a previous run. Returns the number of records which were stamped.
pub fn mark_pending_operations_stale(registry: &Registry) -> Result<usize, SvcError> {
    let count = registry.store().update(|txn| {
        let mut count = 0;
        for mut record in txn.get_objs::<PendingOperation>()? {
            if record.status == OperationStatus::New {
                record.status = OperationStatus::Stale;
                txn.put_obj(&record)?;
                count += 1;
            }
        }
        Ok::<_, SvcError>(count)
    })?;
    if count > 0 {
        tracing::warn!(count, "Marked pending operations as stale");
    }
    Ok(count)
}

/// Summary of the operations.
#[derive(Serialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct OperationsInfo {
    /// Number of pending records.
    pub total: usize,
    /// Number of operations currently tracked in flight.
    pub in_flight: usize,
    /// Records owned by a live operation.
    pub new: usize,
    /// Records left behind by a previous run.
    pub stale: usize,
    /// Records whose rollback failed.
    pub failed: usize,
}

/// Summarize the pending records and the operations in flight.
pub fn operations_info(registry: &Registry) -> Result<OperationsInfo, SvcError> {
    let mut info = OperationsInfo {
        in_flight: registry.tracker().get(),
        ..Default::default()
    };
    for record in registry.pending_operations()? {
        info.total += 1;
        match record.status {
            OperationStatus::New => info.new += 1,
            OperationStatus::Stale => info.stale += 1,
            OperationStatus::Failed => info.failed += 1,
        }
    }
    Ok(info)
}

/// A pending record, as listed to the administrator.
#[derive(Serialize, Debug, Clone, Eq, PartialEq)]
pub struct PendingInfo {
    /// Id of the record.
    pub id: OperationId,
    /// Kind of the operation.
    pub kind: OperationKind,
    /// Human readable kind of the operation, empty if it can't be loaded.
    pub label: String,
    /// Status of the record.
    pub status: OperationStatus,
    /// Number of actions in the log.
    pub actions: usize,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// List the pending records, oldest first.
pub fn list_pending(registry: &Registry) -> Result<Vec<PendingInfo>, SvcError> {
    let mut records = registry.pending_operations()?;
    records.sort_by_key(|record| record.timestamp);
    Ok(records
        .into_iter()
        .map(|record| PendingInfo {
            id: record.id.clone(),
            kind: record.kind,
            label: operation_label(record.kind).to_string(),
            status: record.status,
            actions: record.actions.len(),
            timestamp: record.timestamp,
        })
        .collect())
}

/// Human readable name of the operation kind.
pub(crate) fn operation_label(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::CreateVolume => "Create Volume",
        OperationKind::DeleteVolume => "Delete Volume",
        OperationKind::ExpandVolume => "Expand Volume",
        OperationKind::CreateBlockVolume => "Create Block Volume",
        OperationKind::DeleteBlockVolume => "Delete Block Volume",
        OperationKind::RemoveDevice => "Remove Device",
        OperationKind::CloneVolume => "Clone Volume",
        OperationKind::Unknown => "",
    }
}
