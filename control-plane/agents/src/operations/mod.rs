//! The operation lifecycle.
//!
//! Every change to the storage clusters is an `Operation` which goes through:
//! 1. `build`: a single store transaction which validates the request, stages every touched
//!    entity as pending on the operation and writes the pending operation record.
//! 2. `exec`: the remote work, using only what `build` staged.
//! 3. `finalize`: a single store transaction which clears the pending markers, applies what
//!    was learned during `exec` and deletes the record.
//!    Or, on failure, `rollback`: undoes the remote work and the staged changes.

/// Block volume creation.
pub mod block_volume_create;
/// Block volume deletion.
pub mod block_volume_delete;
/// Resumes the operations left behind by a previous run.
pub mod cleaner;
/// Device removal.
pub mod device_remove;
/// Sequences the phases of an operation.
pub mod driver;
/// Shared store and executor helpers.
pub mod helpers;
/// Reconstructs operations from their records.
pub mod loader;
/// Volume clone.
pub mod volume_clone;
/// Volume creation.
pub mod volume_create;
/// Volume deletion.
pub mod volume_delete;
/// Volume expansion.
pub mod volume_expand;

use crate::{
    controller::{executor::Executor, registry::Registry},
    errors::SvcError,
};
use stor_port::types::v0::{
    store::{
        definitions::{Store, Transaction},
        operation::{OperationKind, OperationStatus, PendingOperation, PendingOperationKey},
    },
    transport::OperationId,
};

/// A change to the storage clusters, driven through its lifecycle by the driver.
#[async_trait::async_trait]
pub trait Operation: Send + Sync {
    /// State shared by every operation.
    fn base(&self) -> &OperationBase;
    /// Url of the resulting resource, empty for deletions.
    fn resource_url(&self) -> String;
    /// Id of the pending operation record, stable across retries.
    fn id(&self) -> &OperationId {
        self.base().id()
    }
    /// Kind of the pending operation record.
    fn kind(&self) -> OperationKind {
        self.base().record().kind
    }
    /// Human readable kind of the operation.
    fn label(&self) -> &'static str {
        loader::operation_label(self.kind())
    }
    /// Number of times `build` and `exec` may be retried after a retryable failure.
    fn max_retries(&self) -> u32 {
        self.base().max_retries()
    }
    /// Validate and stage the change in a single transaction.
    fn build(&mut self) -> Result<(), SvcError>;
    /// Perform the remote work.
    async fn exec(&mut self, executor: &dyn Executor) -> Result<(), SvcError>;
    /// Undo the remote work and the staged changes.
    async fn rollback(&mut self, executor: &dyn Executor) -> Result<(), SvcError>;
    /// Commit the change in a single transaction.
    fn finalize(&mut self) -> Result<(), SvcError>;
    /// Resolve an operation which was interrupted, by default by rolling it back.
    async fn clean(&mut self, executor: &dyn Executor) -> Result<(), SvcError> {
        self.rollback(executor).await
    }
}

/// State shared by every operation: the registry and the pending operation record.
#[derive(Debug)]
pub struct OperationBase {
    registry: Registry,
    record: PendingOperation,
    max_retries: u32,
}

impl OperationBase {
    /// New operation of `kind`, without retries.
    pub fn new(registry: &Registry, kind: OperationKind) -> Self {
        Self {
            registry: registry.clone(),
            record: PendingOperation::new(kind),
            max_retries: 0,
        }
    }
    /// Operation resumed from a persisted `record`.
    pub fn loaded(registry: &Registry, record: PendingOperation) -> Self {
        Self {
            registry: registry.clone(),
            record,
            max_retries: 0,
        }
    }
    /// Set the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Get the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
    /// Get the pending operation record.
    pub fn record(&self) -> &PendingOperation {
        &self.record
    }
    /// Get the id of the pending operation record.
    pub fn id(&self) -> &OperationId {
        &self.record.id
    }
    /// Get the retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `stage` in a single store transaction, against a fresh copy of the record.
    /// The copy replaces the record only when the transaction commits.
    pub(crate) fn build_with<F>(&mut self, stage: F) -> Result<(), SvcError>
    where
        F: FnOnce(&mut Transaction<'_>, &mut PendingOperation) -> Result<(), SvcError>,
    {
        let mut record = self.record.clone();
        record.reset();
        record.status = OperationStatus::New;
        self.registry.store().update(|txn| {
            stage(txn, &mut record)?;
            txn.put_obj(&record)?;
            Ok::<_, SvcError>(())
        })?;
        tracing::debug!(
            operation.id = %record.id,
            operation.kind = %record.kind,
            actions = record.actions.len(),
            "Staged operation"
        );
        self.record = record;
        Ok(())
    }
    /// Run `f` in a single store transaction which also deletes the record.
    pub(crate) fn complete_with<F>(&self, f: F) -> Result<(), SvcError>
    where
        F: FnOnce(&mut Transaction<'_>, &PendingOperation) -> Result<(), SvcError>,
    {
        self.registry.store().update(|txn| {
            f(txn, &self.record)?;
            txn.delete_obj(&PendingOperationKey::from(&self.record.id))?;
            Ok(())
        })
    }
    /// Stamp the persisted record with `status`, if the record still exists.
    pub fn mark(&self, status: OperationStatus) -> Result<(), SvcError> {
        let key = PendingOperationKey::from(&self.record.id);
        self.registry.store().update(|txn| {
            if let Some(mut record) = helpers::get_obj_opt::<PendingOperation>(txn, &key)? {
                record.status = status;
                txn.put_obj(&record)?;
            }
            Ok(())
        })
    }
}
