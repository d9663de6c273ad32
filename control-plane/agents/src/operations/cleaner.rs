//! Resolves the operations which a previous run left behind.
//! Each stale or failed record is loaded back into its operation, which is then cleaned:
//! creations are rolled back while deletions, which can't be undone, are rolled forward.

use crate::{
    controller::{executor::Executor, registry::Registry, tracker::OperationClass},
    errors::SvcError,
    operations::loader::load_operation,
};
use serde::Serialize;
use std::{future::Future, sync::Arc};
use stor_port::{transport_api::ErrorChain, types::v0::store::operation::OperationStatus};

/// Outcome of a single cleaning pass.
#[derive(Serialize, Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CleanSummary {
    /// Records which were resolved and removed.
    pub cleaned: usize,
    /// Records which could not be resolved and were marked as failed.
    pub failed: usize,
    /// Records which this version cannot load.
    pub skipped: usize,
}

/// Background cleaner of the pending operation records.
pub struct OperationCleaner {
    registry: Registry,
    executor: Arc<dyn Executor>,
}

impl std::fmt::Debug for OperationCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationCleaner").finish_non_exhaustive()
    }
}

impl OperationCleaner {
    /// New cleaner which runs the remote commands through `executor`.
    pub fn new(registry: &Registry, executor: Arc<dyn Executor>) -> Self {
        Self {
            registry: registry.clone(),
            executor,
        }
    }

    /// Run a single pass over the records which are not owned by a live operation.
    /// Only one pass may run at a time and it counts as a background operation, so it fails
    /// with `TooManyOperations` when the server is busy.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn clean(&self) -> Result<CleanSummary, SvcError> {
        let _tracked = self
            .registry
            .tracker()
            .track_token(OperationClass::Background)?;

        let mut summary = CleanSummary::default();
        for record in self.registry.pending_operations()? {
            if record.status == OperationStatus::New {
                continue;
            }
            let id = record.id.clone();
            let mut op = match load_operation(&self.registry, record) {
                Ok(op) => op,
                Err(error) => {
                    tracing::warn!(operation.id = %id, error = error.full_string(), "Skipping pending operation");
                    summary.skipped += 1;
                    continue;
                }
            };
            match op.clean(self.executor.as_ref()).await {
                Ok(()) => {
                    tracing::info!(operation.id = %id, operation = op.label(), "Cleaned pending operation");
                    summary.cleaned += 1;
                }
                Err(error) => {
                    tracing::error!(
                        operation.id = %id,
                        operation = op.label(),
                        error = error.full_string(),
                        "Failed to clean pending operation"
                    );
                    if let Err(error) = op.base().mark(OperationStatus::Failed) {
                        tracing::error!(operation.id = %id, %error, "Failed to mark operation as failed");
                    }
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Clean periodically until `shutdown` completes.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let period = self.registry.config().cleaner_period();
        tokio::pin!(shutdown);
        loop {
            match self.clean().await {
                Ok(summary) if summary != CleanSummary::default() => {
                    tracing::info!(?summary, "Pending operations cleaned");
                }
                Ok(_) => {}
                Err(SvcError::TooManyOperations { .. }) => {
                    tracing::debug!("Server is busy, cleaning later");
                }
                Err(error) => {
                    tracing::error!(error = error.full_string(), "Cleaning pass failed");
                }
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(period) => {}
            }
        }
        tracing::info!("Operation cleaner stopped");
    }
}
