use crate::{
    controller::{executor::Executor, registry::Registry, tracker::OperationClass},
    errors::SvcError,
    operations::Operation,
};
use std::sync::Arc;
use stor_port::{transport_api::ErrorChain, types::v0::store::operation::OperationStatus};
use tracing::Instrument;

/// Run every phase of `op`, waiting for it to complete.
#[tracing::instrument(level = "debug", skip_all, err, fields(operation.id = %op.id(), operation.kind = %op.kind()))]
pub async fn run_operation(op: &mut dyn Operation, executor: &dyn Executor) -> Result<(), SvcError> {
    op.build()?;
    run_operation_after_build(op, executor).await
}

/// Execute an operation which was already built, finalizing it on success.
///
/// On failure the operation is rolled back. A retryable failure is retried by building the
/// operation again, as the placement may now be different, until its retries are exhausted.
/// If the rollback itself fails, the record is marked as `Failed` and left for the
/// administrator, and the original error is returned.
pub async fn run_operation_after_build(
    op: &mut dyn Operation,
    executor: &dyn Executor,
) -> Result<(), SvcError> {
    let mut retries = 0;
    loop {
        let error = match op.exec(executor).await {
            Ok(()) => {
                op.finalize()?;
                tracing::info!(operation.id = %op.id(), operation = op.label(), "Operation completed");
                return Ok(());
            }
            Err(error) => error,
        };
        let (error, retryable) = error.unwrap_retryable();
        tracing::warn!(
            operation.id = %op.id(),
            operation = op.label(),
            retries,
            error = error.full_string(),
            "Operation failed, rolling back"
        );

        if let Err(rollback) = op.rollback(executor).await {
            tracing::error!(
                operation.id = %op.id(),
                operation = op.label(),
                error = rollback.full_string(),
                "Failed to roll back operation"
            );
            if let Err(mark) = op.base().mark(OperationStatus::Failed) {
                tracing::error!(operation.id = %op.id(), error = %mark, "Failed to mark operation as failed");
            }
            return Err(error);
        }

        if !retryable || retries >= op.max_retries() {
            return Err(error);
        }
        retries += 1;
        op.build()?;
    }
}

/// Build `op` right away, then run the rest of it in the background.
///
/// Returns the id of the task which reports the outcome of the operation. The operation
/// counts towards the in-flight limit until the task completes, or until `build` fails.
pub fn start_operation(
    registry: &Registry,
    executor: Arc<dyn Executor>,
    mut op: Box<dyn Operation>,
) -> Result<String, SvcError> {
    let tracked = registry
        .tracker()
        .track(op.id().as_str(), OperationClass::Normal)?;
    op.build()?;

    let task = registry.tasks().register();
    let task_id = task.id().to_string();
    let span = tracing::info_span!("operation", operation.id = %op.id(), task.id = %task_id);
    tokio::spawn(
        async move {
            let result = run_operation_after_build(op.as_mut(), executor.as_ref()).await;
            // untracked before the outcome is visible to pollers
            drop(tracked);
            match result {
                Ok(()) => task.complete(op.resource_url()),
                Err(error) => task.fail(error.full_string()),
            }
        }
        .instrument(span),
    );
    Ok(task_id)
}
