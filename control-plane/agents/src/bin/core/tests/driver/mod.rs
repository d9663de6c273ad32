#![cfg(test)]

mod cleaner;

use crate::{
    common::{test_config, Command, TestEnv},
    volume::request,
};
use agents::{
    controller::{executor::Executor, tasks::TaskStatus, tracker::OperationClass},
    errors::SvcError,
    operations::{
        driver::start_operation,
        helpers::{create_bricks, destroy_bricks},
        loader::{
            list_pending, load_operation, mark_pending_operations_stale, operations_info,
            OperationsInfo,
        },
        volume_create::VolumeCreateOperation,
        Operation,
    },
};
use std::time::Duration;
use stor_port::{
    pstor::Store,
    types::v0::store::operation::{OperationKind, OperationStatus, PendingOperation},
};

const POLL: Duration = Duration::from_millis(5);

#[tokio::test]
async fn start_in_background() {
    let env = TestEnv::new(test_config(), 3, 100);
    let op = VolumeCreateOperation::new(&env.registry, request(10, "vol1")).unwrap();
    let url = op.resource_url();

    let task = start_operation(&env.registry, env.executor.clone(), Box::new(op)).unwrap();
    let status = env.registry.tasks().wait(&task, POLL).await;
    assert_eq!(status, Some(TaskStatus::Completed(url)));
    assert_eq!(env.registry.tracker().get(), 0);
    assert_eq!(env.pending_count(), 0);
    assert_eq!(env.volumes().len(), 1);
}

#[tokio::test]
async fn start_in_background_failure() {
    let env = TestEnv::new(test_config(), 3, 100);
    env.executor.fail(Command::VolumeCreate);
    let op = VolumeCreateOperation::new(&env.registry, request(10, "vol1")).unwrap();

    let task = start_operation(&env.registry, env.executor.clone(), Box::new(op)).unwrap();
    match env.registry.tasks().wait(&task, POLL).await {
        Some(TaskStatus::Failed(message)) => assert!(message.contains("injected failure")),
        status => panic!("unexpected status: {status:?}"),
    }
    assert_eq!(env.registry.tracker().get(), 0);
    assert!(env.volumes().is_empty());
}

#[tokio::test]
async fn start_build_failure() {
    let env = TestEnv::new(test_config(), 3, 1);
    let op = VolumeCreateOperation::new(&env.registry, request(10, "vol1")).unwrap();

    // validation failures are reported right away
    let error = start_operation(&env.registry, env.executor.clone(), Box::new(op)).unwrap_err();
    assert!(matches!(error, SvcError::NoSpace { .. }), "{error}");
    assert_eq!(env.registry.tracker().get(), 0);
}

#[tokio::test]
async fn throttled() {
    let env = TestEnv::new(test_config().with_max_inflight_operations(1), 3, 100);
    env.registry.tracker().add("busy", OperationClass::Normal);

    let op = VolumeCreateOperation::new(&env.registry, request(10, "vol1")).unwrap();
    let error = start_operation(&env.registry, env.executor.clone(), Box::new(op)).unwrap_err();
    assert!(matches!(error, SvcError::TooManyOperations { limit: 1 }), "{error}");
    // nothing was staged
    assert_eq!(env.pending_count(), 0);
    assert_eq!(env.registry.tracker().get(), 1);

    env.registry.tracker().remove("busy");
    let op = VolumeCreateOperation::new(&env.registry, request(10, "vol1")).unwrap();
    let task = start_operation(&env.registry, env.executor.clone(), Box::new(op)).unwrap();
    assert!(matches!(
        env.registry.tasks().wait(&task, POLL).await,
        Some(TaskStatus::Completed(_))
    ));
}

#[tokio::test]
async fn unknown_kind_not_loadable() {
    let env = TestEnv::new(test_config(), 3, 100);
    let record = PendingOperation::new(OperationKind::Unknown);
    env.registry
        .store()
        .update(|txn| txn.put_obj(&record))
        .unwrap();

    let Err(error) = load_operation(&env.registry, record.clone()) else {
        panic!("an unknown operation should not be loadable");
    };
    assert!(matches!(error, SvcError::NotLoadable { ref id, .. } if *id == record.id), "{error}");
}

#[tokio::test]
async fn brick_commands_run_in_spawned_tasks() {
    let env = TestEnv::new(test_config(), 3, 100);
    let executor = env.executor.clone();
    let task = tokio::spawn(async move {
        let executor: &dyn Executor = executor.as_ref();
        let created = create_bricks(executor, &[]).await?;
        let destroyed = destroy_bricks(executor, &[]).await?;
        Ok::<_, SvcError>((created.len(), destroyed.len()))
    });
    assert_eq!(task.await.unwrap().unwrap(), (0, 0));
}

#[tokio::test]
async fn loaded_operation_matches_record() {
    let env = TestEnv::new(test_config(), 3, 100);
    let mut op = VolumeCreateOperation::new(&env.registry, request(10, "vol1")).unwrap();
    op.build().unwrap();

    let record = env.registry.pending_operations().unwrap().remove(0);
    let loaded = load_operation(&env.registry, record).unwrap();
    assert_eq!(loaded.id(), op.id());
    assert_eq!(loaded.kind(), OperationKind::CreateVolume);
    assert_eq!(loaded.label(), "Create Volume");
    assert_eq!(loaded.resource_url(), op.resource_url());
}

#[tokio::test]
async fn stale_marking() {
    let env = TestEnv::new(test_config(), 3, 100);
    for name in ["vol1", "vol2"] {
        let mut op = VolumeCreateOperation::new(&env.registry, request(10, name)).unwrap();
        op.build().unwrap();
    }
    assert_eq!(
        operations_info(&env.registry).unwrap(),
        OperationsInfo {
            total: 2,
            new: 2,
            ..Default::default()
        }
    );

    assert_eq!(mark_pending_operations_stale(&env.registry).unwrap(), 2);
    assert_eq!(mark_pending_operations_stale(&env.registry).unwrap(), 0);
    let info = operations_info(&env.registry).unwrap();
    assert_eq!((info.total, info.new, info.stale), (2, 0, 2));

    let pending = list_pending(&env.registry).unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending[0].timestamp <= pending[1].timestamp);
    assert!(pending
        .iter()
        .all(|p| p.status == OperationStatus::Stale && p.label == "Create Volume" && p.actions == 4));
}
