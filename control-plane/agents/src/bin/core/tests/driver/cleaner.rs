use crate::{
    common::{test_config, Command, TestEnv},
    volume::{create_volume, request},
};
use agents::{
    controller::tracker::OperationClass,
    errors::SvcError,
    operations::{
        cleaner::{CleanSummary, OperationCleaner},
        device_remove::DeviceRemoveOperation,
        loader::mark_pending_operations_stale,
        volume_create::VolumeCreateOperation,
        volume_delete::VolumeDeleteOperation,
        volume_expand::VolumeExpandOperation,
        Operation,
    },
};
use std::time::Duration;
use stor_port::{
    pstor::Store,
    types::v0::{
        store::{
            operation::{OperationKind, OperationStatus, PendingOperation},
            EntryState, PendingMarker,
        },
        transport::DeviceId,
    },
};

fn cleaner(env: &TestEnv) -> OperationCleaner {
    OperationCleaner::new(&env.registry, env.executor.clone())
}

#[tokio::test]
async fn rolls_back_interrupted_create() {
    let env = TestEnv::new(test_config(), 3, 100);
    let mut op = VolumeCreateOperation::new(&env.registry, request(10, "vol1")).unwrap();
    op.build().unwrap();
    op.exec(env.executor.as_ref()).await.unwrap();
    // the process "restarts" before finalizing
    drop(op);

    // records owned by live operations are left alone
    assert_eq!(cleaner(&env).clean().await.unwrap(), CleanSummary::default());

    mark_pending_operations_stale(&env.registry).unwrap();
    let summary = cleaner(&env).clean().await.unwrap();
    assert_eq!(summary.cleaned, 1);

    assert!(env.volumes().is_empty());
    assert!(env.bricks().is_empty());
    assert_eq!(env.used_gib(), 0);
    assert_eq!(env.executor.brick_count(), 0);
    assert_eq!(env.executor.volume("vol1"), None);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn rolls_forward_interrupted_delete() {
    let env = TestEnv::new(test_config(), 3, 100);
    let volume = create_volume(&env, 10, "vol1").await;
    let mut op = VolumeDeleteOperation::new(&env.registry, &volume.id);
    op.build().unwrap();
    drop(op);

    mark_pending_operations_stale(&env.registry).unwrap();
    let summary = cleaner(&env).clean().await.unwrap();
    assert_eq!(summary.cleaned, 1);

    assert!(env.volumes().is_empty());
    assert!(env.bricks().is_empty());
    assert_eq!(env.used_gib(), 0);
    assert_eq!(env.executor.brick_count(), 0);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn marks_failed_when_cleaning_fails() {
    let env = TestEnv::new(test_config(), 3, 100);
    let mut op = VolumeCreateOperation::new(&env.registry, request(10, "vol1")).unwrap();
    op.build().unwrap();
    op.exec(env.executor.as_ref()).await.unwrap();
    drop(op);
    mark_pending_operations_stale(&env.registry).unwrap();
    env.executor.fail(Command::BrickDestroy);

    let summary = cleaner(&env).clean().await.unwrap();
    assert_eq!(summary.failed, 1);
    let records = env.registry.pending_operations().unwrap();
    assert_eq!(records[0].status, OperationStatus::Failed);
    assert!(env.volume("vol1").is_pending());

    // failed records are retried once the hosts recover
    env.executor.heal();
    let summary = cleaner(&env).clean().await.unwrap();
    assert_eq!(summary.cleaned, 1);
    assert!(env.volumes().is_empty());
}

#[tokio::test]
async fn skips_unknown_operations() {
    let env = TestEnv::new(test_config(), 3, 100);
    let mut record = PendingOperation::new(OperationKind::Unknown);
    record.status = OperationStatus::Stale;
    env.registry
        .store()
        .update(|txn| txn.put_obj(&record))
        .unwrap();

    let summary = cleaner(&env).clean().await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(env.pending_count(), 1);
}

#[tokio::test]
async fn single_background_pass() {
    let env = TestEnv::new(test_config(), 3, 100);
    env.registry
        .tracker()
        .add("other-pass", OperationClass::Background);

    let error = cleaner(&env).clean().await.unwrap_err();
    assert!(matches!(error, SvcError::TooManyOperations { .. }), "{error}");
}

#[tokio::test]
async fn runs_until_shutdown() {
    let env = TestEnv::new(test_config().with_cleaner_period(Duration::from_millis(5)), 3, 100);
    let mut op = VolumeCreateOperation::new(&env.registry, request(10, "vol1")).unwrap();
    op.build().unwrap();
    drop(op);
    mark_pending_operations_stale(&env.registry).unwrap();

    let (shutdown, stopped) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(cleaner(&env).run(async {
        let _ = stopped.await;
    }));
    tokio::time::timeout(Duration::from_secs(5), async {
        while env.pending_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    shutdown.send(()).unwrap();
    handle.await.unwrap();
    assert!(env.volumes().is_empty());
    assert_eq!(env.registry.tracker().get(), 0);
}

#[tokio::test]
async fn rolls_forward_interrupted_expand() {
    let env = TestEnv::new(test_config(), 3, 100);
    let volume = create_volume(&env, 10, "vol1").await;
    let mut op = VolumeExpandOperation::new(&env.registry, &volume.id, 10).unwrap();
    op.build().unwrap();
    op.exec(env.executor.as_ref()).await.unwrap();
    drop(op);

    mark_pending_operations_stale(&env.registry).unwrap();
    assert_eq!(cleaner(&env).clean().await.unwrap().cleaned, 1);

    // the remote volume already serves the new bricks, so they are kept
    let volume = env.volume("vol1");
    assert!(!volume.is_pending());
    assert_eq!(volume.size_gib, 20);
    assert_eq!(volume.bricks.len(), 6);
    assert_eq!(env.bricks().len(), 6);
    assert_eq!(env.executor.volume("vol1").map(|b| b.len()), Some(6));
    assert_eq!(env.executor.brick_count(), 6);
    assert_eq!(env.used_gib(), 60);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn rolls_back_expand_interrupted_before_attach() {
    let env = TestEnv::new(test_config(), 3, 100);
    let volume = create_volume(&env, 10, "vol1").await;
    env.executor.fail(Command::VolumeExpand);
    let mut op = VolumeExpandOperation::new(&env.registry, &volume.id, 10).unwrap();
    op.build().unwrap();
    assert!(op.exec(env.executor.as_ref()).await.is_err());
    drop(op);
    env.executor.heal();

    mark_pending_operations_stale(&env.registry).unwrap();
    assert_eq!(cleaner(&env).clean().await.unwrap().cleaned, 1);

    let volume = env.volume("vol1");
    assert!(!volume.is_pending());
    assert_eq!(volume.size_gib, 10);
    assert_eq!(volume.bricks.len(), 3);
    assert_eq!(env.bricks().len(), 3);
    assert_eq!(env.executor.volume("vol1").map(|b| b.len()), Some(3));
    assert_eq!(env.executor.brick_count(), 3);
    assert_eq!(env.used_gib(), 30);
}

/// Stage the removal of the device holding the first brick of "vol1".
async fn interrupted_device_removal(env: &TestEnv, fail: Option<Command>) -> DeviceId {
    create_volume(env, 10, "vol1").await;
    let first = env.volume("vol1").bricks[0].clone();
    let device = env
        .bricks()
        .into_iter()
        .find(|b| b.id == first)
        .map(|b| b.device)
        .unwrap();
    env.set_device_state(&device, EntryState::Offline);
    if let Some(command) = fail {
        env.executor.fail(command);
    }

    let mut op = DeviceRemoveOperation::new(&env.registry, &device);
    op.build().unwrap();
    let result = op.exec(env.executor.as_ref()).await;
    assert_eq!(result.is_err(), fail.is_some());
    env.executor.heal();
    mark_pending_operations_stale(&env.registry).unwrap();
    device
}

#[tokio::test]
async fn rolls_forward_replaced_device_bricks() {
    let env = TestEnv::new(test_config(), 4, 100);
    let device = interrupted_device_removal(&env, None).await;
    assert_eq!(cleaner(&env).clean().await.unwrap().cleaned, 1);

    let removed = env.device(&device);
    assert_eq!(removed.state, EntryState::Failed);
    assert!(removed.bricks.is_empty());
    assert!(!removed.is_pending());

    // the store matches the bricks the remote volume uses
    let volume = env.volume("vol1");
    assert!(!volume.is_pending());
    let bricks = env.bricks();
    assert_eq!(bricks.len(), 3);
    assert!(bricks.iter().all(|b| b.device != device && !b.is_pending()));
    let remote = env.executor.volume("vol1").unwrap();
    assert_eq!(remote.len(), 3);
    for brick in &bricks {
        assert!(remote.iter().any(|r| r.path == brick.path), "{}", brick.path);
    }
    assert_eq!(env.executor.brick_count(), 3);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn rolls_back_device_removal_before_replace() {
    let env = TestEnv::new(test_config(), 4, 100);
    let device = interrupted_device_removal(&env, Some(Command::VolumeReplaceBrick)).await;
    assert_eq!(cleaner(&env).clean().await.unwrap().cleaned, 1);

    let kept = env.device(&device);
    assert_eq!(kept.state, EntryState::Offline);
    assert!(!kept.is_pending());
    assert_eq!(kept.bricks.len(), 1);
    assert!(!env.volume("vol1").is_pending());
    assert_eq!(env.bricks().len(), 3);
    // only the staged replacement was destroyed
    assert_eq!(env.executor.brick_count(), 3);
    assert_eq!(env.executor.volume("vol1").map(|b| b.len()), Some(3));
    assert_eq!(env.used_gib(), 30);
    assert_eq!(env.pending_count(), 0);
}
