use super::create_volume;
use crate::common::{test_config, Command, TestEnv};
use agents::{
    errors::SvcError,
    operations::{volume_expand::VolumeExpandOperation, Operation},
};
use stor_port::types::v0::store::{
    operation::{ChangeKind, OperationKind},
    PendingMarker,
};

#[tokio::test]
async fn expand() {
    let env = TestEnv::new(test_config(), 3, 100);
    let volume = create_volume(&env, 10, "vol1").await;

    let mut op = VolumeExpandOperation::new(&env.registry, &volume.id, 10).unwrap();
    env.run(&mut op).await.unwrap();

    let volume = env.volume("vol1");
    assert!(!volume.is_pending());
    assert_eq!(volume.size_gib, 20);
    assert_eq!(volume.bricks.len(), 6);
    assert!(env.bricks().iter().all(|b| !b.is_pending()));
    assert_eq!(env.used_gib(), 60);
    assert_eq!(env.executor.volume("vol1").map(|b| b.len()), Some(6));
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn expand_records_delta() {
    let env = TestEnv::new(test_config(), 3, 100);
    let volume = create_volume(&env, 10, "vol1").await;

    let mut op = VolumeExpandOperation::new(&env.registry, &volume.id, 5).unwrap();
    op.build().unwrap();
    let record = env.registry.pending_operations().unwrap().remove(0);
    assert_eq!(record.kind, OperationKind::ExpandVolume);
    assert_eq!(record.changed(ChangeKind::AddBrick).count(), 3);
    let expand = record.changed(ChangeKind::ExpandVolume).next().unwrap();
    assert_eq!(expand.id, volume.id.to_string());
    assert_eq!(expand.delta_gib, Some(5));
}

#[tokio::test]
async fn expand_rollback() {
    let env = TestEnv::new(test_config(), 3, 100);
    let volume = create_volume(&env, 10, "vol1").await;
    env.executor.fail(Command::VolumeExpand);

    let mut op = VolumeExpandOperation::new(&env.registry, &volume.id, 10).unwrap();
    assert!(env.run(&mut op).await.is_err());

    let volume = env.volume("vol1");
    assert!(!volume.is_pending());
    assert_eq!(volume.size_gib, 10);
    assert_eq!(volume.bricks.len(), 3);
    assert_eq!(env.bricks().len(), 3);
    assert_eq!(env.used_gib(), 30);
    assert_eq!(env.executor.brick_count(), 3);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn expand_conflict() {
    let env = TestEnv::new(test_config(), 3, 100);
    let volume = create_volume(&env, 10, "vol1").await;
    let mut first = VolumeExpandOperation::new(&env.registry, &volume.id, 10).unwrap();
    first.build().unwrap();

    let mut second = VolumeExpandOperation::new(&env.registry, &volume.id, 10).unwrap();
    let error = second.build().unwrap_err();
    assert!(
        matches!(error, SvcError::Conflict { ref operation, .. } if operation == first.id()),
        "{error}"
    );
    assert!(error.to_string().contains("already being modified"));
    assert_eq!(env.pending_count(), 1);
    assert_eq!(env.bricks().len(), 6);
}

#[tokio::test]
async fn expand_invalid() {
    let env = TestEnv::new(test_config(), 3, 100);
    let volume = create_volume(&env, 10, "vol1").await;
    let error = VolumeExpandOperation::new(&env.registry, &volume.id, 0).unwrap_err();
    assert!(matches!(error, SvcError::InvalidArguments { .. }));
}
