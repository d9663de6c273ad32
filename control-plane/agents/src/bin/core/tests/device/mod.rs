#![cfg(test)]

use crate::{
    common::{test_config, Command, TestEnv},
    volume::create_volume,
};
use agents::{
    errors::SvcError,
    operations::{device_remove::DeviceRemoveOperation, Operation},
};
use stor_port::types::v0::{
    store::{EntryState, PendingMarker},
    transport::DeviceId,
};

/// The device holding the first brick of the volume.
fn first_brick_device(env: &TestEnv, name: &str) -> DeviceId {
    let volume = env.volume(name);
    env.bricks()
        .into_iter()
        .find(|b| b.id == volume.bricks[0])
        .map(|b| b.device)
        .unwrap()
}

#[tokio::test]
async fn remove_empty_device() {
    let env = TestEnv::new(test_config(), 3, 100);
    let device = env.devices[0].clone();
    env.set_device_state(&device, EntryState::Offline);

    let mut op = DeviceRemoveOperation::new(&env.registry, &device);
    env.run(&mut op).await.unwrap();

    assert!(op.emptied());
    assert_eq!(env.device(&device).state, EntryState::Failed);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn remove_online_device() {
    let env = TestEnv::new(test_config(), 3, 100);
    let mut op = DeviceRemoveOperation::new(&env.registry, &env.devices[0]);
    let error = op.build().unwrap_err();
    assert!(matches!(error, SvcError::InvalidState { .. }), "{error}");
    assert_eq!(env.device(&env.devices[0]).state, EntryState::Online);
}

#[tokio::test]
async fn remove_device_with_bricks() {
    let env = TestEnv::new(test_config(), 4, 100);
    create_volume(&env, 10, "vol1").await;
    let device = first_brick_device(&env, "vol1");
    let old_brick = env.volume("vol1").bricks[0].clone();
    env.set_device_state(&device, EntryState::Offline);

    let mut op = DeviceRemoveOperation::new(&env.registry, &device);
    env.run(&mut op).await.unwrap();
    assert!(!op.emptied());

    let removed = env.device(&device);
    assert_eq!(removed.state, EntryState::Failed);
    assert!(removed.bricks.is_empty());
    assert!(!removed.is_pending());

    let volume = env.volume("vol1");
    assert!(!volume.is_pending());
    assert_eq!(volume.bricks.len(), 3);
    assert!(!volume.bricks.contains(&old_brick));
    let bricks = env.bricks();
    assert_eq!(bricks.len(), 3);
    assert!(bricks.iter().all(|b| b.device != device && !b.is_pending()));

    // the replacement landed on the spare node, which held nothing
    for other in env.devices.iter().filter(|d| **d != device) {
        assert_eq!(env.device(other).bricks.len(), 1);
    }
    assert_eq!(env.device(&device).used_kib, 0);
    let remote = env.executor.volume("vol1").unwrap();
    assert_eq!(remote.len(), 3);
    assert!(remote.iter().all(|b| !b.path.contains(device.as_str())));
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn remove_device_rollback() {
    let env = TestEnv::new(test_config(), 4, 100);
    let volume = create_volume(&env, 10, "vol1").await;
    let device = first_brick_device(&env, "vol1");
    env.set_device_state(&device, EntryState::Offline);
    env.executor.fail(Command::VolumeReplaceBrick);

    let mut op = DeviceRemoveOperation::new(&env.registry, &device);
    assert!(env.run(&mut op).await.is_err());

    let kept = env.device(&device);
    assert_eq!(kept.state, EntryState::Offline);
    assert!(!kept.is_pending());
    assert_eq!(kept.bricks.len(), 1);
    assert_eq!(env.volume("vol1").bricks, volume.bricks);
    assert!(!env.volume("vol1").is_pending());
    assert_eq!(env.bricks().len(), 3);
    assert_eq!(env.used_gib(), 30);
    assert_eq!(env.executor.brick_count(), 3);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn remove_device_without_spare() {
    let env = TestEnv::new(test_config(), 3, 100);
    create_volume(&env, 10, "vol1").await;
    let device = first_brick_device(&env, "vol1");
    env.set_device_state(&device, EntryState::Offline);

    // every other node already holds a brick of the set
    let mut op = DeviceRemoveOperation::new(&env.registry, &device);
    let error = op.build().unwrap_err();
    assert!(matches!(error, SvcError::NoSpace { .. }), "{error}");
    assert!(!env.device(&device).is_pending());
    assert_eq!(env.pending_count(), 0);
}
