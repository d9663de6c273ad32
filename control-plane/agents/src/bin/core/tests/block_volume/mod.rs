#![cfg(test)]

use crate::common::{test_config, Command, TestEnv};
use agents::{
    controller::config::{BlockHostingConfig, CoreConfig},
    errors::SvcError,
    operations::{
        block_volume_create::{BlockVolumeCreateOperation, BlockVolumeCreateRequest},
        block_volume_delete::BlockVolumeDeleteOperation,
        volume_delete::VolumeDeleteOperation,
        Operation,
    },
};
use stor_port::types::v0::{
    store::{block_volume::BlockVolumeSpec, volume::VolumeSpec, PendingMarker},
    transport::Durability,
};

fn block_config(auto_create: bool) -> CoreConfig {
    test_config().with_block_hosting(BlockHostingConfig {
        auto_create,
        size_gib: 100,
        reserved_percent: 2,
        durability: Durability::Replicate { replica: 3 },
    })
}

fn request(size_gib: u64, name: &str) -> BlockVolumeCreateRequest {
    BlockVolumeCreateRequest {
        size_gib,
        name: Some(name.to_string()),
        ha: 3,
        ..Default::default()
    }
}

fn block_volumes(env: &TestEnv) -> Vec<BlockVolumeSpec> {
    env.registry.specs::<BlockVolumeSpec>().unwrap()
}

fn hosting_volumes(env: &TestEnv) -> Vec<VolumeSpec> {
    env.volumes()
        .into_iter()
        .filter(|v| v.is_block_hosting())
        .collect()
}

async fn create_block_volume(env: &TestEnv, size_gib: u64, name: &str) -> BlockVolumeSpec {
    let mut op = BlockVolumeCreateOperation::new(&env.registry, request(size_gib, name)).unwrap();
    env.run(&mut op).await.unwrap();
    block_volumes(env)
        .into_iter()
        .find(|b| &b.id == op.block_volume_id())
        .unwrap()
}

#[tokio::test]
async fn create_with_hosting_volume() {
    let env = TestEnv::new(block_config(true), 3, 200);
    let block = create_block_volume(&env, 10, "block1").await;

    let hosting = hosting_volumes(&env);
    assert_eq!(hosting.len(), 1);
    let hosting = &hosting[0];
    assert!(!hosting.is_pending());
    assert_eq!(hosting.size_gib, 100);
    assert_eq!(hosting.block_info.reserved_size_gib, 2);
    assert_eq!(hosting.block_info.free_size_gib, 88);
    assert_eq!(hosting.block_info.block_volumes, vec![block.id.clone()]);

    assert!(!block.is_pending());
    assert_eq!(block.hosting_volume, hosting.id);
    assert_eq!(block.export.hosts.len(), 3);
    assert!(block.export.iqn.ends_with(block.id.as_str()));
    assert!(env.executor.has_block_volume("block1"));
    assert_eq!(env.cluster_spec().block_volumes, vec![block.id]);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn create_in_existing_hosting_volume() {
    let env = TestEnv::new(block_config(true), 3, 200);
    create_block_volume(&env, 10, "block1").await;
    create_block_volume(&env, 20, "block2").await;

    let hosting = hosting_volumes(&env);
    assert_eq!(hosting.len(), 1);
    assert_eq!(hosting[0].block_info.free_size_gib, 68);
    assert_eq!(hosting[0].block_info.block_volumes.len(), 2);
    assert_eq!(env.used_gib(), 300);
}

#[tokio::test]
async fn hosting_volume_limits() {
    let env = TestEnv::new(block_config(true), 3, 200);
    let mut op = BlockVolumeCreateOperation::new(&env.registry, request(99, "block1")).unwrap();
    let error = op.build().unwrap_err();
    assert!(
        matches!(error, SvcError::BlockHostingTooSmall { size_gib: 99, free_gib: 98 }),
        "{error}"
    );

    let env = TestEnv::new(block_config(false), 3, 200);
    let mut op = BlockVolumeCreateOperation::new(&env.registry, request(10, "block1")).unwrap();
    let error = op.build().unwrap_err();
    assert!(matches!(error, SvcError::BlockHostingDisabled { .. }), "{error}");
    assert!(env.volumes().is_empty());
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn single_hosting_volume_in_flight() {
    let env = TestEnv::new(block_config(true), 3, 500);
    let mut first = BlockVolumeCreateOperation::new(&env.registry, request(10, "block1")).unwrap();
    first.build().unwrap();

    let mut second = BlockVolumeCreateOperation::new(&env.registry, request(10, "block2")).unwrap();
    let error = second.build().unwrap_err();
    assert!(matches!(error, SvcError::HostingVolumePending {}), "{error}");

    env.run_after_build(&mut first).await.unwrap();
    create_block_volume(&env, 10, "block2").await;
    assert_eq!(hosting_volumes(&env).len(), 1);
}

#[tokio::test]
async fn create_rollback_with_hosting_volume() {
    let env = TestEnv::new(block_config(true), 3, 200);
    env.executor.fail(Command::BlockVolumeCreate);

    let mut op = BlockVolumeCreateOperation::new(&env.registry, request(10, "block1")).unwrap();
    assert!(env.run(&mut op).await.is_err());

    assert!(block_volumes(&env).is_empty());
    assert!(env.volumes().is_empty());
    assert!(env.bricks().is_empty());
    assert_eq!(env.used_gib(), 0);
    assert!(env.cluster_spec().block_volumes.is_empty());
    assert!(env.cluster_spec().volumes.is_empty());
    assert_eq!(env.executor.brick_count(), 0);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn create_rollback_keeps_hosting_volume() {
    let env = TestEnv::new(block_config(true), 3, 200);
    create_block_volume(&env, 10, "block1").await;
    env.executor.fail(Command::BlockVolumeCreate);

    let mut op = BlockVolumeCreateOperation::new(&env.registry, request(20, "block2")).unwrap();
    assert!(env.run(&mut op).await.is_err());

    let hosting = hosting_volumes(&env);
    assert_eq!(hosting.len(), 1);
    assert_eq!(hosting[0].block_info.free_size_gib, 88);
    assert_eq!(hosting[0].block_info.block_volumes.len(), 1);
    assert_eq!(block_volumes(&env).len(), 1);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn delete() {
    let env = TestEnv::new(block_config(true), 3, 200);
    let block = create_block_volume(&env, 10, "block1").await;

    let mut op = BlockVolumeDeleteOperation::new(&env.registry, &block.id);
    env.run(&mut op).await.unwrap();

    assert!(block_volumes(&env).is_empty());
    assert!(!env.executor.has_block_volume("block1"));
    let hosting = hosting_volumes(&env);
    assert_eq!(hosting[0].block_info.free_size_gib, 98);
    assert!(hosting[0].block_info.block_volumes.is_empty());
    assert!(env.cluster_spec().block_volumes.is_empty());
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn delete_rollback() {
    let env = TestEnv::new(block_config(true), 3, 200);
    let block = create_block_volume(&env, 10, "block1").await;
    env.executor.fail(Command::BlockVolumeDestroy);

    let mut op = BlockVolumeDeleteOperation::new(&env.registry, &block.id);
    assert!(env.run(&mut op).await.is_err());

    let blocks = block_volumes(&env);
    assert_eq!(blocks.len(), 1);
    assert!(!blocks[0].is_pending());
    assert_eq!(hosting_volumes(&env)[0].block_info.free_size_gib, 88);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn hosting_volume_in_use() {
    let env = TestEnv::new(block_config(true), 3, 200);
    let block = create_block_volume(&env, 10, "block1").await;

    let mut op = VolumeDeleteOperation::new(&env.registry, &block.hosting_volume);
    let error = op.build().unwrap_err();
    assert!(matches!(error, SvcError::InUse { .. }), "{error}");
    assert_eq!(env.pending_count(), 0);
}
