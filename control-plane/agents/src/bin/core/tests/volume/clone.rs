use super::create_volume;
use crate::common::{test_config, Command, TestEnv};
use agents::operations::volume_clone::VolumeCloneOperation;
use stor_port::types::v0::store::PendingMarker;

#[tokio::test]
async fn clone() {
    let env = TestEnv::new(test_config(), 3, 100);
    let source = create_volume(&env, 10, "vol1").await;

    let mut op = VolumeCloneOperation::new(&env.registry, &source.id, Some("clone1".into()));
    env.run(&mut op).await.unwrap();

    let clone = env.volume("clone1");
    assert_eq!(&clone.id, op.clone_id());
    assert_eq!(clone.origin.as_ref(), Some(&source.id));
    assert_eq!(clone.size_gib, source.size_gib);
    assert_eq!(clone.cluster, source.cluster);
    assert!(!clone.is_pending());
    assert!(!env.volume("vol1").is_pending());
    assert_eq!(env.cluster_spec().volumes.len(), 2);

    let bricks = env.bricks();
    for id in &clone.bricks {
        let brick = bricks.iter().find(|b| &b.id == id).unwrap();
        let origin = bricks
            .iter()
            .find(|b| Some(&b.id) == brick.origin.as_ref())
            .expect("clone brick has an origin");
        // clone bricks are snapshots, on the device of their origin
        assert_eq!(brick.device, origin.device);
        assert_eq!(brick.path, format!("{}_clone1", origin.path));
        assert!(!brick.is_pending());
    }
    assert_eq!(env.used_gib(), 60);
    assert_eq!(env.pending_count(), 0);
}

#[tokio::test]
async fn clone_rollback() {
    let env = TestEnv::new(test_config(), 3, 100);
    let source = create_volume(&env, 10, "vol1").await;
    env.executor.fail(Command::VolumeClone);

    let mut op = VolumeCloneOperation::new(&env.registry, &source.id, Some("clone1".into()));
    assert!(env.run(&mut op).await.is_err());

    assert_eq!(env.volumes().len(), 1);
    assert!(!env.volume("vol1").is_pending());
    assert_eq!(env.bricks().len(), 3);
    assert_eq!(env.used_gib(), 30);
    assert_eq!(env.cluster_spec().volumes, vec![source.id]);
    assert_eq!(env.pending_count(), 0);
}
