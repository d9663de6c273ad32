//! The interface to the remote storage nodes.
//! Every call is synchronous from the caller's point of view and may fail with a
//! `SvcError::RemoteCommand`.

use crate::errors::SvcError;
use stor_port::types::v0::transport::{
    BlockVolumeInfo, BrickInfo, CloneVolume, CreateBlockVolume, CreateBrick, CreateVolume,
    DestroyBlockVolume, DestroyBrick, ExpandVolume, ReplaceBrick, VolumeInfo,
};

/// Runs commands on the storage nodes.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// Create a brick on `host`.
    async fn brick_create(&self, host: &str, request: &CreateBrick) -> Result<BrickInfo, SvcError>;
    /// Destroy a brick on `host`.
    /// Returns true if the space of the brick was returned to its device.
    async fn brick_destroy(&self, host: &str, request: &DestroyBrick) -> Result<bool, SvcError>;
    /// Create a volume out of already created bricks.
    async fn volume_create(&self, host: &str, request: &CreateVolume)
        -> Result<VolumeInfo, SvcError>;
    /// Add brick sets to a volume.
    async fn volume_expand(&self, host: &str, request: &ExpandVolume)
        -> Result<VolumeInfo, SvcError>;
    /// Stop and delete a volume.
    async fn volume_destroy(&self, host: &str, name: &str) -> Result<(), SvcError>;
    /// Swap a brick of a volume for another one.
    async fn volume_replace_brick(&self, host: &str, request: &ReplaceBrick)
        -> Result<(), SvcError>;
    /// Get the current layout of a volume.
    async fn volume_info(&self, host: &str, name: &str) -> Result<VolumeInfo, SvcError>;
    /// Clone a volume.
    async fn volume_clone(&self, host: &str, request: &CloneVolume)
        -> Result<VolumeInfo, SvcError>;
    /// Create a block volume inside its hosting volume.
    async fn block_volume_create(
        &self,
        host: &str,
        request: &CreateBlockVolume,
    ) -> Result<BlockVolumeInfo, SvcError>;
    /// Destroy a block volume.
    async fn block_volume_destroy(
        &self,
        host: &str,
        request: &DestroyBlockVolume,
    ) -> Result<(), SvcError>;
    /// Check if the management daemon of `host` is reachable.
    async fn daemon_check(&self, host: &str) -> Result<(), SvcError>;
}
