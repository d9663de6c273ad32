use super::*;

/// Create a block volume inside a hosting volume.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct CreateBlockVolume {
    /// Id of the block volume.
    pub id: BlockVolumeId,
    /// Name of the block volume.
    pub name: String,
    /// Name of the hosting volume.
    pub hosting_volume: String,
    /// Requested size in GiB.
    pub size_gib: u64,
    /// Number of target hosts exporting the block volume.
    pub ha: u32,
    /// Candidate target hosts.
    pub hosts: Vec<String>,
    /// Generate chap credentials.
    pub auth: bool,
}

/// Destroy a block volume.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct DestroyBlockVolume {
    /// Name of the block volume.
    pub name: String,
    /// Name of the hosting volume.
    pub hosting_volume: String,
}

/// A block volume as reported by the remote system.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Default)]
pub struct BlockVolumeInfo {
    /// Assigned size in GiB.
    pub size_gib: u64,
    /// Number of target hosts.
    pub ha: u32,
    /// Hosts exporting the block volume.
    pub hosts: Vec<String>,
    /// Iscsi qualified name.
    pub iqn: String,
    /// Logical unit number.
    pub lun: u32,
    /// Chap username.
    pub username: String,
    /// Chap password.
    pub password: String,
}
