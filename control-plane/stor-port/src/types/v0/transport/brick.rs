use super::*;

/// Create a brick on the device of a storage host.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct CreateBrick {
    /// Id of the brick.
    pub id: BrickId,
    /// Storage host which owns the device.
    pub host: String,
    /// Name of the device on the host, eg: /dev/sdb.
    pub device: String,
    /// Size of the brick in KiB.
    pub size_kib: u64,
    /// Mount path for the brick.
    pub path: String,
}

/// Destroy a brick.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct DestroyBrick {
    /// Id of the brick.
    pub id: BrickId,
    /// Storage host which owns the device.
    pub host: String,
    /// Name of the device on the host.
    pub device: String,
    /// Mount path of the brick.
    pub path: String,
}

/// A brick as reported by the storage host once it's been created.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct BrickInfo {
    /// Id of the brick.
    pub id: BrickId,
    /// Mount path of the brick.
    pub path: String,
    /// Actual size of the brick in KiB.
    pub size_kib: u64,
}
