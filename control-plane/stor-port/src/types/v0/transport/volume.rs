use super::*;

/// How the bricks of a volume protect its data.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Durability {
    /// Every brick of a set holds a full copy of the data.
    Replicate { replica: u8 },
    /// Erasure coded set of `data + redundancy` bricks.
    Disperse { data: u8, redundancy: u8 },
    /// No protection, one brick per set.
    Distribute,
}
impl Default for Durability {
    fn default() -> Self {
        Self::Replicate { replica: 3 }
    }
}
impl std::fmt::Display for Durability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replicate { replica } => write!(f, "replicate({replica})"),
            Self::Disperse { data, redundancy } => write!(f, "disperse({data}+{redundancy})"),
            Self::Distribute => write!(f, "distribute"),
        }
    }
}
impl Durability {
    /// Number of bricks in each brick set.
    pub fn set_size(&self) -> usize {
        match self {
            Self::Replicate { replica } => *replica as usize,
            Self::Disperse { data, redundancy } => (*data + *redundancy) as usize,
            Self::Distribute => 1,
        }
    }
    /// Size of each brick of a set which provides `set_size_kib` of usable space.
    pub fn brick_size_kib(&self, set_size_kib: u64) -> u64 {
        match self {
            Self::Disperse { data, .. } if *data > 0 => set_size_kib / *data as u64,
            _ => set_size_kib,
        }
    }
    /// Whether the durability parameters can describe a volume at all.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Replicate { replica } => *replica > 0,
            Self::Disperse { data, redundancy } => *data > 0 && *redundancy > 0,
            Self::Distribute => true,
        }
    }
}

/// Create a volume from already created bricks.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct CreateVolume {
    /// Id of the volume.
    pub id: VolumeId,
    /// Name of the volume on the remote system.
    pub name: String,
    /// Durability of the volume.
    pub durability: Durability,
    /// Bricks, ordered by brick set.
    pub bricks: Vec<BrickPath>,
}

/// Add brick sets to an existing volume.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct ExpandVolume {
    /// Name of the volume.
    pub name: String,
    /// The new bricks, ordered by brick set.
    pub bricks: Vec<BrickPath>,
}

/// Swap a brick of a volume for a new one.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct ReplaceBrick {
    /// Name of the volume.
    pub name: String,
    /// The brick being replaced.
    pub old: BrickPath,
    /// The replacement brick.
    pub new: BrickPath,
}

/// Clone a volume through a snapshot of its bricks.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct CloneVolume {
    /// Name of the source volume.
    pub source: String,
    /// Name of the new volume.
    pub clone: String,
}

/// A volume as reported by the remote system.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Default)]
pub struct VolumeInfo {
    /// Name of the volume.
    pub name: String,
    /// Bricks in the on-disk order of the volume.
    pub bricks: Vec<BrickPath>,
}
