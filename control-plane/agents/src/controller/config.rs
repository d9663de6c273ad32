use std::time::Duration;
use stor_port::types::v0::transport::Durability;

/// Configuration of block hosting volumes which are created on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockHostingConfig {
    /// Create a hosting volume when no existing one can fit a new block volume.
    pub auto_create: bool,
    /// Size of the hosting volumes created on demand, in GiB.
    pub size_gib: u64,
    /// Share of a hosting volume which is not handed out to block volumes.
    pub reserved_percent: u64,
    /// Durability of the hosting volumes created on demand.
    pub durability: Durability,
}

impl Default for BlockHostingConfig {
    fn default() -> Self {
        Self {
            auto_create: true,
            size_gib: utils::DEFAULT_BLOCK_HOSTING_VOLUME_SIZE_GIB,
            reserved_percent: utils::DEFAULT_BLOCK_HOSTING_RESERVED_PERCENT,
            durability: Durability::Replicate {
                replica: utils::DEFAULT_BLOCK_HOSTING_REPLICA,
            },
        }
    }
}

/// Core configuration, fixed at start up and shared by every operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    max_inflight_operations: usize,
    brick_min_size_kib: u64,
    brick_max_size_kib: u64,
    brick_max_num: usize,
    max_volumes_per_cluster: usize,
    strict_zone_checking: bool,
    block_hosting: BlockHostingConfig,
    volume_create_retries: u32,
    cleaner_period: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_inflight_operations: utils::DEFAULT_MAX_INFLIGHT_OPERATIONS,
            brick_min_size_kib: utils::DEFAULT_BRICK_MIN_SIZE_GIB * utils::GIB_TO_KIB,
            brick_max_size_kib: utils::DEFAULT_BRICK_MAX_SIZE_GIB * utils::GIB_TO_KIB,
            brick_max_num: utils::DEFAULT_BRICK_MAX_NUM,
            max_volumes_per_cluster: utils::DEFAULT_MAX_VOLUMES_PER_CLUSTER,
            strict_zone_checking: false,
            block_hosting: BlockHostingConfig::default(),
            volume_create_retries: utils::DEFAULT_VOLUME_CREATE_RETRIES,
            cleaner_period: utils::CLEANER_PERIOD,
        }
    }
}

impl CoreConfig {
    /// Set the maximum number of normal operations in flight.
    #[must_use]
    pub fn with_max_inflight_operations(mut self, limit: usize) -> Self {
        self.max_inflight_operations = limit;
        self
    }
    /// Set the brick size bounds, in KiB.
    #[must_use]
    pub fn with_brick_size_kib(mut self, min: u64, max: u64) -> Self {
        self.brick_min_size_kib = min;
        self.brick_max_size_kib = max;
        self
    }
    /// Set the maximum number of bricks of a volume.
    #[must_use]
    pub fn with_brick_max_num(mut self, max: usize) -> Self {
        self.brick_max_num = max;
        self
    }
    /// Set the maximum number of volumes in a cluster.
    #[must_use]
    pub fn with_max_volumes_per_cluster(mut self, max: usize) -> Self {
        self.max_volumes_per_cluster = max;
        self
    }
    /// Require the bricks of a set to be placed in distinct zones.
    #[must_use]
    pub fn with_strict_zone_checking(mut self, strict: bool) -> Self {
        self.strict_zone_checking = strict;
        self
    }
    /// Set the block hosting configuration.
    #[must_use]
    pub fn with_block_hosting(mut self, block_hosting: BlockHostingConfig) -> Self {
        self.block_hosting = block_hosting;
        self
    }
    /// Set the retry budget of volume creation.
    #[must_use]
    pub fn with_volume_create_retries(mut self, retries: u32) -> Self {
        self.volume_create_retries = retries;
        self
    }
    /// Set the period of the operation cleaner.
    #[must_use]
    pub fn with_cleaner_period(mut self, period: Duration) -> Self {
        self.cleaner_period = period;
        self
    }

    /// Maximum number of normal operations in flight.
    pub fn max_inflight_operations(&self) -> usize {
        self.max_inflight_operations
    }
    /// Minimum brick size in KiB.
    pub fn brick_min_size_kib(&self) -> u64 {
        self.brick_min_size_kib
    }
    /// Maximum brick size in KiB.
    pub fn brick_max_size_kib(&self) -> u64 {
        self.brick_max_size_kib
    }
    /// Maximum number of bricks of a volume.
    pub fn brick_max_num(&self) -> usize {
        self.brick_max_num
    }
    /// Maximum number of volumes in a cluster.
    pub fn max_volumes_per_cluster(&self) -> usize {
        self.max_volumes_per_cluster
    }
    /// Whether the bricks of a set must be placed in distinct zones.
    pub fn strict_zone_checking(&self) -> bool {
        self.strict_zone_checking
    }
    /// Block hosting configuration.
    pub fn block_hosting(&self) -> &BlockHostingConfig {
        &self.block_hosting
    }
    /// Retry budget of volume creation.
    pub fn volume_create_retries(&self) -> u32 {
        self.volume_create_retries
    }
    /// Period of the operation cleaner.
    pub fn cleaner_period(&self) -> Duration {
        self.cleaner_period
    }
}
