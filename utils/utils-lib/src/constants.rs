//! Various common constants used by the control plane.

use std::time::Duration;

/// Domain name for the product.
pub const PRODUCT_DOMAIN_NAME: &str = "brickyard.io";

/// Name of the product.
pub const PRODUCT_NAME: &str = "brickyard";

/// Default location of the local persistent store document.
pub const DEFAULT_STORE_PATH: &str = "/var/lib/brickyard/store.json";

/// Root directory under which bricks are mounted on the storage nodes.
pub const BRICK_MOUNT_ROOT: &str = "/var/lib/brickyard/mounts";

/// Number of KiB in a GiB, devices and bricks are accounted in KiB.
pub const GIB_TO_KIB: u64 = 1024 * 1024;

/// Maximum number of operations which may be in flight at any given time.
pub const DEFAULT_MAX_INFLIGHT_OPERATIONS: usize = 64;

/// Smallest brick which may be allocated, in GiB.
pub const DEFAULT_BRICK_MIN_SIZE_GIB: u64 = 1;

/// Largest brick which may be allocated, in GiB.
pub const DEFAULT_BRICK_MAX_SIZE_GIB: u64 = 4096;

/// Maximum number of bricks a single volume may be split into.
pub const DEFAULT_BRICK_MAX_NUM: usize = 32;

/// Maximum number of volumes (pending ones included) per cluster.
pub const DEFAULT_MAX_VOLUMES_PER_CLUSTER: usize = 1000;

/// Size of automatically created block hosting volumes, in GiB.
pub const DEFAULT_BLOCK_HOSTING_VOLUME_SIZE_GIB: u64 = 1100;

/// Percentage of a block hosting volume which is kept aside for metadata.
pub const DEFAULT_BLOCK_HOSTING_RESERVED_PERCENT: u64 = 2;

/// Replica count of automatically created block hosting volumes.
pub const DEFAULT_BLOCK_HOSTING_REPLICA: u8 = 3;

/// Number of times a volume creation is re-staged after a retryable failure.
pub const DEFAULT_VOLUME_CREATE_RETRIES: u32 = 4;

/// Upper bound on concurrent brick commands issued by a single operation.
pub const BRICK_FANOUT_LIMIT: usize = 16;

/// The period at which the operation cleaner looks for stale operations.
pub const CLEANER_PERIOD: Duration = Duration::from_secs(60);
