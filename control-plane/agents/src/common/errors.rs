use snafu::Snafu;
use stor_port::{
    transport_api::ResourceKind,
    types::v0::{
        store::definitions::StoreError,
        transport::{ClusterId, OperationId},
    },
};

/// Common error type for the core operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub), context(suffix(false)))]
#[allow(missing_docs)]
pub enum SvcError {
    #[snafu(display("{} '{}' not found", kind.to_string(), id))]
    NotFound { kind: ResourceKind, id: String },
    #[snafu(display(
        "{} '{}' is already being modified by operation '{}'",
        kind.to_string(),
        id,
        operation
    ))]
    Conflict {
        kind: ResourceKind,
        id: String,
        operation: OperationId,
    },
    #[snafu(display("No space available for {} GiB", size_gib))]
    NoSpace { size_gib: u64 },
    #[snafu(display(
        "{} GiB would need {} bricks, the maximum is {}",
        size_gib,
        bricks,
        max
    ))]
    MaxBricks {
        size_gib: u64,
        bricks: usize,
        max: usize,
    },
    #[snafu(display(
        "Brick size of {} KiB is below the minimum of {} KiB",
        size_kib,
        min_kib
    ))]
    MinimumBrickSize { size_kib: u64, min_kib: u64 },
    #[snafu(display("Cluster '{}' has no nodes", cluster))]
    EmptyCluster { cluster: ClusterId },
    #[snafu(display("Cluster '{}' has no online storage devices", cluster))]
    NoStorage { cluster: ClusterId },
    #[snafu(display("No clusters available"))]
    NoClusters {},
    #[snafu(display(
        "Cluster '{}' already has {} volumes, the maximum is {}",
        cluster,
        count,
        limit
    ))]
    MaxVolumes {
        cluster: ClusterId,
        count: usize,
        limit: usize,
    },
    #[snafu(display("Server handling too many operations, limit is {}", limit))]
    TooManyOperations { limit: usize },
    #[snafu(display("{}", cause))]
    Retryable { cause: Box<SvcError> },
    #[snafu(display("Operation '{}' of kind '{}' cannot be loaded", id, kind))]
    NotLoadable { id: OperationId, kind: String },
    #[snafu(display("Command '{}' failed on host '{}': {}", command, host, message))]
    RemoteCommand {
        host: String,
        command: String,
        message: String,
    },
    #[snafu(display("All {} {}: {}", count, targets, message))]
    AllTargets {
        count: usize,
        targets: String,
        message: String,
    },
    #[snafu(display("Errors on {} {}:{}", count, targets, details))]
    Targets {
        count: usize,
        targets: String,
        details: String,
    },
    #[snafu(display("{} '{}' is in use by {}", kind.to_string(), id, users))]
    InUse {
        kind: ResourceKind,
        id: String,
        users: String,
    },
    #[snafu(display("Invalid arguments: {}", message))]
    InvalidArguments { message: String },
    #[snafu(display("{} '{}' is {}", kind.to_string(), id, state))]
    InvalidState {
        kind: ResourceKind,
        id: String,
        state: String,
    },
    #[snafu(display("A block hosting volume is already being created, try again later"))]
    HostingVolumePending {},
    #[snafu(display(
        "No block hosting volume has {} GiB free and auto creation of block hosting volumes is disabled",
        size_gib
    ))]
    BlockHostingDisabled { size_gib: u64 },
    #[snafu(display(
        "Block volume of {} GiB does not fit in a new block hosting volume with {} GiB free",
        size_gib,
        free_gib
    ))]
    BlockHostingTooSmall { size_gib: u64, free_gib: u64 },
    #[snafu(display("Internal error: {}", details))]
    Internal { details: String },
    #[snafu(display("Store operation failed"))]
    Store { source: StoreError },
    #[snafu(display("Entry with key '{}' not found in the store", key))]
    StoreMissingEntry { key: String },
}

impl From<StoreError> for SvcError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::MissingEntry { key } => Self::StoreMissingEntry { key },
            _ => Self::Store { source },
        }
    }
}

impl SvcError {
    /// Mark the error as recoverable by staging and executing the operation again.
    pub fn retryable(self) -> Self {
        match self {
            Self::Retryable { .. } => self,
            cause => Self::Retryable {
                cause: Box::new(cause),
            },
        }
    }
    /// Check if the error is recoverable by staging and executing the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
    /// Get the underlying cause and whether it was marked as retryable.
    pub fn unwrap_retryable(self) -> (Self, bool) {
        match self {
            Self::Retryable { cause } => (cause.unwrap_retryable().0, true),
            other => (other, false),
        }
    }
}
