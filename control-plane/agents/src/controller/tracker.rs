//! Admission control of the operations in flight.
//! Normal operations are bounded by a limit, while a single background operation (eg: the
//! cleaner) may run alongside them.

use crate::errors::SvcError;
use parking_lot::Mutex;
use std::{collections::HashSet, sync::Arc};

/// The class an operation is tracked under.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OperationClass {
    /// Operations requested by a client.
    Normal,
    /// Housekeeping operations, only one may run at a time.
    Background,
}

#[derive(Debug, Default)]
struct Tracked {
    normal: HashSet<String>,
    background: HashSet<String>,
}

impl Tracked {
    fn set(&mut self, class: OperationClass) -> &mut HashSet<String> {
        match class {
            OperationClass::Normal => &mut self.normal,
            OperationClass::Background => &mut self.background,
        }
    }
    fn throttled(&self, limit: usize, class: OperationClass) -> bool {
        (class == OperationClass::Background && !self.background.is_empty())
            || self.normal.len() >= limit
    }
    fn add(&mut self, id: &str, class: OperationClass) {
        if self.normal.contains(id) || self.background.contains(id) {
            tracing::error!(id, ?class, "Operation is already tracked");
            return;
        }
        self.set(class).insert(id.to_string());
    }
}

/// Tracks the identifiers of the operations in flight.
#[derive(Debug)]
pub struct OpTracker {
    limit: usize,
    tracked: Mutex<Tracked>,
}

impl OpTracker {
    /// New tracker which admits up to `limit` normal operations.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            tracked: Mutex::new(Tracked::default()),
        }
    }
    /// The limit of normal operations.
    pub fn limit(&self) -> usize {
        self.limit
    }
    /// Track the operation `id` under `class`, unconditionally.
    pub fn add(&self, id: &str, class: OperationClass) {
        self.tracked.lock().add(id, class);
    }
    /// Atomically check the capacity and track `id` if there's room.
    /// Returns true if the operation was throttled and therefore not tracked.
    pub fn throttle_or_add(&self, id: &str, class: OperationClass) -> bool {
        let mut tracked = self.tracked.lock();
        if tracked.throttled(self.limit, class) {
            return true;
        }
        tracked.add(id, class);
        false
    }
    /// Like `throttle_or_add` but for callers without an identifier of their own.
    /// Returns the token the operation is tracked under, or None if throttled.
    pub fn throttle_or_token(&self, class: OperationClass) -> Option<String> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        match self.throttle_or_add(&token, class) {
            true => None,
            false => Some(token),
        }
    }
    /// Stop tracking the operation `id`.
    pub fn remove(&self, id: &str) {
        let mut tracked = self.tracked.lock();
        if !tracked.normal.remove(id) && !tracked.background.remove(id) {
            tracing::error!(id, "Operation is not tracked");
        }
    }
    /// Total number of operations in flight.
    pub fn get(&self) -> usize {
        let tracked = self.tracked.lock();
        tracked.normal.len() + tracked.background.len()
    }

    /// Track the operation `id` until the returned guard is dropped.
    /// Fails with `TooManyOperations` when throttled.
    pub fn track(self: &Arc<Self>, id: &str, class: OperationClass) -> Result<TrackedOp, SvcError> {
        match self.throttle_or_add(id, class) {
            true => Err(SvcError::TooManyOperations { limit: self.limit }),
            false => Ok(TrackedOp {
                id: id.to_string(),
                tracker: self.clone(),
            }),
        }
    }
    /// Track a token until the returned guard is dropped.
    /// Fails with `TooManyOperations` when throttled.
    pub fn track_token(self: &Arc<Self>, class: OperationClass) -> Result<TrackedOp, SvcError> {
        match self.throttle_or_token(class) {
            None => Err(SvcError::TooManyOperations { limit: self.limit }),
            Some(id) => Ok(TrackedOp {
                id,
                tracker: self.clone(),
            }),
        }
    }
}

/// An operation tracked by the `OpTracker`, untracked when dropped.
#[derive(Debug)]
pub struct TrackedOp {
    id: String,
    tracker: Arc<OpTracker>,
}
impl TrackedOp {
    /// The id the operation is tracked under.
    pub fn id(&self) -> &str {
        &self.id
    }
}
impl Drop for TrackedOp {
    fn drop(&mut self) {
        self.tracker.remove(&self.id);
    }
}
