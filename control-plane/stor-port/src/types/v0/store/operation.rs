//! Definition of the pending operation record that can be saved to the persistent store.
//! A record is written when an operation stages its change and removed once the change has
//! been committed or compensated. Records left behind by a restart are resumed by the cleaner.

use crate::types::v0::{
    store::definitions::{key_prefix_obj, ApiVersion, ObjectKey, StorableObject, StorableObjectType},
    transport::OperationId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The kind of operation which owns a pending record.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Display,
    AsRefStr,
    EnumString,
)]
pub enum OperationKind {
    CreateVolume,
    DeleteVolume,
    ExpandVolume,
    CreateBlockVolume,
    DeleteBlockVolume,
    RemoveDevice,
    CloneVolume,
    /// A kind written by a newer version, which this version cannot resume.
    #[serde(other)]
    Unknown,
}

/// Status of a pending record.
#[derive(
    Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Default, Display, AsRefStr,
)]
pub enum OperationStatus {
    /// Owned by a live operation.
    #[default]
    New,
    /// Left behind by a previous run, its exec may not have completed.
    Stale,
    /// Rollback failed, needs administrative cleanup.
    Failed,
}

/// The change recorded by an action of the log.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Display, AsRefStr)]
pub enum ChangeKind {
    AddBrick,
    DeleteBrick,
    AddVolume,
    DeleteVolume,
    ExpandVolume,
    AddBlockVolume,
    DeleteBlockVolume,
    AddHostingVolume,
    RemoveDevice,
    CloneVolume,
}

/// One entry of the action log.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct PendingAction {
    /// The change.
    pub change: ChangeKind,
    /// Id of the affected entity.
    pub id: String,
    /// Size delta in GiB, for expansions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_gib: Option<u64>,
}

/// Durable record of an in-flight operation and its ordered action log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PendingOperation {
    /// Id of the record, never reused.
    pub id: OperationId,
    /// Operation which produced the record.
    pub kind: OperationKind,
    /// Current status.
    pub status: OperationStatus,
    /// Ordered action log.
    pub actions: Vec<PendingAction>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl PendingOperation {
    /// New record for the given operation kind.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            status: OperationStatus::New,
            actions: vec![],
            timestamp: Utc::now(),
        }
    }
    /// Append a change of the entity `id` to the action log.
    pub fn record(&mut self, change: ChangeKind, id: impl ToString) {
        self.actions.push(PendingAction {
            change,
            id: id.to_string(),
            delta_gib: None,
        });
    }
    /// Append a size change of the entity `id` to the action log.
    pub fn record_delta(&mut self, change: ChangeKind, id: impl ToString, delta_gib: u64) {
        self.actions.push(PendingAction {
            change,
            id: id.to_string(),
            delta_gib: Some(delta_gib),
        });
    }
    /// Ids of the entities affected by the given change, in log order.
    pub fn changed(&self, change: ChangeKind) -> impl Iterator<Item = &PendingAction> {
        self.actions.iter().filter(move |a| a.change == change)
    }
    /// Id of the first entity affected by the given change.
    pub fn first_changed(&self, change: ChangeKind) -> Option<&str> {
        self.changed(change).next().map(|a| a.id.as_str())
    }
    /// Drop the log, before the record is rebuilt.
    pub fn reset(&mut self) {
        self.actions.clear();
    }
}

/// Key used by the store to uniquely identify a PendingOperation structure.
pub struct PendingOperationKey(OperationId);

impl From<&OperationId> for PendingOperationKey {
    fn from(id: &OperationId) -> Self {
        Self(id.clone())
    }
}

impl ObjectKey for PendingOperationKey {
    type Kind = StorableObjectType;

    fn version(&self) -> ApiVersion {
        ApiVersion::V0
    }
    fn key_type(&self) -> StorableObjectType {
        StorableObjectType::PendingOperation
    }
    fn key_uuid(&self) -> String {
        self.0.to_string()
    }
}

impl StorableObject for PendingOperation {
    type Key = PendingOperationKey;

    fn key(&self) -> Self::Key {
        PendingOperationKey(self.id.clone())
    }
    fn key_prefix() -> String {
        key_prefix_obj(StorableObjectType::PendingOperation, ApiVersion::V0)
    }
}
