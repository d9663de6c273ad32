//! In-memory completion notifier for operations which run in the background.
//! A client polls the task until it's completed with the resulting resource url or failed.

use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Status of an asynchronous task.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TaskStatus {
    /// Still running.
    Pending,
    /// Completed, with the url of the resulting resource.
    Completed(String),
    /// Failed, with the error message.
    Failed(String),
}

/// Registry of asynchronous tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<String, TaskStatus>>>,
}

impl TaskRegistry {
    /// New empty registry.
    pub fn new() -> Self {
        Self::default()
    }
    /// Register a new pending task.
    pub fn register(&self) -> TaskHandle {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.tasks.lock().insert(id.clone(), TaskStatus::Pending);
        TaskHandle {
            id,
            registry: self.clone(),
        }
    }
    /// Current status of the task.
    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        self.tasks.lock().get(id).cloned()
    }
    /// Forget the task, typically once its outcome has been delivered.
    pub fn remove(&self, id: &str) -> Option<TaskStatus> {
        self.tasks.lock().remove(id)
    }
    /// Poll the task every `period` until it's no longer pending.
    pub async fn wait(&self, id: &str, period: Duration) -> Option<TaskStatus> {
        loop {
            match self.status(id)? {
                TaskStatus::Pending => tokio::time::sleep(period).await,
                status => return Some(status),
            }
        }
    }
    fn set(&self, id: &str, status: TaskStatus) {
        self.tasks.lock().insert(id.to_string(), status);
    }
}

/// Handle used by the background task to report its outcome.
#[derive(Debug)]
pub struct TaskHandle {
    id: String,
    registry: TaskRegistry,
}

impl TaskHandle {
    /// Id of the task.
    pub fn id(&self) -> &str {
        &self.id
    }
    /// Report the url of the resulting resource.
    pub fn complete(self, url: String) {
        self.registry.set(&self.id, TaskStatus::Completed(url));
    }
    /// Report the failure.
    pub fn fail(self, message: String) {
        self.registry.set(&self.id, TaskStatus::Failed(message));
    }
}
