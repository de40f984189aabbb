//! Task collection and the store that keeps it in sync with the server.
//!
//! `TaskCollection` is the in-memory, ordered cache of the active project's
//! tasks. `TaskStore` owns one behind a shared handle, performs CRUD calls
//! against the `TaskApi`, and broadcasts a revision number on every change so
//! any number of views can re-render.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::{ApiError, TaskApi};
use crate::fields::Status;
use crate::task::{NewTask, Task, TaskPatch};

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} is not loaded")]
    TaskNotFound(u64),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Ordered tasks for one project. Column contents are this order filtered by
/// status.
#[derive(Debug, Default)]
pub struct TaskCollection {
    tasks: Vec<Task>,
    dirty: bool,
}

impl TaskCollection {
    pub fn new(tasks: Vec<Task>) -> Self {
        TaskCollection { tasks, dirty: false }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Replace the whole collection.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.dirty = true;
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Position of a task in collection order.
    pub fn position(&self, id: u64) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Tasks with the given status, in collection order.
    pub fn column(&self, status: Status) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    /// Add a freshly created task at the front.
    pub fn insert_front(&mut self, task: Task) {
        self.tasks.insert(0, task);
        self.dirty = true;
    }

    /// Swap in a new record for an already loaded task, keeping its position.
    /// Returns false if the task is not loaded.
    pub fn replace_task(&mut self, task: Task) -> bool {
        match self.position(task.id) {
            Some(idx) => {
                self.tasks[idx] = task;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u64) -> Option<Task> {
        let idx = self.position(id)?;
        self.dirty = true;
        Some(self.tasks.remove(idx))
    }

    /// Put a loaded task back exactly as it was: same record, same position.
    /// Does nothing if the task has since been removed.
    pub fn restore(&mut self, task: Task, index: usize) -> bool {
        let Some(current) = self.position(task.id) else {
            return false;
        };
        self.tasks.remove(current);
        let index = index.min(self.tasks.len());
        self.tasks.insert(index, task);
        self.dirty = true;
        true
    }

    /// Set a task's status and move it to `index` within that status column.
    /// An index past the end of the column appends to it.
    pub fn place(&mut self, id: u64, status: Status, index: usize) -> bool {
        let Some(mut task) = self.remove(id) else {
            return false;
        };
        task.status = status;

        let column: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == status)
            .map(|(i, _)| i)
            .collect();

        let at = match (column.get(index), column.last()) {
            (Some(&before), _) => before,
            (None, Some(&last)) => last + 1,
            (None, None) => self.tasks.len(),
        };
        self.tasks.insert(at, task);
        true
    }

    fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

/// A short user-visible message about a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub task_id: Option<u64>,
    pub message: String,
}

impl Notice {
    pub fn new(task_id: Option<u64>, message: impl Into<String>) -> Self {
        Notice { task_id, message: message.into() }
    }
}

#[derive(Default)]
struct StoreState {
    collection: TaskCollection,
    project_id: Option<u64>,
    loading: bool,
    error: Option<String>,
    notices: VecDeque<Notice>,
}

/// Cloneable handle to the task collection of the active project.
#[derive(Clone)]
pub struct TaskStore {
    state: Arc<Mutex<StoreState>>,
    api: Arc<dyn TaskApi>,
    revision: Arc<watch::Sender<u64>>,
}

impl TaskStore {
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        let (revision, _) = watch::channel(0);
        TaskStore {
            state: Arc::new(Mutex::new(StoreState::default())),
            api,
            revision: Arc::new(revision),
        }
    }

    pub fn api(&self) -> &Arc<dyn TaskApi> {
        &self.api
    }

    /// Receiver that observes a new revision after every collection change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// Read the collection under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&TaskCollection) -> R) -> R {
        f(&self.state.lock().collection)
    }

    /// Mutate the collection under the lock. Observers are notified if the
    /// closure changed anything.
    pub fn edit<R>(&self, f: impl FnOnce(&mut TaskCollection) -> R) -> R {
        let (result, changed) = {
            let mut state = self.state.lock();
            let result = f(&mut state.collection);
            (result, state.collection.take_dirty())
        };
        if changed {
            self.bump();
        }
        result
    }

    pub fn task(&self, id: u64) -> Option<Task> {
        self.read(|c| c.get(id).cloned())
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read(|c| c.tasks().to_vec())
    }

    pub fn project_id(&self) -> Option<u64> {
        self.state.lock().project_id
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn push_notice(&self, notice: Notice) {
        self.state.lock().notices.push_back(notice);
        self.bump();
    }

    /// Drain all queued notices, oldest first.
    pub fn take_notices(&self) -> Vec<Notice> {
        self.state.lock().notices.drain(..).collect()
    }

    /// Load the tasks of a project, replacing whatever was loaded before.
    /// On failure the collection is emptied and the error remembered.
    pub async fn fetch_tasks(&self, project_id: u64) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock();
            state.loading = true;
            state.error = None;
            state.project_id = Some(project_id);
        }

        let result = self.api.fetch_tasks(project_id).await;

        let outcome = {
            let mut state = self.state.lock();
            state.loading = false;
            let outcome = match result {
                Ok(tasks) => {
                    let (scoped, foreign): (Vec<Task>, Vec<Task>) =
                        tasks.into_iter().partition(|t| t.project_id == project_id);
                    if !foreign.is_empty() {
                        warn!(project_id, dropped = foreign.len(), "server returned tasks from another project");
                    }
                    info!(project_id, count = scoped.len(), "tasks loaded");
                    state.collection.replace_all(scoped);
                    Ok(())
                }
                Err(e) => {
                    warn!(project_id, error = %e, "fetch tasks failed");
                    state.error = Some(e.to_string());
                    state.collection.replace_all(Vec::new());
                    Err(StoreError::from(e))
                }
            };
            state.collection.take_dirty();
            outcome
        };
        self.bump();
        outcome
    }

    /// Create a task on the server and add the returned record.
    pub async fn add_task(&self, task: NewTask) -> Result<Task, StoreError> {
        if task.title.trim().is_empty() {
            return Err(StoreError::InvalidInput("Task title cannot be empty".into()));
        }
        let created = self.api.create_task(&task).await.inspect_err(|e| {
            warn!(error = %e, "add task failed");
        })?;
        if self.project_id().map_or(true, |p| p == created.project_id) {
            self.edit(|c| c.insert_front(created.clone()));
        }
        info!(id = created.id, "task created");
        Ok(created)
    }

    /// Send a full or partial update and take the server's record as-is.
    pub async fn update_task(&self, id: u64, patch: TaskPatch) -> Result<Task, StoreError> {
        if patch.is_empty() {
            return Err(StoreError::InvalidInput("Nothing to update".into()));
        }
        if matches!(&patch.title, Some(t) if t.trim().is_empty()) {
            return Err(StoreError::InvalidInput("Task title cannot be empty".into()));
        }
        let updated = self.api.update_task(id, &patch).await.inspect_err(|e| {
            warn!(id, error = %e, "update task failed");
        })?;
        self.edit(|c| c.replace_task(updated.clone()));
        Ok(updated)
    }

    pub async fn delete_task(&self, id: u64) -> Result<(), StoreError> {
        self.api.delete_task(id).await.inspect_err(|e| {
            warn!(id, error = %e, "delete task failed");
        })?;
        self.edit(|c| c.remove(id));
        info!(id, "task deleted");
        Ok(())
    }
}
