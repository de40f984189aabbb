//! In-memory stand-in for the remote API, used by unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::api::{ApiError, ApiResult, ProjectApi, TaskApi, TeamApi};
use crate::fields::{Priority, Status};
use crate::project::{NewProject, Project};
use crate::task::{Assignee, NewTask, Task, TaskPatch};
use crate::team::User;

/// A task in project 1 with no optional fields set.
pub fn task(id: u64, status: Status) -> Task {
    Task {
        id,
        title: format!("Task {id}"),
        description: None,
        status,
        priority: Priority::Medium,
        due_date: None,
        assignee: None,
        project_id: 1,
    }
}

pub fn project(id: u64, name: &str) -> Project {
    Project { id, name: name.to_string(), description: None }
}

pub fn user(id: u64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        email: None,
        role: None,
        avatar_url: None,
    }
}

#[derive(Default)]
struct FakeState {
    tasks: Vec<Task>,
    projects: Vec<Project>,
    users: Vec<User>,
    calls: Vec<String>,
    fetch_failures: VecDeque<ApiError>,
    update_replies: VecDeque<ApiResult<Task>>,
    delete_failures: VecDeque<ApiError>,
    project_failures: VecDeque<ApiError>,
    strip_assignee: bool,
}

/// Fake server. Keeps its own copy of the records, applies writes to it and
/// records every call as `"METHOD path"`.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
    update_gate: Option<Arc<Semaphore>>,
    update_started: Notify,
}

impl FakeApi {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let api = FakeApi::default();
        api.state.lock().tasks = tasks;
        api
    }

    pub fn with_projects(projects: Vec<Project>) -> Self {
        let api = FakeApi::default();
        api.state.lock().projects = projects;
        api
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let api = FakeApi::default();
        api.state.lock().users = users;
        api
    }

    pub fn and_projects(self, projects: Vec<Project>) -> Self {
        self.state.lock().projects = projects;
        self
    }

    pub fn and_users(self, users: Vec<User>) -> Self {
        self.state.lock().users = users;
        self
    }

    /// Hold every update response until `release_update` is called.
    pub fn holding_updates(mut self) -> Self {
        self.update_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let one held update respond.
    pub fn release_update(&self) {
        if let Some(gate) = &self.update_gate {
            gate.add_permits(1);
        }
    }

    /// Resolves once an update request has been received.
    pub async fn update_started(&self) {
        self.update_started.notified().await;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn server_task(&self, id: u64) -> Option<Task> {
        self.state.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn fail_next_fetch(&self, error: ApiError) {
        self.state.lock().fetch_failures.push_back(error);
    }

    pub fn fail_next_update(&self, error: ApiError) {
        self.state.lock().update_replies.push_back(Err(error));
    }

    pub fn reply_next_update(&self, task: Task) {
        self.state.lock().update_replies.push_back(Ok(task));
    }

    pub fn fail_next_delete(&self, error: ApiError) {
        self.state.lock().delete_failures.push_back(error);
    }

    pub fn fail_next_project_call(&self, error: ApiError) {
        self.state.lock().project_failures.push_back(error);
    }

    /// Respond to updates without the assignee, like a server that does not
    /// join user details on writes.
    pub fn strip_assignee_on_update(&self) {
        self.state.lock().strip_assignee = true;
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl TaskApi for FakeApi {
    async fn fetch_tasks(&self, project_id: u64) -> ApiResult<Vec<Task>> {
        self.record(format!("GET /api/tasks?projectId={project_id}"));
        let mut state = self.state.lock();
        if let Some(e) = state.fetch_failures.pop_front() {
            return Err(e);
        }
        Ok(state.tasks.clone())
    }

    async fn create_task(&self, new: &NewTask) -> ApiResult<Task> {
        self.record("POST /api/tasks".to_string());
        let mut state = self.state.lock();
        let id = state.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let assignee = new.assignee_id.map(|uid| {
            let name = state
                .users
                .iter()
                .find(|u| u.id == uid)
                .map(|u| u.name.clone())
                .unwrap_or_default();
            Assignee { id: uid, name, avatar_url: None }
        });
        let task = Task {
            id,
            title: new.title.clone(),
            description: new.description.clone(),
            status: new.status,
            priority: new.priority,
            due_date: new.due_date,
            assignee,
            project_id: new.project_id,
        };
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: u64, patch: &TaskPatch) -> ApiResult<Task> {
        self.record(format!("PUT /api/tasks/{id}"));
        self.update_started.notify_one();
        if let Some(gate) = &self.update_gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let mut state = self.state.lock();
        if let Some(reply) = state.update_replies.pop_front() {
            return reply;
        }
        let strip = state.strip_assignee;
        let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) else {
            return Err(ApiError::Status { status: 404, message: "Task not found".into() });
        };
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due) = patch.due_date {
            task.due_date = due;
        }
        if let Some(assignee) = patch.assignee_id {
            task.assignee = assignee.map(|uid| Assignee { id: uid, name: String::new(), avatar_url: None });
        }
        let mut reply = task.clone();
        if strip {
            reply.assignee = None;
        }
        Ok(reply)
    }

    async fn delete_task(&self, id: u64) -> ApiResult<()> {
        self.record(format!("DELETE /api/tasks/{id}"));
        let mut state = self.state.lock();
        if let Some(e) = state.delete_failures.pop_front() {
            return Err(e);
        }
        state.tasks.retain(|t| t.id != id);
        Ok(())
    }
}

#[async_trait]
impl ProjectApi for FakeApi {
    async fn fetch_projects(&self) -> ApiResult<Vec<Project>> {
        self.record("GET /api/projects".to_string());
        let mut state = self.state.lock();
        if let Some(e) = state.project_failures.pop_front() {
            return Err(e);
        }
        Ok(state.projects.clone())
    }

    async fn create_project(&self, new: &NewProject) -> ApiResult<Project> {
        self.record("POST /api/projects".to_string());
        let mut state = self.state.lock();
        if let Some(e) = state.project_failures.pop_front() {
            return Err(e);
        }
        let id = state.projects.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let project = Project {
            id,
            name: new.name.clone(),
            description: new.description.clone(),
        };
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn delete_project(&self, id: u64) -> ApiResult<()> {
        self.record(format!("DELETE /api/projects/{id}"));
        let mut state = self.state.lock();
        if let Some(e) = state.project_failures.pop_front() {
            return Err(e);
        }
        state.projects.retain(|p| p.id != id);
        Ok(())
    }
}

#[async_trait]
impl TeamApi for FakeApi {
    async fn fetch_users(&self) -> ApiResult<Vec<User>> {
        self.record("GET /api/users".to_string());
        Ok(self.state.lock().users.clone())
    }
}
