//! Task data structure and the request payloads that create or change it.
//!
//! `Task` mirrors the record the API returns. The client never invents a task
//! id; records only enter the collection after the server has assigned one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::*;

/// A unit of work belonging to exactly one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee: Option<Assignee>,
    pub project_id: u64,
}

/// Display details of the team member a task is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Task {
    /// Merge a server representation over a locally held record.
    ///
    /// The server copy wins for every field, except denormalized display
    /// fields that the response left out: those keep the local value.
    pub fn reconciled_with(mut self, local: &Task) -> Task {
        if self.assignee.is_none() {
            self.assignee = local.assignee.clone();
        }
        self
    }

    /// True when the task is past due and not yet done.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != Status::Done && self.due_date.is_some_and(|d| d < now)
    }
}

/// Payload for `POST /api/tasks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub project_id: u64,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<u64>,
}

impl NewTask {
    /// A task with the creation-form defaults: medium priority, not started.
    pub fn new(title: impl Into<String>, project_id: u64) -> Self {
        NewTask {
            title: title.into(),
            description: None,
            project_id,
            priority: Priority::default(),
            status: Status::default(),
            due_date: None,
            assignee_id: None,
        }
    }
}

/// Payload for `PUT /api/tasks/{id}`. Only the fields that are set go on the wire.
///
/// `Some(None)` on a nullable field clears it server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Option<u64>>,
}

impl TaskPatch {
    /// A status-only update.
    pub fn status(status: Status) -> Self {
        TaskPatch {
            status: Some(status),
            ..TaskPatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }
}
