//! Project list and current-project selection.
//!
//! Projects are kept sorted by name. The first project becomes current when
//! nothing is selected yet, and deleting the current project falls back to
//! the first remaining one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::ProjectApi;
use crate::store::StoreError;

/// A project as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Payload for `POST /api/projects`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub struct ProjectStore {
    api: Arc<dyn ProjectApi>,
    projects: Vec<Project>,
    current: Option<u64>,
}

impl ProjectStore {
    pub fn new(api: Arc<dyn ProjectApi>) -> Self {
        ProjectStore {
            api,
            projects: Vec::new(),
            current: None,
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn current(&self) -> Option<&Project> {
        let id = self.current?;
        self.projects.iter().find(|p| p.id == id)
    }

    /// Make a loaded project current.
    pub fn select(&mut self, id: u64) -> bool {
        if self.projects.iter().any(|p| p.id == id) {
            self.current = Some(id);
            true
        } else {
            false
        }
    }

    /// Load all projects, sorted by name.
    pub async fn fetch_projects(&mut self) -> Result<&[Project], StoreError> {
        let mut projects = match self.api.fetch_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                warn!(error = %e, "fetch projects failed");
                self.projects.clear();
                self.current = None;
                return Err(e.into());
            }
        };
        sort_by_name(&mut projects);
        self.projects = projects;

        let current_valid = self.current.is_some_and(|id| self.projects.iter().any(|p| p.id == id));
        if !current_valid {
            self.current = self.projects.first().map(|p| p.id);
        }
        Ok(&self.projects)
    }

    /// Create a project and make it current.
    pub async fn create_project(&mut self, name: &str, description: Option<String>) -> Result<Project, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("Project name cannot be empty".into()));
        }
        let payload = NewProject {
            name: name.to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
        };
        let project = self.api.create_project(&payload).await.inspect_err(|e| {
            warn!(error = %e, "create project failed");
        })?;
        self.projects.push(project.clone());
        sort_by_name(&mut self.projects);
        self.current = Some(project.id);
        info!(id = project.id, name = %project.name, "project created");
        Ok(project)
    }

    /// Delete a project. If it was current, the first remaining project takes over.
    pub async fn delete_project(&mut self, id: u64) -> Result<(), StoreError> {
        self.api.delete_project(id).await.inspect_err(|e| {
            warn!(id, error = %e, "delete project failed");
        })?;
        self.projects.retain(|p| p.id != id);
        if self.current == Some(id) {
            self.current = self.projects.first().map(|p| p.id);
        }
        info!(id, "project deleted");
        Ok(())
    }

    /// Resolve a project identifier (either ID or name) to a loaded project.
    /// Names match case-insensitively; ambiguous names are an error.
    pub fn resolve(&self, identifier: &str) -> Result<&Project, String> {
        if let Ok(id) = identifier.parse::<u64>() {
            return self
                .projects
                .iter()
                .find(|p| p.id == id)
                .ok_or_else(|| format!("Project with ID {id} not found"));
        }

        let wanted = identifier.trim().to_lowercase();
        let matches: Vec<&Project> = self
            .projects
            .iter()
            .filter(|p| p.name.to_lowercase() == wanted)
            .collect();

        match matches.as_slice() {
            [] => Err(format!("No project found with name '{identifier}'")),
            [one] => Ok(*one),
            many => {
                let mut msg = format!("Multiple projects found with name '{identifier}':\n");
                for p in many {
                    msg.push_str(&format!("  ID {}: {}\n", p.id, p.name));
                }
                msg.push_str("Please use the specific ID instead.");
                Err(msg)
            }
        }
    }
}

fn sort_by_name(projects: &mut [Project]) {
    projects.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.id.cmp(&b.id))
    });
}
