//! Team directory, used to show and pick task assignees.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::TeamApi;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl User {
    pub fn role_label(&self) -> &str {
        self.role.as_deref().filter(|r| !r.is_empty()).unwrap_or("Member")
    }
}

pub struct Team {
    api: Arc<dyn TeamApi>,
    members: Vec<User>,
}

impl Team {
    pub fn new(api: Arc<dyn TeamApi>) -> Self {
        Team { api, members: Vec::new() }
    }

    /// Load every user. A failed load leaves the directory empty.
    pub async fn fetch(&mut self) -> &[User] {
        match self.api.fetch_users().await {
            Ok(users) => self.members = users,
            Err(e) => {
                warn!(error = %e, "fetch team failed");
                self.members.clear();
            }
        }
        &self.members
    }

    pub fn get(&self, id: u64) -> Option<&User> {
        self.members.iter().find(|u| u.id == id)
    }
}
