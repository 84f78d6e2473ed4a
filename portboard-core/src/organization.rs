//! Organization reference data
//!
//! Users, directorates, divisions and departments are only ever used to turn
//! an id into a display name. A lookup that cannot be resolved yields the
//! [`PLACEHOLDER`] glyph instead of an error.

use serde::{Deserialize, Serialize};

/// Display value for an unresolved reference
pub const PLACEHOLDER: &str = "—";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub employee_id: String,
    /// Grade code, e.g. "MDCS", "EDCS", "MSS1".."MSS4"
    #[serde(default)]
    pub grade_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directorate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default)]
    pub system_role: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directorate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executive_director_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Division {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directorate_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division_id: Option<String>,
}

/// A standing delegation from a principal to an assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantAssignment {
    pub assistant_id: String,
    pub principal_id: String,
    /// Delegated actions: "view", "draft", "forward", "coordinate"
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Reference data shared by every page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSnapshot {
    #[serde(default)]
    pub directorates: Vec<Directorate>,
    #[serde(default)]
    pub divisions: Vec<Division>,
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub users: Vec<User>,
}

/// A partial refresh of the snapshot; `None` keeps the current list
#[derive(Debug, Clone, Default)]
pub struct OrganizationUpdate {
    pub directorates: Option<Vec<Directorate>>,
    pub divisions: Option<Vec<Division>>,
    pub departments: Option<Vec<Department>>,
    pub users: Option<Vec<User>>,
}

fn log_miss(kind: &'static str, id: &str) {
    tracing::debug!(kind, id, "reference lookup missed, using placeholder");
}

impl OrganizationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a partial update into the snapshot
    pub fn update(&mut self, update: OrganizationUpdate) {
        if let Some(directorates) = update.directorates {
            self.directorates = directorates;
        }
        if let Some(divisions) = update.divisions {
            self.divisions = divisions;
        }
        if let Some(departments) = update.departments {
            self.departments = departments;
        }
        if let Some(users) = update.users {
            self.users = users;
        }
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Finds a user by id or, failing that, by username
    pub fn user_by_id_or_username(&self, key: &str) -> Option<&User> {
        self.user(key)
            .or_else(|| self.users.iter().find(|u| u.username.as_deref() == Some(key)))
    }

    pub fn directorate(&self, id: &str) -> Option<&Directorate> {
        self.directorates.iter().find(|d| d.id == id)
    }

    pub fn division(&self, id: &str) -> Option<&Division> {
        self.divisions.iter().find(|d| d.id == id)
    }

    pub fn department(&self, id: &str) -> Option<&Department> {
        self.departments.iter().find(|d| d.id == id)
    }

    /// User name for an optional id, or the placeholder
    pub fn user_name_or_placeholder(&self, id: Option<&str>) -> String {
        resolve(id, "user", |id| self.user(id).map(|u| u.name.clone()))
    }

    pub fn division_name_or_placeholder(&self, id: Option<&str>) -> String {
        resolve(id, "division", |id| self.division(id).map(|d| d.name.clone()))
    }

    pub fn department_name_or_placeholder(&self, id: Option<&str>) -> String {
        resolve(id, "department", |id| self.department(id).map(|d| d.name.clone()))
    }

    pub fn directorate_name_or_placeholder(&self, id: Option<&str>) -> String {
        resolve(id, "directorate", |id| self.directorate(id).map(|d| d.name.clone()))
    }
}

fn resolve(
    id: Option<&str>,
    kind: &'static str,
    find: impl FnOnce(&str) -> Option<String>,
) -> String {
    match id.filter(|id| !id.is_empty()) {
        None => PLACEHOLDER.to_string(),
        Some(id) => find(id).unwrap_or_else(|| {
            log_miss(kind, id);
            PLACEHOLDER.to_string()
        }),
    }
}
