//! Projects and the active-project scope.
//!
//! Every task belongs to exactly one project. One project is the default: it can be
//! neither renamed nor deleted, and it is where tasks land when no project is given.
//! Deleting any other project deletes its tasks with it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::validation::{same_name, validate_project_name};

pub const DEFAULT_PROJECT_ID: &str = "default";
pub const DEFAULT_PROJECT_NAME: &str = "General";

/// Colours handed out to new projects in turn.
const PALETTE: [&str; 8] = [
    "#6366f1", "#10b981", "#f59e0b", "#ef4444", "#3b82f6", "#8b5cf6", "#ec4899", "#14b8a6",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn default_project(now: DateTime<Utc>) -> Self {
        Project {
            id: DEFAULT_PROJECT_ID.to_string(),
            name: DEFAULT_PROJECT_NAME.to_string(),
            color: PALETTE[0].to_string(),
            is_default: true,
            created_at: now,
        }
    }
}

impl Database {
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Look up a project by id, or by name case-insensitively.
    pub fn resolve_project(&self, key: &str) -> Result<&Project> {
        self.project(key)
            .or_else(|| self.projects.iter().find(|p| same_name(&p.name, key)))
            .ok_or_else(|| EngineError::project_not_found(key))
    }

    pub fn default_project_id(&self) -> String {
        self.projects
            .iter()
            .find(|p| p.is_default)
            .map(|p| p.id.clone())
            .unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string())
    }

    /// Create a project and return its id. `color` defaults to the next palette entry.
    pub fn create_project(&mut self, name: &str, color: Option<&str>) -> Result<String> {
        validate_project_name(name)?;
        self.check_project_name_free(name, None)?;

        let id = uuid::Uuid::new_v4().to_string();
        let color = color
            .map(str::to_string)
            .unwrap_or_else(|| PALETTE[self.projects.len() % PALETTE.len()].to_string());
        self.projects.push(Project {
            id: id.clone(),
            name: name.trim().to_string(),
            color,
            is_default: false,
            created_at: Utc::now(),
        });
        tracing::info!(project = %id, name = %name.trim(), "Created project");
        Ok(id)
    }

    pub fn rename_project(&mut self, id: &str, name: &str) -> Result<()> {
        let project = self.project(id).ok_or_else(|| EngineError::project_not_found(id))?;
        if project.is_default {
            return Err(EngineError::validation("The default project cannot be renamed"));
        }
        validate_project_name(name)?;
        self.check_project_name_free(name, Some(id))?;

        if let Some(project) = self.projects.iter_mut().find(|p| p.id == id) {
            project.name = name.trim().to_string();
        }
        Ok(())
    }

    pub fn set_project_color(&mut self, id: &str, color: &str) -> Result<()> {
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| EngineError::project_not_found(id))?;
        project.color = color.to_string();
        Ok(())
    }

    /// Delete a project and all of its tasks. Returns the number of tasks removed.
    pub fn delete_project(&mut self, id: &str) -> Result<usize> {
        let project = self.project(id).ok_or_else(|| EngineError::project_not_found(id))?;
        if project.is_default {
            return Err(EngineError::validation("The default project cannot be deleted"));
        }

        let removed: HashSet<String> = self
            .tasks
            .iter()
            .filter(|t| t.project == id)
            .map(|t| t.id.clone())
            .collect();
        self.tasks.retain(|t| t.project != id);
        self.remove_dependency_refs(&removed);
        self.projects.retain(|p| p.id != id);
        if self.current_project_id == id {
            self.current_project_id = self.default_project_id();
        }
        self.refresh_owners();
        tracing::info!(project = %id, tasks = removed.len(), "Deleted project");
        Ok(removed.len())
    }

    /// Switch the active project scope.
    pub fn set_active_project(&mut self, id: &str) -> Result<()> {
        if self.project(id).is_none() {
            return Err(EngineError::project_not_found(id));
        }
        self.current_project_id = id.to_string();
        Ok(())
    }

    pub fn active_project(&self) -> Option<&Project> {
        self.project(&self.current_project_id)
    }

    fn check_project_name_free(&self, name: &str, except: Option<&str>) -> Result<()> {
        let taken = self
            .projects
            .iter()
            .any(|p| Some(p.id.as_str()) != except && same_name(&p.name, name));
        if taken {
            return Err(EngineError::validation(format!(
                "A project named '{}' already exists",
                name.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPatch;

    #[test]
    fn test_names_are_unique_and_short() {
        let mut db = Database::default();
        let id = db.create_project("Work", None).unwrap();
        assert!(db.create_project("work ", None).is_err());
        assert!(db.create_project("general", None).is_err());
        assert!(db.create_project("A very long name", None).is_err());
        assert!(db.rename_project(&id, "Work").is_ok());
        assert!(db.rename_project(&id, "GENERAL").is_err());
        db.rename_project(&id, "Office").unwrap();
        assert_eq!(db.resolve_project("office").unwrap().id, id);
    }

    #[test]
    fn test_default_project_is_protected() {
        let mut db = Database::default();
        let default = db.default_project_id();
        assert!(db.rename_project(&default, "Other").is_err());
        assert!(db.delete_project(&default).is_err());
        assert!(db.delete_project("missing").is_err());
    }

    #[test]
    fn test_delete_cascades_and_resets_scope() {
        let mut db = Database::default();
        let work = db.create_project("Work", None).unwrap();
        let in_work = TaskPatch { project: Some(work.clone()), ..TaskPatch::titled("report") };
        db.create_task(in_work.clone()).unwrap();
        db.create_task(in_work).unwrap();
        let kept = db.create_task(TaskPatch::titled("groceries")).unwrap();
        db.set_active_project(&work).unwrap();
        assert_eq!(db.scoped_tasks().len(), 2);

        assert_eq!(db.delete_project(&work).unwrap(), 2);
        assert_eq!(db.tasks.len(), 1);
        assert!(db.get(&kept).is_some());
        assert_eq!(db.current_project_id, db.default_project_id());
    }

    #[test]
    fn test_active_project_must_exist() {
        let mut db = Database::default();
        assert!(db.set_active_project("nowhere").is_err());
        assert_eq!(db.active_project().unwrap().name, DEFAULT_PROJECT_NAME);
    }
}
