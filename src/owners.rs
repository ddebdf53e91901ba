//! Owner registry.
//!
//! The registry is a materialised view over the owner lists of all tasks. Every
//! operation that changes task ownership rebuilds it before returning, so callers
//! never see stale counts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::validation::{validate_owner_name, MAX_OWNERS_PER_TASK};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStats {
    pub task_count: usize,
    pub last_used: DateTime<Utc>,
    /// First time the owner was seen.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerRegistry {
    pub owners: Vec<String>,
    #[serde(default)]
    pub statistics: BTreeMap<String, OwnerStats>,
}

impl OwnerRegistry {
    pub fn contains(&self, name: &str) -> bool {
        self.owners.iter().any(|o| o == name)
    }

    pub fn stats(&self, name: &str) -> Option<&OwnerStats> {
        self.statistics.get(name)
    }

    /// Recompute every statistic from the task list.
    ///
    /// Owners found on tasks are added; registered owners with no tasks stay with a
    /// zero count and their previous timestamps.
    pub fn rebuild(&mut self, tasks: &[crate::task::Task], now: DateTime<Utc>) {
        let mut stats: BTreeMap<String, OwnerStats> = BTreeMap::new();
        for task in tasks {
            for owner in &task.owners {
                let entry = stats.entry(owner.clone()).or_insert(OwnerStats {
                    task_count: 0,
                    last_used: task.updated_at,
                    created_at: task.created_at,
                });
                entry.task_count += 1;
                entry.created_at = entry.created_at.min(task.created_at);
                entry.last_used = entry.last_used.max(task.updated_at);
            }
        }

        for name in &self.owners {
            if !stats.contains_key(name) {
                let previous = self.statistics.get(name);
                stats.insert(
                    name.clone(),
                    OwnerStats {
                        task_count: 0,
                        last_used: previous.map_or(now, |p| p.last_used),
                        created_at: previous.map_or(now, |p| p.created_at),
                    },
                );
            }
        }

        let mut owners = self.owners.clone();
        for name in stats.keys() {
            if !owners.contains(name) {
                owners.push(name.clone());
            }
        }
        self.owners = owners;
        self.statistics = stats;
    }

    /// Owners matching `query` (case-insensitive substring), busiest first, then by name.
    pub fn suggest(&self, query: &str) -> Vec<&str> {
        let needle = query.trim().to_lowercase();
        let mut matches: Vec<(&str, usize)> = self
            .owners
            .iter()
            .filter(|o| needle.is_empty() || o.to_lowercase().contains(&needle))
            .map(|o| (o.as_str(), self.statistics.get(o).map_or(0, |s| s.task_count)))
            .collect();
        matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        matches.into_iter().map(|(name, _)| name).collect()
    }
}

impl Database {
    /// Register an owner name without assigning it to a task.
    pub fn register_owner(&mut self, name: &str) -> Result<String> {
        validate_owner_name(name)?;
        let name = name.trim().to_string();
        if !self.owner_registry.contains(&name) {
            self.owner_registry.owners.push(name.clone());
        }
        self.refresh_owners();
        Ok(name)
    }

    /// Add `name` to a task's owner list.
    ///
    /// Returns `Ok(false)` when the task already lists the owner.
    pub fn add_task_owner(&mut self, task_id: &str, name: &str) -> Result<bool> {
        validate_owner_name(name)?;
        let name = name.trim();
        let task = self.task(task_id)?;
        if task.has_owner(name) {
            return Ok(false);
        }
        if task.owners.len() >= MAX_OWNERS_PER_TASK {
            return Err(EngineError::validation(format!(
                "A task can have at most {MAX_OWNERS_PER_TASK} owners"
            )));
        }

        let now = Utc::now();
        let task = self.task_mut(task_id)?;
        task.owners.push(name.to_string());
        task.updated_at = now;
        self.refresh_owners();
        Ok(true)
    }

    /// Remove `name` from one task. Returns whether the task listed it.
    pub fn remove_task_owner(&mut self, task_id: &str, name: &str) -> Result<bool> {
        let task = self.task_mut(task_id)?;
        let before = task.owners.len();
        task.owners.retain(|o| o != name);
        let removed = task.owners.len() != before;
        if removed {
            task.updated_at = Utc::now();
            self.refresh_owners();
        }
        Ok(removed)
    }

    /// Remove an owner from the registry and from every task. Returns the number of
    /// tasks that listed it.
    pub fn remove_owner(&mut self, name: &str) -> Result<usize> {
        let listed = self.tasks.iter().filter(|t| t.has_owner(name)).count();
        if !self.owner_registry.contains(name) && listed == 0 {
            return Err(EngineError::owner_not_found(name));
        }

        let now = Utc::now();
        for task in self.tasks.iter_mut().filter(|t| t.has_owner(name)) {
            task.owners.retain(|o| o != name);
            task.updated_at = now;
        }
        self.owner_registry.owners.retain(|o| o != name);
        self.owner_registry.statistics.remove(name);
        self.refresh_owners();
        tracing::info!(owner = %name, tasks = listed, "Removed owner");
        Ok(listed)
    }

    /// Hand every task owned by `from` over to `to`.
    ///
    /// Tasks that already list `to` simply drop `from`. With `remove_after`, `from`
    /// leaves the registry, but only when at least one task moved. Returns the number
    /// of tasks transferred.
    pub fn transfer_owner(&mut self, from: &str, to: &str, remove_after: bool) -> Result<usize> {
        validate_owner_name(to)?;
        let from = from.trim();
        let to = to.trim();
        if from == to {
            return Err(EngineError::validation("Source and target owner are the same"));
        }
        if !self.owner_registry.contains(from) && !self.tasks.iter().any(|t| t.has_owner(from)) {
            return Err(EngineError::owner_not_found(from));
        }

        let now = Utc::now();
        let mut moved = 0;
        for task in self.tasks.iter_mut().filter(|t| t.has_owner(from)) {
            if task.has_owner(to) {
                task.owners.retain(|o| o != from);
            } else if let Some(slot) = task.owners.iter_mut().find(|o| o.as_str() == from) {
                *slot = to.to_string();
            }
            task.updated_at = now;
            moved += 1;
        }

        if !self.owner_registry.contains(to) {
            self.owner_registry.owners.push(to.to_string());
        }
        if remove_after && moved > 0 {
            self.owner_registry.owners.retain(|o| o != from);
            self.owner_registry.statistics.remove(from);
        }
        self.refresh_owners();
        tracing::info!(from = %from, to = %to, tasks = moved, "Transferred owner");
        Ok(moved)
    }

    pub fn suggest_owners(&self, query: &str) -> Vec<&str> {
        self.owner_registry.suggest(query)
    }

    pub(crate) fn refresh_owners(&mut self) {
        self.owner_registry.rebuild(&self.tasks, Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPatch;

    fn db_with_task(owners: &[&str]) -> (Database, String) {
        let mut db = Database::default();
        let patch = TaskPatch {
            owners: Some(owners.iter().map(|o| o.to_string()).collect()),
            ..TaskPatch::titled("Shared work")
        };
        let id = db.create_task(patch).unwrap();
        (db, id)
    }

    #[test]
    fn test_sixth_owner_is_rejected() {
        let (mut db, id) = db_with_task(&["a", "b", "c", "d", "e"]);
        assert!(db.add_task_owner(&id, "f").is_err());
        assert_eq!(db.get(&id).unwrap().owners, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(db.add_task_owner(&id, "c").unwrap(), false);
    }

    #[test]
    fn test_add_and_remove_keep_stats_current() {
        let (mut db, id) = db_with_task(&["Ana"]);
        assert_eq!(db.owner_registry.stats("Ana").unwrap().task_count, 1);
        assert!(db.add_task_owner(&id, "Ben").unwrap());
        assert_eq!(db.owner_registry.stats("Ben").unwrap().task_count, 1);
        assert!(db.remove_task_owner(&id, "Ana").unwrap());
        assert_eq!(db.owner_registry.stats("Ana").unwrap().task_count, 0);
        assert!(db.add_task_owner(&id, "bad@name").is_err());
    }

    #[test]
    fn test_remove_owner_cascades() {
        let (mut db, first) = db_with_task(&["Ana", "Ben"]);
        let second = db
            .create_task(TaskPatch { owners: Some(vec!["Ana".into()]), ..TaskPatch::titled("Other") })
            .unwrap();
        assert_eq!(db.remove_owner("Ana").unwrap(), 2);
        assert_eq!(db.get(&first).unwrap().owners, vec!["Ben"]);
        assert!(db.get(&second).unwrap().owners.is_empty());
        assert!(!db.owner_registry.contains("Ana"));
        assert!(db.remove_owner("Ana").is_err());
    }

    #[test]
    fn test_transfer_removes_source_only_when_something_moved() {
        let (mut db, id) = db_with_task(&["Ana"]);
        db.register_owner("Idle").unwrap();

        assert_eq!(db.transfer_owner("Idle", "Ben", true).unwrap(), 0);
        assert!(db.owner_registry.contains("Idle"));

        assert_eq!(db.transfer_owner("Ana", "Ben", true).unwrap(), 1);
        assert!(!db.owner_registry.contains("Ana"));
        assert_eq!(db.get(&id).unwrap().owners, vec!["Ben"]);
        assert_eq!(db.owner_registry.stats("Ben").unwrap().task_count, 1);

        assert!(db.transfer_owner("Ben", "Ben", false).is_err());
    }

    #[test]
    fn test_transfer_into_existing_owner_does_not_duplicate() {
        let (mut db, id) = db_with_task(&["Ana", "Ben"]);
        assert_eq!(db.transfer_owner("Ana", "Ben", false).unwrap(), 1);
        assert_eq!(db.get(&id).unwrap().owners, vec!["Ben"]);
        assert!(db.owner_registry.contains("Ana"));
    }

    #[test]
    fn test_transfer_trims_both_names() {
        let (mut db, id) = db_with_task(&["Ana"]);
        let err = db.transfer_owner(" Ana", "Ana ", false).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(db.transfer_owner(" Ana ", "Ben", false).unwrap(), 1);
        assert_eq!(db.get(&id).unwrap().owners, vec!["Ben"]);
    }

    #[test]
    fn test_suggestions_order_by_count_then_name() {
        let (mut db, _) = db_with_task(&["Zoe", "Amir"]);
        db.create_task(TaskPatch { owners: Some(vec!["Zoe".into()]), ..TaskPatch::titled("Two") })
            .unwrap();
        db.register_owner("Bea").unwrap();
        assert_eq!(db.suggest_owners(""), vec!["Zoe", "Amir", "Bea"]);
        assert_eq!(db.suggest_owners("a"), vec!["Amir", "Bea"]);
        assert_eq!(db.suggest_owners("ZO"), vec!["Zoe"]);
    }

    #[test]
    fn test_rebuild_ignores_persisted_counts() {
        let (mut db, _) = db_with_task(&["Ana"]);
        db.owner_registry.statistics.get_mut("Ana").unwrap().task_count = 42;
        db.refresh_owners();
        assert_eq!(db.owner_registry.stats("Ana").unwrap().task_count, 1);
    }
}
