//! The task store.
//!
//! `Database` is the aggregate root: it holds tasks, projects, the owner registry,
//! the status configuration and preferences, and it serialises as the persisted
//! snapshot. All task lifecycle operations live here; project, status, owner and
//! timer operations are further `impl Database` blocks in their own modules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::fields::*;
use crate::migrate;
use crate::owners::OwnerRegistry;
use crate::project::Project;
use crate::scoring;
use crate::status::StatusConfig;
use crate::task::{normalise_tags, Task, TaskPatch};
use crate::validation::*;

/// Current snapshot schema version.
pub const SCHEMA_VERSION: f64 = 2.1;

fn default_auto_return() -> bool {
    true
}

/// In-memory aggregate of everything the engine owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub tasks: Vec<Task>,
    pub projects: Vec<Project>,
    #[serde(default)]
    pub current_project_id: String,
    pub owner_registry: OwnerRegistry,
    pub status_config: StatusConfig,
    #[serde(default = "default_auto_return")]
    pub auto_return_on_stop: bool,
    pub version: f64,
}

impl Default for Database {
    /// A freshly seeded snapshot: the default project, canonical statuses, no tasks.
    fn default() -> Self {
        let project = Project::default_project(Utc::now());
        Database {
            tasks: Vec::new(),
            current_project_id: project.id.clone(),
            projects: vec![project],
            owner_registry: OwnerRegistry::default(),
            status_config: StatusConfig::canonical(),
            auto_return_on_stop: default_auto_return(),
            version: SCHEMA_VERSION,
        }
    }
}

impl Database {
    /// Build a database from a raw persisted snapshot.
    ///
    /// The snapshot is migrated to the current schema and cleaned up. Anything that
    /// fails to parse yields a fresh database instead of an error.
    pub fn from_snapshot(raw: &str) -> Self {
        let value = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot is not valid JSON, starting fresh");
                return Database::default();
            }
        };
        let mut migrated = match migrate::run(value, Utc::now()) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot migration failed, starting fresh");
                return Database::default();
            }
        };
        // Tasks are decoded one by one so a single bad record only loses itself.
        let raw_tasks = match migrated.get_mut("tasks").map(serde_json::Value::take) {
            Some(serde_json::Value::Array(tasks)) => tasks,
            _ => Vec::new(),
        };
        migrated["tasks"] = serde_json::Value::Array(Vec::new());
        let mut db: Database = match serde_json::from_value(migrated) {
            Ok(db) => db,
            Err(e) => {
                tracing::warn!(error = %e, "Migrated snapshot does not match schema, starting fresh");
                return Database::default();
            }
        };
        for (index, raw) in raw_tasks.into_iter().enumerate() {
            match serde_json::from_value::<Task>(raw) {
                Ok(task) => db.tasks.push(task),
                Err(e) => tracing::warn!(index, error = %e, "Dropping unreadable task record"),
            }
        }
        db.cleanup();
        db
    }

    pub fn to_snapshot(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Get a task by ID.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task(&self, id: &str) -> Result<&Task> {
        self.get(id).ok_or_else(|| EngineError::task_not_found(id))
    }

    pub(crate) fn task_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| EngineError::task_not_found(id))
    }

    /// Resolve a full task id or a unique prefix of one.
    pub fn resolve_task_id(&self, prefix: &str) -> Result<String> {
        if self.get(prefix).is_some() {
            return Ok(prefix.to_string());
        }
        let matches: Vec<&Task> = self.tasks.iter().filter(|t| t.id.starts_with(prefix)).collect();
        match matches.len() {
            0 => Err(EngineError::task_not_found(prefix)),
            1 => Ok(matches[0].id.clone()),
            n => Err(EngineError::validation(format!(
                "'{prefix}' matches {n} tasks; use a longer prefix"
            ))),
        }
    }

    /// Tasks in the active project.
    pub fn scoped_tasks(&self) -> Vec<&Task> {
        self.tasks_in_project(&self.current_project_id)
    }

    pub fn tasks_in_project(&self, project_id: &str) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.project == project_id).collect()
    }

    /// Create a task from `patch` and return its id.
    pub fn create_task(&mut self, patch: TaskPatch) -> Result<String> {
        self.create_task_at(patch, Utc::now())
    }

    pub fn create_task_at(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> Result<String> {
        let title = patch.title.as_deref().unwrap_or_default();
        validate_title(title)?;
        self.validate_patch(&patch, None)?;

        let mut task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            description: None,
            project: self.default_project_id(),
            status: self.status_config.default_status(),
            impact: scoring::DEFAULT_LEVEL,
            urgency: scoring::DEFAULT_LEVEL,
            effort: scoring::DEFAULT_LEVEL,
            score: 0.0,
            bucket: Bucket::P3,
            bucket_override: None,
            due: None,
            owner_type: OwnerType::default(),
            owners: Vec::new(),
            tags: Vec::new(),
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
            expected_by: None,
            elapsed_secs: 0,
            timer_started_at: None,
        };
        apply_patch(&mut task, patch, now);
        let id = task.id.clone();
        self.tasks.push(task);

        self.rescore(&id, now);
        self.refresh_owners();
        tracing::debug!(task = %id, "Created task");
        Ok(id)
    }

    /// Apply `patch` to an existing task.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<()> {
        self.update_task_at(id, patch, Utc::now())
    }

    pub fn update_task_at(&mut self, id: &str, patch: TaskPatch, now: DateTime<Utc>) -> Result<()> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        self.task(id)?;
        self.validate_patch(&patch, Some(id))?;

        let status_changed = patch.status.is_some();
        let owners_changed = patch.owners.is_some();
        let task = self.task_mut(id)?;
        apply_patch(task, patch, now);

        self.rescore(id, now);
        if status_changed {
            self.rescore_dependents(id, now);
        }
        if owners_changed {
            self.refresh_owners();
        }
        Ok(())
    }

    /// Delete a task and drop it from other tasks' dependency lists.
    pub fn delete_task(&mut self, id: &str) -> Result<Task> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| EngineError::task_not_found(id))?;
        let task = self.tasks.remove(idx);
        self.remove_dependency_refs(&HashSet::from([task.id.clone()]));
        self.refresh_owners();
        tracing::debug!(task = %id, "Deleted task");
        Ok(task)
    }

    /// Move a task to another status column.
    pub fn move_task(&mut self, id: &str, status: &StatusId) -> Result<()> {
        let patch = TaskPatch { status: Some(status.clone()), ..Default::default() };
        self.update_task(id, patch)
    }

    /// Check a patch against the current aggregate without changing anything.
    fn validate_patch(&self, patch: &TaskPatch, id: Option<&str>) -> Result<()> {
        for (field, value) in [("impact", patch.impact), ("urgency", patch.urgency), ("effort", patch.effort)] {
            if let Some(v) = value {
                validate_level(field, v)?;
            }
        }
        if let Some(project) = &patch.project {
            if self.project(project).is_none() {
                return Err(EngineError::project_not_found(project));
            }
        }
        if let Some(status) = &patch.status {
            if !self.status_config.contains(status) {
                return Err(EngineError::status_not_found(status.as_str()));
            }
        }
        if let Some(owners) = &patch.owners {
            let mut distinct: Vec<&str> = Vec::new();
            for owner in owners {
                validate_owner_name(owner)?;
                if !distinct.contains(&owner.trim()) {
                    distinct.push(owner.trim());
                }
            }
            if distinct.len() > MAX_OWNERS_PER_TASK {
                return Err(EngineError::validation(format!(
                    "A task can have at most {MAX_OWNERS_PER_TASK} owners"
                )));
            }
        }
        if let Some(deps) = &patch.dependencies {
            for dep in deps {
                if Some(dep.as_str()) == id {
                    return Err(EngineError::validation("A task cannot depend on itself"));
                }
                if self.get(dep).is_none() {
                    return Err(EngineError::task_not_found(dep));
                }
            }
        }
        Ok(())
    }

    /// Recompute score and bucket for one task.
    pub(crate) fn rescore(&mut self, id: &str, now: DateTime<Utc>) {
        let Some(task) = self.get(id) else { return };
        let mut input = task.score_input();
        input.unblocked = !task.dependencies.is_empty()
            && task.dependencies.iter().all(|dep| {
                self.get(dep)
                    .is_some_and(|d| self.status_config.is_completion(&d.status))
            });
        let (score, bucket) = scoring::evaluate(&input, task.bucket_override, now);
        if let Ok(task) = self.task_mut(id) {
            task.score = score;
            task.bucket = bucket;
        }
    }

    pub(crate) fn rescore_dependents(&mut self, id: &str, now: DateTime<Utc>) {
        let dependents: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.dependencies.iter().any(|d| d == id))
            .map(|t| t.id.clone())
            .collect();
        for dep in dependents {
            self.rescore(&dep, now);
        }
    }

    /// Recompute every score, e.g. after time has moved on.
    pub fn rescore_all(&mut self, now: DateTime<Utc>) {
        let ids: Vec<String> = self.tasks.iter().map(|t| t.id.clone()).collect();
        for id in ids {
            self.rescore(&id, now);
        }
    }

    pub(crate) fn remove_dependency_refs(&mut self, removed: &HashSet<String>) {
        for t in self.tasks.iter_mut() {
            t.dependencies.retain(|d| !removed.contains(d));
        }
    }

    /// Post-load repairs: fix the status configuration, reap orphans and dangling
    /// dependencies, repair statuses and timers, fix the active project and rebuild
    /// owner statistics.
    pub fn cleanup(&mut self) {
        if self.status_config.repair() {
            tracing::warn!("Stored status configuration was inconsistent, repaired it");
        }

        let project_ids: HashSet<&str> = self.projects.iter().map(|p| p.id.as_str()).collect();
        let orphans: HashSet<String> = self
            .tasks
            .iter()
            .filter(|t| !project_ids.contains(t.project.as_str()))
            .map(|t| t.id.clone())
            .collect();
        if !orphans.is_empty() {
            tracing::info!(count = orphans.len(), "Removing orphaned tasks");
            self.tasks.retain(|t| !orphans.contains(&t.id));
        }
        let task_ids: HashSet<String> = self.tasks.iter().map(|t| t.id.clone()).collect();
        for task in self.tasks.iter_mut() {
            task.dependencies.retain(|d| task_ids.contains(d));
        }

        let fallback = self.status_config.default_status();
        let now = Utc::now();
        for task in self.tasks.iter_mut() {
            if !self.status_config.contains(&task.status) {
                tracing::debug!(task = %task.id, status = %task.status, "Reassigning unknown status");
                task.status = fallback.clone();
            }
            if task.timer_running() && !task.status.is_in_progress() {
                crate::timer::settle(task, now);
            }
        }

        if self.project(&self.current_project_id).is_none() {
            self.current_project_id = self.default_project_id();
        }
        self.version = SCHEMA_VERSION;
        self.refresh_owners();
        self.rescore_all(now);
    }
}

/// Write the fields of `patch` onto `task`.
///
/// The patch must already be validated. An explicit bucket replaces the override;
/// any other change to a scoring input clears it.
fn apply_patch(task: &mut Task, patch: TaskPatch, now: DateTime<Utc>) {
    if let Some(bucket) = patch.bucket {
        task.bucket_override = bucket;
    } else if patch.touches_scoring() {
        task.bucket_override = None;
    }

    if let Some(title) = patch.title {
        task.title = title.trim().to_string();
    }
    if let Some(description) = patch.description {
        task.description = description.filter(|d| !d.trim().is_empty());
    }
    if let Some(project) = patch.project {
        task.project = project;
    }
    if let Some(status) = patch.status {
        if task.timer_running() && !status.is_in_progress() {
            crate::timer::settle(task, now);
        }
        task.status = status;
    }
    if let Some(v) = patch.impact {
        task.impact = v;
    }
    if let Some(v) = patch.urgency {
        task.urgency = v;
    }
    if let Some(v) = patch.effort {
        task.effort = v;
    }
    if let Some(due) = patch.due {
        task.due = due;
    }
    if let Some(expected_by) = patch.expected_by {
        task.expected_by = expected_by;
    }
    if let Some(owner_type) = patch.owner_type {
        task.owner_type = owner_type;
    }
    if let Some(owners) = patch.owners {
        let mut distinct: Vec<String> = Vec::new();
        for owner in owners {
            let owner = owner.trim().to_string();
            if !distinct.contains(&owner) {
                distinct.push(owner);
            }
        }
        task.owners = distinct;
    }
    if let Some(tags) = patch.tags {
        task.tags = normalise_tags(&tags);
    }
    if let Some(deps) = patch.dependencies {
        let mut distinct: Vec<String> = Vec::new();
        for dep in deps {
            if !distinct.contains(&dep) {
                distinct.push(dep);
            }
        }
        task.dependencies = distinct;
    }
    task.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_create_applies_defaults_and_scores() {
        let mut db = Database::default();
        let id = db.create_task(TaskPatch::titled("  Write tests ")).unwrap();
        let task = db.get(&id).unwrap();
        assert_eq!(task.title, "Write tests");
        assert_eq!(task.project, db.default_project_id());
        assert_eq!(task.status, StatusId::ready());
        assert_eq!((task.impact, task.urgency, task.effort), (2, 2, 2));
        assert_eq!(task.score, 5.0);
        assert_eq!(task.bucket, Bucket::P3);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn test_create_rejects_invalid_patches_without_mutation() {
        let mut db = Database::default();
        assert!(db.create_task(TaskPatch::default()).is_err());
        let bad_level = TaskPatch { impact: Some(9), ..TaskPatch::titled("x") };
        assert!(db.create_task(bad_level).is_err());
        let bad_status = TaskPatch { status: Some("nope".into()), ..TaskPatch::titled("x") };
        assert!(matches!(db.create_task(bad_status), Err(EngineError::NotFound { .. })));
        let too_many = TaskPatch {
            owners: Some((0..6).map(|i| format!("owner {i}")).collect()),
            ..TaskPatch::titled("x")
        };
        assert!(db.create_task(too_many).is_err());
        assert!(db.tasks.is_empty());
        assert!(db.owner_registry.owners.is_empty());
    }

    #[test]
    fn test_bucket_override_survives_unrelated_edits() {
        let mut db = Database::default();
        let patch = TaskPatch { bucket: Some(Some(Bucket::P0)), impact: Some(1), ..TaskPatch::titled("x") };
        let id = db.create_task(patch).unwrap();
        assert_eq!(db.get(&id).unwrap().bucket, Bucket::P0);

        db.update_task(&id, TaskPatch::titled("renamed")).unwrap();
        assert_eq!(db.get(&id).unwrap().bucket, Bucket::P0);

        db.update_task(&id, TaskPatch { urgency: Some(4), ..Default::default() }).unwrap();
        let task = db.get(&id).unwrap();
        assert_eq!(task.bucket, Bucket::P3);
        assert_eq!(task.bucket_override, None);
        assert_eq!(task.score, 6.0);

        db.update_task(&id, TaskPatch { bucket: Some(Some(Bucket::P1)), ..Default::default() }).unwrap();
        assert_eq!(db.get(&id).unwrap().bucket, Bucket::P1);
    }

    #[test]
    fn test_update_stamps_updated_at() {
        let mut db = Database::default();
        let created = Utc::now() - Duration::hours(1);
        let id = db.create_task_at(TaskPatch::titled("x"), created).unwrap();
        db.update_task(&id, TaskPatch { description: Some(Some("more".into())), ..Default::default() })
            .unwrap();
        let task = db.get(&id).unwrap();
        assert!(task.updated_at > task.created_at);
        assert_eq!(task.description.as_deref(), Some("more"));
    }

    #[test]
    fn test_dependency_bonus_and_cleanup_on_delete() {
        let mut db = Database::default();
        let dep = db.create_task(TaskPatch::titled("first")).unwrap();
        let id = db
            .create_task(TaskPatch { dependencies: Some(vec![dep.clone()]), ..TaskPatch::titled("second") })
            .unwrap();
        assert_eq!(db.get(&id).unwrap().score, 5.0);

        db.move_task(&dep, &StatusId::new("done")).unwrap();
        assert_eq!(db.get(&id).unwrap().score, 6.0);

        db.delete_task(&dep).unwrap();
        assert!(db.get(&id).unwrap().dependencies.is_empty());
        assert!(db.delete_task(&dep).is_err());
    }

    #[test]
    fn test_self_and_unknown_dependencies_are_rejected() {
        let mut db = Database::default();
        let id = db.create_task(TaskPatch::titled("x")).unwrap();
        let own = TaskPatch { dependencies: Some(vec![id.clone()]), ..Default::default() };
        assert!(db.update_task(&id, own).is_err());
        let unknown = TaskPatch { dependencies: Some(vec!["ghost".into()]), ..Default::default() };
        assert!(db.update_task(&id, unknown).is_err());
    }

    #[test]
    fn test_meeting_tag_bonus() {
        let mut db = Database::default();
        let id = db
            .create_task(TaskPatch { tags: Some(vec!["Meeting".into()]), ..TaskPatch::titled("sync") })
            .unwrap();
        assert_eq!(db.get(&id).unwrap().score, 6.0);
    }

    #[test]
    fn test_move_to_unknown_status_fails() {
        let mut db = Database::default();
        let id = db.create_task(TaskPatch::titled("x")).unwrap();
        assert!(db.move_task(&id, &StatusId::new("limbo")).is_err());
        assert_eq!(db.get(&id).unwrap().status, StatusId::ready());
        assert!(db.move_task("ghost", &StatusId::ready()).is_err());
    }

    #[test]
    fn test_resolve_prefix() {
        let mut db = Database::default();
        let id = db.create_task(TaskPatch::titled("x")).unwrap();
        assert_eq!(db.resolve_task_id(&id[..8]).unwrap(), id);
        assert!(db.resolve_task_id("zzzz-not-here").is_err());
    }

    #[test]
    fn test_snapshot_roundtrip_and_corruption() {
        let mut db = Database::default();
        db.create_task(TaskPatch { owners: Some(vec!["Ana".into()]), ..TaskPatch::titled("x") })
            .unwrap();
        let raw = db.to_snapshot().unwrap();
        let loaded = Database::from_snapshot(&raw);
        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.owner_registry.stats("Ana").unwrap().task_count, 1);

        let fresh = Database::from_snapshot("{not json");
        assert!(fresh.tasks.is_empty());
        assert_eq!(fresh.projects.len(), 1);

        let wrong_shape = Database::from_snapshot(r#"{"tasks": 7}"#);
        assert!(wrong_shape.tasks.is_empty());
    }

    #[test]
    fn test_cleanup_reaps_orphans() {
        let mut db = Database::default();
        db.create_task(TaskPatch::titled("kept")).unwrap();
        let orphan = db.create_task(TaskPatch::titled("orphan")).unwrap();
        let second_orphan = db.create_task(TaskPatch::titled("orphan 2")).unwrap();
        for id in [&orphan, &second_orphan] {
            db.task_mut(id).unwrap().project = "vanished".into();
        }
        let before = db.tasks.len();
        db.cleanup();
        assert_eq!(db.tasks.len(), before - 2);
        assert!(db.get(&orphan).is_none());
    }

    #[test]
    fn test_cleanup_repairs_statuses_and_timers() {
        let mut db = Database::default();
        let id = db.create_task(TaskPatch::titled("x")).unwrap();
        {
            let task = db.task_mut(&id).unwrap();
            task.status = StatusId::new("legacy");
            task.timer_started_at = Some(Utc::now() - Duration::seconds(10));
        }
        db.current_project_id = "gone".into();
        db.cleanup();
        let task = db.get(&id).unwrap();
        assert_eq!(task.status, StatusId::ready());
        assert!(task.timer_started_at.is_none());
        assert!(task.elapsed_secs >= 9);
        assert_eq!(db.current_project_id, db.default_project_id());
    }

    #[test]
    fn test_cleanup_repairs_status_config() {
        let mut db = Database::default();
        let id = db.create_task(TaskPatch::titled("x")).unwrap();
        db.move_task(&id, &StatusId::new("review")).unwrap();
        for entry in db.status_config.statuses.iter_mut() {
            entry.is_default = true;
        }
        db.cleanup();
        let defaults: Vec<_> = db.status_config.statuses.iter().filter(|s| s.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id.as_str(), "backlog");
        assert_eq!(db.get(&id).unwrap().status, StatusId::new("review"));

        db.status_config.statuses.retain(|s| !s.is_completion);
        db.cleanup();
        assert_eq!(db.status_config, StatusConfig::canonical());
        assert_eq!(db.get(&id).unwrap().status, StatusId::new("review"));

        db.status_config.statuses.truncate(1);
        db.status_config.statuses[0].id = StatusId::new("only");
        db.task_mut(&id).unwrap().status = StatusId::new("only");
        db.cleanup();
        assert_eq!(db.status_config.statuses.len(), 8);
        assert_eq!(db.get(&id).unwrap().status, StatusId::ready());
    }
}
