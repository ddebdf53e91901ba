//! Snapshot schema migrations.
//!
//! Persisted snapshots are upgraded in place, oldest step first:
//!
//! - v1 → v1.1 adds `ownerRegistry`
//! - v1.1 → v2 adds `projects` and `currentProjectId`, and assigns project-less tasks
//!   to the default project
//! - v2 → v2.1 adds `statusConfig` with the canonical statuses
//!
//! Each step checks for its own top-level key and does nothing when it is already
//! present, so the whole pipeline can run on every load. A final pass repairs
//! individual task records (missing ids or timestamps) so that one damaged record
//! does not cost the rest of the snapshot.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::db::SCHEMA_VERSION;
use crate::project::{Project, DEFAULT_PROJECT_ID};
use crate::status::StatusConfig;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("snapshot root must be an object, found {0}")]
    UnexpectedRoot(&'static str),

    #[error("failed to encode migrated field: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Upgrade `snapshot` to the current schema.
pub fn run(snapshot: Value, now: DateTime<Utc>) -> Result<Value, MigrationError> {
    let mut snapshot = match snapshot {
        // The earliest format stored the bare task list.
        Value::Array(tasks) => json!({ "tasks": tasks, "version": 1 }),
        other => other,
    };
    let kind = kind_of(&snapshot);
    let root = snapshot
        .as_object_mut()
        .ok_or(MigrationError::UnexpectedRoot(kind))?;
    if !root.contains_key("tasks") {
        root.insert("tasks".into(), Value::Array(Vec::new()));
    }

    add_owner_registry(root);
    add_projects(root, now)?;
    add_status_config(root)?;
    repair_tasks(root, now);
    root.insert("version".into(), json!(SCHEMA_VERSION));
    Ok(snapshot)
}

/// v1.1: seed the registry with every owner name found on tasks.
fn add_owner_registry(root: &mut Map<String, Value>) {
    if root.contains_key("ownerRegistry") {
        return;
    }
    let mut owners: Vec<String> = Vec::new();
    for task in tasks(root) {
        let names = task.get("owners").and_then(Value::as_array).into_iter().flatten();
        for name in names.filter_map(Value::as_str) {
            if !owners.iter().any(|o| o == name) {
                owners.push(name.to_string());
            }
        }
    }
    tracing::info!(owners = owners.len(), "Migrating snapshot to v1.1");
    root.insert("ownerRegistry".into(), json!({ "owners": owners, "statistics": {} }));
}

/// v2: introduce projects and move every unassigned task into the default project.
fn add_projects(root: &mut Map<String, Value>, now: DateTime<Utc>) -> Result<(), MigrationError> {
    if root.contains_key("projects") {
        return Ok(());
    }
    let mut assigned = 0;
    if let Some(Value::Array(tasks)) = root.get_mut("tasks") {
        for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
            let has_project = task.get("project").is_some_and(|p| p.is_string());
            if !has_project {
                task.insert("project".into(), json!(DEFAULT_PROJECT_ID));
                assigned += 1;
            }
        }
    }
    tracing::info!(assigned, "Migrating snapshot to v2");
    let project = serde_json::to_value(Project::default_project(now))?;
    root.insert("projects".into(), Value::Array(vec![project]));
    root.insert("currentProjectId".into(), json!(DEFAULT_PROJECT_ID));
    Ok(())
}

/// v2.1: configurable statuses, seeded with the canonical set.
fn add_status_config(root: &mut Map<String, Value>) -> Result<(), MigrationError> {
    if root.contains_key("statusConfig") {
        return Ok(());
    }
    tracing::info!("Migrating snapshot to v2.1");
    root.insert("statusConfig".into(), serde_json::to_value(StatusConfig::canonical())?);
    Ok(())
}

/// Fill in fields every task needs and drop entries that are not records at all.
fn repair_tasks(root: &mut Map<String, Value>, now: DateTime<Utc>) {
    if !root.get("tasks").is_some_and(Value::is_array) {
        tracing::warn!("Snapshot tasks field is not a list, replacing it");
        root.insert("tasks".into(), Value::Array(Vec::new()));
    }
    let Some(Value::Array(tasks)) = root.get_mut("tasks") else {
        return;
    };
    let before = tasks.len();
    tasks.retain(Value::is_object);
    if tasks.len() != before {
        tracing::warn!(dropped = before - tasks.len(), "Dropping task entries that are not objects");
    }
    let stamp = Value::String(now.to_rfc3339());
    for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
        if !task.get("id").is_some_and(Value::is_string) {
            task.insert("id".into(), json!(uuid::Uuid::new_v4().to_string()));
        }
        if !task.get("createdAt").is_some_and(Value::is_string) {
            task.insert("createdAt".into(), stamp.clone());
        }
        if !task.get("updatedAt").is_some_and(Value::is_string) {
            let created = task.get("createdAt").cloned().unwrap_or_else(|| stamp.clone());
            task.insert("updatedAt".into(), created);
        }
    }
}

fn tasks(root: &Map<String, Value>) -> impl Iterator<Item = &Value> {
    root.get("tasks").and_then(Value::as_array).into_iter().flatten()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
