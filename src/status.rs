//! Status configuration.
//!
//! The ordered set of workflow columns a task can sit in. The set is editable but
//! always keeps at least two entries, exactly one default entry and at least one
//! completion entry.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::fields::StatusId;
use crate::validation::*;

pub const STATUS_CONFIG_VERSION: u32 = 1;

/// One workflow column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub id: StatusId,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub order: usize,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_completion: bool,
    #[serde(default)]
    pub shortcut: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusConfig {
    pub statuses: Vec<StatusEntry>,
    pub version: u32,
}

/// Fields for a new status entry.
#[derive(Debug, Clone, Default)]
pub struct NewStatus {
    pub label: String,
    pub description: String,
    pub is_default: bool,
    pub is_completion: bool,
    pub shortcut: Option<char>,
}

/// Partial update of a status entry; `shortcut: Some(None)` clears the key.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub label: Option<String>,
    pub description: Option<String>,
    pub is_default: Option<bool>,
    pub is_completion: Option<bool>,
    pub shortcut: Option<Option<char>>,
}

const CANONICAL: [(&str, &str, &str, bool, bool, char); 8] = [
    ("backlog", "Backlog", "Captured but not yet planned", false, false, '1'),
    ("ready", "Ready", "Planned and ready to pick up", true, false, '2'),
    ("in_progress", "In Progress", "Actively being worked on", false, false, '3'),
    ("waiting", "Waiting", "Waiting on someone else", false, false, '4'),
    ("review", "Review", "Done, pending review", false, false, '5'),
    ("blocked", "Blocked", "Cannot continue until unblocked", false, false, '6'),
    ("done", "Done", "Finished", false, true, '7'),
    ("cancelled", "Cancelled", "Dropped without finishing", false, true, '8'),
];

impl Default for StatusConfig {
    fn default() -> Self {
        StatusConfig::canonical()
    }
}

impl StatusConfig {
    /// The eight built-in entries.
    pub fn canonical() -> Self {
        let statuses = CANONICAL
            .iter()
            .enumerate()
            .map(|(order, &(id, label, description, is_default, is_completion, key))| StatusEntry {
                id: StatusId::new(id),
                label: label.to_string(),
                description: description.to_string(),
                order,
                is_default,
                is_completion,
                shortcut: Some(key),
            })
            .collect();
        StatusConfig { statuses, version: STATUS_CONFIG_VERSION }
    }

    pub fn is_canonical_id(id: &StatusId) -> bool {
        CANONICAL.iter().any(|(cid, ..)| *cid == id.as_str())
    }

    pub fn get(&self, id: &StatusId) -> Option<&StatusEntry> {
        self.statuses.iter().find(|s| &s.id == id)
    }

    pub fn contains(&self, id: &StatusId) -> bool {
        self.get(id).is_some()
    }

    /// Look up an entry by id, or by label case-insensitively.
    pub fn resolve(&self, key: &str) -> Option<&StatusEntry> {
        self.statuses
            .iter()
            .find(|s| s.id.as_str() == key)
            .or_else(|| self.statuses.iter().find(|s| same_name(&s.label, key)))
    }

    pub fn default_status(&self) -> StatusId {
        self.statuses
            .iter()
            .find(|s| s.is_default)
            .or_else(|| self.statuses.first())
            .map(|s| s.id.clone())
            .unwrap_or_else(StatusId::ready)
    }

    pub fn is_completion(&self, id: &StatusId) -> bool {
        self.get(id).is_some_and(|s| s.is_completion)
    }

    /// Entries sorted by their ordering index.
    pub fn ordered(&self) -> Vec<&StatusEntry> {
        let mut entries: Vec<&StatusEntry> = self.statuses.iter().collect();
        entries.sort_by_key(|s| s.order);
        entries
    }

    /// Add an entry at the end of the ordering and return its id.
    pub fn add(&mut self, new: NewStatus) -> Result<StatusId> {
        if self.statuses.len() >= MAX_STATUS_ENTRIES {
            return Err(EngineError::validation(format!(
                "At most {MAX_STATUS_ENTRIES} statuses are allowed"
            )));
        }
        validate_status_label(&new.label)?;
        validate_status_description(&new.description)?;
        self.check_label_free(&new.label, None)?;
        if let Some(key) = new.shortcut {
            self.check_shortcut_free(key, None)?;
        }

        let id = self.unique_id(&new.label);
        if new.is_default {
            self.statuses.iter_mut().for_each(|s| s.is_default = false);
        }
        let order = self.statuses.iter().map(|s| s.order + 1).max().unwrap_or(0);
        self.statuses.push(StatusEntry {
            id: id.clone(),
            label: new.label.trim().to_string(),
            description: new.description.trim().to_string(),
            order,
            is_default: new.is_default,
            is_completion: new.is_completion,
            shortcut: new.shortcut,
        });
        Ok(id)
    }

    pub fn update(&mut self, id: &StatusId, update: StatusUpdate) -> Result<()> {
        let current = self.get(id).ok_or_else(|| EngineError::status_not_found(id.as_str()))?;

        if let Some(label) = &update.label {
            validate_status_label(label)?;
            self.check_label_free(label, Some(id))?;
        }
        if let Some(description) = &update.description {
            validate_status_description(description)?;
        }
        if let Some(Some(key)) = update.shortcut {
            self.check_shortcut_free(key, Some(id))?;
        }
        if update.is_default == Some(false) && current.is_default {
            return Err(EngineError::validation(
                "Cannot unset the default status; mark another status as default instead",
            ));
        }
        if update.is_completion == Some(false) && current.is_completion && self.completion_count() == 1 {
            return Err(EngineError::validation(
                "At least one status must be marked as completion",
            ));
        }

        if update.is_default == Some(true) {
            self.statuses.iter_mut().for_each(|s| s.is_default = false);
        }
        let Some(entry) = self.statuses.iter_mut().find(|s| &s.id == id) else {
            return Err(EngineError::status_not_found(id.as_str()));
        };
        if let Some(label) = update.label {
            entry.label = label.trim().to_string();
        }
        if let Some(description) = update.description {
            entry.description = description.trim().to_string();
        }
        if let Some(is_default) = update.is_default {
            entry.is_default = is_default;
        }
        if let Some(is_completion) = update.is_completion {
            entry.is_completion = is_completion;
        }
        if let Some(shortcut) = update.shortcut {
            entry.shortcut = shortcut;
        }
        Ok(())
    }

    /// Check that `id` may be deleted in favour of `target`.
    pub fn check_delete(&self, id: &StatusId, target: &StatusId) -> Result<()> {
        let entry = self.get(id).ok_or_else(|| EngineError::status_not_found(id.as_str()))?;
        if id == target {
            return Err(EngineError::validation(
                "Choose a different status to move existing tasks to",
            ));
        }
        if !self.contains(target) {
            return Err(EngineError::status_not_found(target.as_str()));
        }
        if self.statuses.len() <= MIN_STATUS_ENTRIES {
            return Err(EngineError::validation(format!(
                "At least {MIN_STATUS_ENTRIES} statuses are required"
            )));
        }
        if entry.is_default {
            return Err(EngineError::validation("Cannot delete the default status"));
        }
        if entry.is_completion && self.completion_count() == 1 {
            return Err(EngineError::validation(
                "Cannot delete the last completion status",
            ));
        }
        Ok(())
    }

    /// Remove `id` and renumber the remaining orderings from zero.
    pub fn remove(&mut self, id: &StatusId, target: &StatusId) -> Result<()> {
        self.check_delete(id, target)?;
        self.statuses.retain(|s| &s.id != id);
        self.renumber();
        Ok(())
    }

    /// Apply a new ordering; `ids` must name every entry exactly once.
    pub fn reorder(&mut self, ids: &[StatusId]) -> Result<()> {
        if ids.len() != self.statuses.len() {
            return Err(EngineError::validation("Reorder must list every status exactly once"));
        }
        for (i, id) in ids.iter().enumerate() {
            if !self.contains(id) {
                return Err(EngineError::status_not_found(id.as_str()));
            }
            if ids[..i].contains(id) {
                return Err(EngineError::validation(format!("Status '{id}' listed twice")));
            }
        }
        for (order, id) in ids.iter().enumerate() {
            if let Some(entry) = self.statuses.iter_mut().find(|s| &s.id == id) {
                entry.order = order;
            }
        }
        self.statuses.sort_by_key(|s| s.order);
        Ok(())
    }

    /// Restore the configuration invariants after loading a stored copy.
    ///
    /// A set that is too small or too large, has duplicate ids or lacks a completion
    /// entry is replaced by the canonical one. A wrong number of defaults is fixed in
    /// place by keeping the first flagged entry, or the first entry if none is
    /// flagged. Returns whether anything changed.
    pub fn repair(&mut self) -> bool {
        let mut ids: Vec<&StatusId> = self.statuses.iter().map(|s| &s.id).collect();
        ids.sort();
        ids.dedup();
        let broken = self.statuses.len() < MIN_STATUS_ENTRIES
            || self.statuses.len() > MAX_STATUS_ENTRIES
            || ids.len() != self.statuses.len()
            || self.completion_count() == 0;
        if broken {
            *self = StatusConfig::canonical();
            return true;
        }

        let mut changed = false;
        let contiguous = self.ordered().iter().enumerate().all(|(i, s)| s.order == i);
        if !contiguous {
            self.renumber();
            changed = true;
        }
        if self.statuses.iter().filter(|s| s.is_default).count() != 1 {
            let ordered = self.ordered();
            let keep = ordered
                .iter()
                .find(|s| s.is_default)
                .or(ordered.first())
                .map(|s| s.id.clone());
            for entry in self.statuses.iter_mut() {
                entry.is_default = Some(&entry.id) == keep.as_ref();
            }
            changed = true;
        }
        changed
    }

    fn renumber(&mut self) {
        self.statuses.sort_by_key(|s| s.order);
        for (order, entry) in self.statuses.iter_mut().enumerate() {
            entry.order = order;
        }
    }

    fn completion_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_completion).count()
    }

    fn check_label_free(&self, label: &str, except: Option<&StatusId>) -> Result<()> {
        let taken = self
            .statuses
            .iter()
            .any(|s| Some(&s.id) != except && same_name(&s.label, label));
        if taken {
            return Err(EngineError::validation(format!(
                "A status named '{}' already exists",
                label.trim()
            )));
        }
        Ok(())
    }

    fn check_shortcut_free(&self, key: char, except: Option<&StatusId>) -> Result<()> {
        validate_shortcut(key)?;
        let taken = self
            .statuses
            .iter()
            .any(|s| Some(&s.id) != except && s.shortcut.is_some_and(|k| k.eq_ignore_ascii_case(&key)));
        if taken {
            return Err(EngineError::validation(format!("Shortcut '{key}' is already in use")));
        }
        Ok(())
    }

    /// Slug of the label, suffixed until it is unused.
    fn unique_id(&self, label: &str) -> StatusId {
        let base = slugify(label);
        let base = if base.is_empty() { "status".to_string() } else { base };
        let mut candidate = base.clone();
        let mut n = 2;
        while self.contains(&StatusId::new(candidate.as_str())) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        StatusId::new(candidate)
    }
}

impl Database {
    pub fn add_status(&mut self, new: NewStatus) -> Result<StatusId> {
        self.status_config.add(new)
    }

    pub fn update_status(&mut self, id: &StatusId, update: StatusUpdate) -> Result<()> {
        self.status_config.update(id, update)?;
        self.rescore_all(Utc::now());
        Ok(())
    }

    pub fn reorder_statuses(&mut self, ids: &[StatusId]) -> Result<()> {
        self.status_config.reorder(ids)
    }

    /// Delete a status, moving its tasks to `target`. Returns the number of tasks moved.
    pub fn delete_status(&mut self, id: &StatusId, target: &StatusId) -> Result<usize> {
        self.status_config.remove(id, target)?;
        let moved = self.reassign_statuses(|status| status == id, target);
        tracing::info!(status = %id, target = %target, tasks = moved, "Deleted status");
        Ok(moved)
    }

    /// Replace the configuration with the canonical set. Tasks whose status is not a
    /// canonical id move to the canonical default. Returns the number of tasks moved.
    pub fn restore_default_statuses(&mut self) -> usize {
        self.status_config = StatusConfig::canonical();
        let target = self.status_config.default_status();
        let moved = self.reassign_statuses(|status| !StatusConfig::is_canonical_id(status), &target);
        tracing::info!(tasks = moved, "Restored default statuses");
        moved
    }

    fn reassign_statuses(&mut self, matches: impl Fn(&StatusId) -> bool, target: &StatusId) -> usize {
        let now = Utc::now();
        let mut moved = 0;
        for task in self.tasks.iter_mut().filter(|t| matches(&t.status)) {
            if task.timer_running() && !target.is_in_progress() {
                crate::timer::settle(task, now);
            }
            task.status = target.clone();
            task.updated_at = now;
            moved += 1;
        }
        if moved > 0 {
            self.rescore_all(now);
        }
        moved
    }
}

fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
