//! Task data structure and the patch type used to mutate it.
//!
//! This module defines the core `Task` struct that represents a single work item
//! with its scoring inputs, ownership, scheduling and time-tracking fields, plus
//! `TaskPatch`, the partial update produced by the quick-add parser and accepted by
//! the task store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::*;
use crate::scoring::{ScoreInput, DEFAULT_LEVEL};

fn default_level() -> u8 {
    DEFAULT_LEVEL
}

fn default_bucket() -> Bucket {
    Bucket::P3
}

/// A work item with computed priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub project: String,
    /// Missing in damaged records; load-time cleanup moves those to the default status.
    #[serde(default)]
    pub status: StatusId,
    #[serde(default = "default_level")]
    pub impact: u8,
    #[serde(default = "default_level")]
    pub urgency: u8,
    #[serde(default = "default_level")]
    pub effort: u8,
    #[serde(default)]
    pub score: f64,
    #[serde(default = "default_bucket")]
    pub bucket: Bucket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_override: Option<Bucket>,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_type: OwnerType,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub expected_by: Option<DateTime<Utc>>,
    #[serde(default)]
    pub elapsed_secs: u64,
    #[serde(default)]
    pub timer_started_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Scoring inputs; the context bonuses are filled in by the store.
    pub fn score_input(&self) -> ScoreInput {
        ScoreInput {
            impact: self.impact,
            urgency: self.urgency,
            effort: self.effort,
            due: self.due,
            unblocked: false,
            meeting: self.tags.iter().any(|t| t == MEETING_TAG),
        }
    }

    pub fn has_owner(&self, name: &str) -> bool {
        self.owners.iter().any(|o| o == name)
    }

    pub fn timer_running(&self) -> bool {
        self.timer_started_at.is_some()
    }
}

/// Tag that marks a task as belonging to a meeting.
pub const MEETING_TAG: &str = "meeting";

/// A partial update to a task.
///
/// `None` leaves a field alone. Fields that can be cleared use a nested `Option`,
/// where `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub project: Option<String>,
    pub status: Option<StatusId>,
    pub impact: Option<u8>,
    pub urgency: Option<u8>,
    pub effort: Option<u8>,
    pub bucket: Option<Option<Bucket>>,
    pub due: Option<Option<DateTime<Utc>>>,
    pub expected_by: Option<Option<DateTime<Utc>>>,
    pub owner_type: Option<OwnerType>,
    pub owners: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub dependencies: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn titled(title: impl Into<String>) -> Self {
        TaskPatch { title: Some(title.into()), ..Default::default() }
    }

    /// True when the patch changes something the score depends on.
    pub fn touches_scoring(&self) -> bool {
        self.impact.is_some() || self.urgency.is_some() || self.effort.is_some() || self.due.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }
}

/// Normalise a tag string by trimming, lowercasing, and replacing spaces with hyphens.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Normalise tags, dropping empties and duplicates while keeping first-seen order.
pub fn normalise_tags(inputs: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = normalise_tag(part);
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_tags() {
        let tags = normalise_tags(&["Auth, backend".to_string(), "auth".into(), "Big Thing".into()]);
        assert_eq!(tags, vec!["auth", "backend", "big-thing"]);
    }

    #[test]
    fn test_patch_scoring_detection() {
        assert!(!TaskPatch::titled("x").touches_scoring());
        let patch = TaskPatch { due: Some(None), ..Default::default() };
        assert!(patch.touches_scoring());
        assert!(TaskPatch::default().is_empty());
    }

    #[test]
    fn test_task_deserialises_with_defaults() {
        let json = r#"{
            "id": "t1", "title": "Legacy", "project": "default", "status": "ready",
            "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.impact, 2);
        assert_eq!(task.effort, 2);
        assert_eq!(task.owner_type, OwnerType::Myself);
        assert!(task.owners.is_empty());
        assert_eq!(task.elapsed_secs, 0);
    }
}
