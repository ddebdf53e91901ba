//! Enumerations and field types for task management.
//!
//! This module defines the closed value sets used on tasks and in the CLI:
//! priority buckets, owner types, the status identifier newtype, sorting keys and
//! the persisted view preference.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Discrete priority tier, P0 most urgent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    #[serde(alias = "p0")]
    #[value(name = "p0")]
    P0,
    #[serde(alias = "p1")]
    #[value(name = "p1")]
    P1,
    #[serde(alias = "p2")]
    #[value(name = "p2")]
    P2,
    #[serde(alias = "p3")]
    #[value(name = "p3")]
    P3,
}

impl Bucket {
    /// Parse `p0`..`p3`, case-insensitive.
    pub fn parse(s: &str) -> Option<Bucket> {
        match s.to_ascii_lowercase().as_str() {
            "p0" => Some(Bucket::P0),
            "p1" => Some(Bucket::P1),
            "p2" => Some(Bucket::P2),
            "p3" => Some(Bucket::P3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::P0 => "P0",
            Bucket::P1 => "P1",
            Bucket::P2 => "P2",
            Bucket::P3 => "P3",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Who a task is delegated to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    #[default]
    #[serde(rename = "self", alias = "me")]
    #[value(name = "self")]
    Myself,
    #[serde(alias = "ai")]
    Agent,
    Other,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::Myself => "self",
            OwnerType::Agent => "agent",
            OwnerType::Other => "other",
        }
    }
}

/// Identifier of a status configuration entry.
///
/// Status sets are user-configurable, so this is a string newtype rather than an enum;
/// it is checked against the configuration once, when a task operation accepts it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusId(String);

impl StatusId {
    pub const IN_PROGRESS: &'static str = "in_progress";
    pub const READY: &'static str = "ready";

    pub fn new(id: impl Into<String>) -> Self {
        StatusId(id.into())
    }

    pub fn in_progress() -> Self {
        StatusId::new(Self::IN_PROGRESS)
    }

    pub fn ready() -> Self {
        StatusId::new(Self::READY)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_in_progress(&self) -> bool {
        self.0 == Self::IN_PROGRESS
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for StatusId {
    fn from(s: &str) -> Self {
        StatusId::new(s)
    }
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Score,
    Due,
    Created,
}

/// Persisted layout preference of the presentation layer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Board,
    List,
}
