//! # taskdeck
//!
//! Local-first task tracking engine. Tasks carry impact, urgency and effort levels
//! that feed a priority score and a P0..P3 bucket; they live in projects, move
//! through a configurable set of statuses, can be assigned to owners, and track time
//! spent in progress.
//!
//! The whole state is a single [`db::Database`] aggregate that serialises to one JSON
//! snapshot. [`engine::Engine`] owns it together with a [`storage::KeyValueStore`]
//! and writes the snapshot back on a throttled interval. Snapshots written by older
//! versions are upgraded in place by [`migrate`] when loaded.

pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod display;
pub mod engine;
pub mod error;
pub mod fields;
pub mod migrate;
pub mod owners;
pub mod project;
pub mod quick_add;
pub mod scoring;
pub mod status;
pub mod storage;
pub mod task;
pub mod timer;
pub mod validation;
