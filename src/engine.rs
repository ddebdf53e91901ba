//! Persistence wrapper around the task store.
//!
//! `Engine` owns a `Database` and the store it was loaded from. Mutable access marks
//! the engine dirty; `tick` writes the full snapshot once the flush interval has
//! passed. A failed write is logged and retried on a later tick, and the in-memory
//! state stays authoritative in the meantime.
//!
//! If the stored snapshot exists but cannot be read, the engine runs degraded: it
//! works on a fresh in-memory database and never writes the snapshot key, so the
//! unreadable data on disk is left for the user to recover.

use std::time::{Duration, Instant};

use crate::db::Database;
use crate::error::StorageError;
use crate::fields::ViewMode;
use crate::storage::KeyValueStore;

pub const SNAPSHOT_KEY: &str = "taskdeck.snapshot";
pub const VIEW_KEY: &str = "taskdeck.view";

pub struct Engine<S: KeyValueStore> {
    db: Database,
    store: S,
    flush_interval: Duration,
    dirty: bool,
    degraded: bool,
    last_flush: Instant,
}

impl<S: KeyValueStore> Engine<S> {
    /// Load the snapshot from `store`, migrating it, or start fresh.
    pub fn open(store: S, flush_interval: Duration) -> Self {
        let mut degraded = false;
        let db = match store.get(SNAPSHOT_KEY) {
            Ok(Some(raw)) => Database::from_snapshot(&raw),
            Ok(None) => {
                tracing::info!("No snapshot found, starting with a fresh database");
                Database::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read snapshot, continuing in memory only");
                degraded = true;
                Database::default()
            }
        };
        tracing::debug!(tasks = db.tasks.len(), projects = db.projects.len(), "Loaded database");
        Engine { db, store, flush_interval, dirty: false, degraded, last_flush: Instant::now() }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Mutable access to the database; the next due tick will persist it.
    pub fn db_mut(&mut self) -> &mut Database {
        self.dirty = true;
        &mut self.db
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True when the snapshot could not be read and will not be overwritten.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Write the snapshot now.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        if self.degraded {
            tracing::warn!("Not writing snapshot: the stored copy could not be read");
            return Err(StorageError::SnapshotUnreadable);
        }
        let raw = self.db.to_snapshot()?;
        self.store.set(SNAPSHOT_KEY, &raw)?;
        self.dirty = false;
        self.last_flush = Instant::now();
        tracing::debug!(bytes = raw.len(), "Flushed snapshot");
        Ok(())
    }

    /// Flush if dirty and the interval has elapsed. Returns whether a write succeeded.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        if !self.dirty || now.duration_since(self.last_flush) < self.flush_interval {
            return false;
        }
        match self.flush() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot flush failed, keeping changes in memory");
                self.last_flush = now;
                false
            }
        }
    }

    /// Flush any pending changes regardless of the interval.
    pub fn close(mut self) -> Result<(), StorageError> {
        if self.degraded {
            if self.dirty {
                tracing::warn!("Discarding in-memory changes; the stored snapshot was left untouched");
            }
            return Ok(());
        }
        if self.dirty {
            self.flush()?;
        }
        Ok(())
    }

    /// Stored layout preference; unknown or unreadable values fall back to the default.
    pub fn view_mode(&self) -> ViewMode {
        match self.store.get(VIEW_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => ViewMode::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read view preference");
                ViewMode::default()
            }
        }
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&mode)?;
        self.store.set(VIEW_KEY, &raw)
    }

    /// Forget the stored layout preference.
    pub fn reset_view_mode(&mut self) -> Result<(), StorageError> {
        self.store.remove(VIEW_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use crate::task::TaskPatch;

    #[test]
    fn test_tick_respects_interval() {
        let mut engine = Engine::open(MemoryStore::new(), Duration::from_secs(1));
        assert!(!engine.tick());
        engine.db_mut().create_task(TaskPatch::titled("x")).unwrap();
        let start = Instant::now();
        assert!(!engine.tick_at(start));
        assert!(engine.tick_at(start + Duration::from_secs(2)));
        assert!(!engine.is_dirty());
        assert!(engine.store().get(SNAPSHOT_KEY).unwrap().is_some());
    }

    #[test]
    fn test_failed_flush_keeps_state_in_memory() {
        let mut engine = Engine::open(MemoryStore::with_quota(16), Duration::ZERO);
        engine.db_mut().create_task(TaskPatch::titled("too big to store")).unwrap();
        assert!(!engine.tick());
        assert!(engine.is_dirty());
        assert_eq!(engine.db().tasks.len(), 1);

        engine.store_mut().set_quota(None);
        assert!(engine.tick());
        assert!(!engine.is_dirty());
    }

    #[test]
    fn test_reopen_sees_flushed_state() {
        let mut engine = Engine::open(MemoryStore::new(), Duration::ZERO);
        let id = engine.db_mut().create_task(TaskPatch::titled("persist me")).unwrap();
        engine.flush().unwrap();
        let store = engine.store().clone();
        let reopened = Engine::open(store, Duration::ZERO);
        assert_eq!(reopened.db().get(&id).unwrap().title, "persist me");
    }

    #[test]
    fn test_corrupt_snapshot_starts_fresh() {
        let mut store = MemoryStore::new();
        store.set(SNAPSHOT_KEY, "][").unwrap();
        let engine = Engine::open(store, Duration::ZERO);
        assert!(engine.db().tasks.is_empty());
        assert_eq!(engine.db().projects.len(), 1);
    }

    #[test]
    fn test_view_mode_is_stored_separately() {
        let mut engine = Engine::open(MemoryStore::new(), Duration::ZERO);
        assert_eq!(engine.view_mode(), ViewMode::Board);
        engine.set_view_mode(ViewMode::List).unwrap();
        assert_eq!(engine.view_mode(), ViewMode::List);
        assert!(engine.store().get(SNAPSHOT_KEY).unwrap().is_none());

        engine.reset_view_mode().unwrap();
        assert!(engine.store().get(VIEW_KEY).unwrap().is_none());
        assert_eq!(engine.view_mode(), ViewMode::Board);
    }

    #[test]
    fn test_unreadable_snapshot_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{SNAPSHOT_KEY}.json"));
        let original: &[u8] = b"{\xff\xfe}";
        std::fs::write(&path, original).unwrap();

        let store = FileStore::open(dir.path(), 1024 * 1024).unwrap();
        let mut engine = Engine::open(store, Duration::ZERO);
        assert!(engine.is_degraded());
        assert!(engine.db().tasks.is_empty());

        engine.db_mut().create_task(TaskPatch::titled("scratch")).unwrap();
        assert!(!engine.tick());
        assert!(matches!(engine.flush(), Err(StorageError::SnapshotUnreadable)));
        assert!(engine.is_dirty());
        engine.set_view_mode(ViewMode::List).unwrap();
        engine.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), original);
    }
}
