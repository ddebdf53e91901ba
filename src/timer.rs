//! Per-task time tracking.
//!
//! A running timer is a start instant on the task; stopping folds the elapsed
//! seconds into the accumulated total. Reads never mutate.

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::error::Result;
use crate::fields::StatusId;
use crate::task::Task;

/// Accumulated seconds plus the running delta, if any.
pub fn elapsed_secs(task: &Task, now: DateTime<Utc>) -> u64 {
    let running = task
        .timer_started_at
        .map(|start| (now - start).num_seconds().max(0) as u64)
        .unwrap_or(0);
    task.elapsed_secs + running
}

/// Fold a running timer into the accumulated total and clear it.
///
/// Returns the seconds added.
pub fn settle(task: &mut Task, now: DateTime<Utc>) -> u64 {
    let Some(start) = task.timer_started_at.take() else {
        return 0;
    };
    let delta = (now - start).num_seconds().max(0) as u64;
    task.elapsed_secs += delta;
    delta
}

/// Render seconds as `1h 02m`, `4m 05s` or `12s`.
pub fn format_elapsed(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

impl Database {
    /// Start a task's timer and put it in progress.
    pub fn start_timer(&mut self, id: &str) -> Result<()> {
        self.start_timer_at(id, Utc::now())
    }

    pub fn start_timer_at(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let in_progress = self.in_progress_status()?;
        let task = self.task_mut(id)?;
        if task.timer_started_at.is_none() {
            task.timer_started_at = Some(now);
        }
        let changed = task.status != in_progress;
        task.status = in_progress;
        task.updated_at = now;
        if changed {
            self.rescore_dependents(id, now);
        }
        tracing::debug!(task = %id, "Timer started");
        Ok(())
    }

    /// Stop a task's timer. Returns the seconds added by this stop.
    pub fn stop_timer(&mut self, id: &str) -> Result<u64> {
        self.stop_timer_at(id, Utc::now())
    }

    pub fn stop_timer_at(&mut self, id: &str, now: DateTime<Utc>) -> Result<u64> {
        let return_to = self.auto_return_status();
        let auto_return = self.auto_return_on_stop;
        let task = self.task_mut(id)?;
        let added = settle(task, now);
        if auto_return && task.status.is_in_progress() {
            task.status = return_to;
        }
        task.updated_at = now;
        self.rescore_dependents(id, now);
        tracing::debug!(task = %id, secs = added, "Timer stopped");
        Ok(added)
    }

    /// Live elapsed seconds for a task.
    pub fn elapsed_secs(&self, id: &str, now: DateTime<Utc>) -> Result<u64> {
        Ok(elapsed_secs(self.task(id)?, now))
    }

    fn in_progress_status(&self) -> Result<StatusId> {
        let id = StatusId::in_progress();
        if self.status_config.contains(&id) {
            Ok(id)
        } else {
            Err(crate::error::EngineError::status_not_found(id.as_str()))
        }
    }

    fn auto_return_status(&self) -> StatusId {
        let ready = StatusId::ready();
        if self.status_config.contains(&ready) {
            ready
        } else {
            self.status_config.default_status()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPatch;
    use chrono::Duration;

    #[test]
    fn test_elapsed_is_live() {
        let mut db = Database::default();
        let id = db.create_task(TaskPatch::titled("x")).unwrap();
        {
            let task = db.task_mut(&id).unwrap();
            task.elapsed_secs = 30;
            task.timer_started_at = Some(Utc::now() - Duration::seconds(90));
        }
        let secs = db.elapsed_secs(&id, Utc::now()).unwrap();
        assert!((119..=121).contains(&secs), "got {secs}");
        let again = db.elapsed_secs(&id, Utc::now()).unwrap();
        assert!((119..=121).contains(&again));
        assert_eq!(db.get(&id).unwrap().elapsed_secs, 30);
    }

    #[test]
    fn test_start_forces_in_progress() {
        let mut db = Database::default();
        let id = db
            .create_task(TaskPatch { status: Some("done".into()), ..TaskPatch::titled("x") })
            .unwrap();
        db.start_timer(&id).unwrap();
        let task = db.get(&id).unwrap();
        assert!(task.status.is_in_progress());
        assert!(task.timer_running());
    }

    #[test]
    fn test_stop_accumulates_and_returns_to_ready() {
        let mut db = Database::default();
        let id = db.create_task(TaskPatch::titled("x")).unwrap();
        let start = Utc::now() - Duration::seconds(300);
        db.start_timer_at(&id, start).unwrap();
        db.start_timer_at(&id, start + Duration::seconds(100)).unwrap();
        let added = db.stop_timer_at(&id, start + Duration::seconds(300)).unwrap();
        assert_eq!(added, 300);
        let task = db.get(&id).unwrap();
        assert_eq!(task.elapsed_secs, 300);
        assert!(task.timer_started_at.is_none());
        assert_eq!(task.status, StatusId::ready());
        assert_eq!(db.stop_timer(&id).unwrap(), 0);
    }

    #[test]
    fn test_stop_without_auto_return_keeps_status() {
        let mut db = Database::default();
        db.auto_return_on_stop = false;
        let id = db.create_task(TaskPatch::titled("x")).unwrap();
        db.start_timer(&id).unwrap();
        db.stop_timer(&id).unwrap();
        assert!(db.get(&id).unwrap().status.is_in_progress());
    }

    #[test]
    fn test_moving_out_of_progress_stops_timer() {
        let mut db = Database::default();
        let id = db.create_task(TaskPatch::titled("x")).unwrap();
        db.start_timer_at(&id, Utc::now() - Duration::seconds(60)).unwrap();
        db.move_task(&id, &StatusId::new("review")).unwrap();
        let task = db.get(&id).unwrap();
        assert!(task.timer_started_at.is_none());
        assert!(task.elapsed_secs >= 59);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(12), "12s");
        assert_eq!(format_elapsed(245), "4m 05s");
        assert_eq!(format_elapsed(3720), "1h 02m");
    }
}
