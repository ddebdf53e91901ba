//! Plain-text rendering helpers for the command-line front end.

use chrono::{DateTime, Local, Utc};

use crate::db::Database;
use crate::task::Task;
use crate::timer::{elapsed_secs, format_elapsed};

/// Format a timestamp relative to now ("today 18:00", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let local = d.with_timezone(&Local);
            let days = (local.date_naive() - now.with_timezone(&Local).date_naive()).num_days();
            match days {
                0 => format!("today {}", local.format("%H:%M")),
                1 => "tomorrow".into(),
                n if n > 1 => format!("in {n}d"),
                n => format!("{}d late", -n),
            }
        }
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Print tasks in a formatted table.
pub fn print_table(db: &Database, tasks: &[&Task]) {
    println!(
        "{:<9} {:<4} {:<6} {:<12} {:<14} {:<8} {}",
        "ID", "Pri", "Score", "Status", "Due", "Time", "Title [tags] @owners"
    );
    let now = Utc::now();
    for t in tasks {
        let status = db
            .status_config
            .get(&t.status)
            .map(|s| s.label.as_str())
            .unwrap_or(t.status.as_str());
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        let owners = if t.owners.is_empty() {
            String::new()
        } else {
            format!(" @{}", t.owners.join(" @"))
        };
        let running = if t.timer_running() { "*" } else { "" };
        println!(
            "{:<9} {:<4} {:<6.1} {:<12} {:<14} {:<8} {}{}{}",
            truncate(&t.id, 8),
            t.bucket,
            t.score,
            truncate(status, 12),
            format_due_relative(t.due, now),
            format!("{}{}", format_elapsed(elapsed_secs(t, now)), running),
            t.title,
            tags,
            owners
        );
    }
}

/// Print every field of one task.
pub fn print_task(db: &Database, t: &Task) {
    let now = Utc::now();
    let project = db.project(&t.project).map(|p| p.name.as_str()).unwrap_or("-");
    let status = db
        .status_config
        .get(&t.status)
        .map(|s| s.label.as_str())
        .unwrap_or(t.status.as_str());
    let bucket = match t.bucket_override {
        Some(_) => format!("{} (set manually)", t.bucket),
        None => t.bucket.to_string(),
    };
    println!("ID:           {}", t.id);
    println!("Title:        {}", t.title);
    println!("Project:      {}", project);
    println!("Status:       {}", status);
    println!("Priority:     {}  score {:.1}", bucket, t.score);
    println!("Impact:       {}  urgency {}  effort {}", t.impact, t.urgency, t.effort);
    println!("Due:          {}", format_due_relative(t.due, now));
    println!("Expected by:  {}", format_due_relative(t.expected_by, now));
    println!("Owner type:   {}", t.owner_type.as_str());
    println!("Owners:       {}", if t.owners.is_empty() { "-".into() } else { t.owners.join(", ") });
    println!("Tags:         {}", if t.tags.is_empty() { "-".into() } else { t.tags.join(",") });
    println!("Depends on:   {}", if t.dependencies.is_empty() { "-".into() } else { t.dependencies.join(", ") });
    println!(
        "Time:         {}{}",
        format_elapsed(elapsed_secs(t, now)),
        if t.timer_running() { " (running)" } else { "" }
    );
    println!("Created:      {}", t.created_at.to_rfc3339());
    println!("Updated:      {}", t.updated_at.to_rfc3339());
    println!("Description:\n{}\n", t.description.as_deref().unwrap_or("-"));
}
