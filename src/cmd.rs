//! Command implementations for the CLI interface.
//!
//! This module contains the subcommand definitions and their handlers. Handlers
//! take the engine, call the task store, and print a short confirmation; failures
//! are returned to `main`, which reports them and exits non-zero.

use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use clap_complete::{generate, Shell};

use crate::display::*;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::fields::*;
use crate::quick_add::{parse_quick_add, parse_when};
use crate::status::{NewStatus, StatusUpdate};
use crate::storage::KeyValueStore;
use crate::task::{normalise_tags, Task, TaskPatch};

#[derive(Subcommand)]
pub enum Commands {
    /// Add a task from a quick-add line, e.g. `Fix login !p0 due:today @ai +auth`.
    Add {
        /// Quick-add text; words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Project name or id (defaults to the active project).
        #[arg(long)]
        project: Option<String>,
    },

    /// List tasks in the active project.
    List {
        /// Include tasks in completion statuses.
        #[arg(long)]
        all: bool,
        /// List tasks from every project.
        #[arg(long)]
        all_projects: bool,
        /// Filter by status id or label.
        #[arg(long)]
        status: Option<String>,
        /// Filter by owner name.
        #[arg(long)]
        owner: Option<String>,
        /// Filter by tag. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Score)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task by id or id prefix.
    View { id: String },

    /// Update fields on a task.
    Update {
        /// Task id or id prefix.
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        /// Project name or id.
        #[arg(long)]
        project: Option<String>,
        /// Status id or label.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        impact: Option<u8>,
        #[arg(long)]
        urgency: Option<u8>,
        #[arg(long)]
        effort: Option<u8>,
        /// Pin the priority bucket.
        #[arg(long, value_enum)]
        bucket: Option<Bucket>,
        /// Go back to the computed bucket.
        #[arg(long)]
        clear_bucket: bool,
        /// Due: today | tomorrow | YYYY-MM-DD, optionally followed by HH:MM.
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
        /// Expected-by, same format as --due.
        #[arg(long)]
        expect: Option<String>,
        #[arg(long)]
        clear_expect: bool,
        #[arg(long, value_enum)]
        owner_type: Option<OwnerType>,
        /// Add tags. May be repeated and comma-separated.
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        /// Remove tags. May be repeated and comma-separated.
        #[arg(long = "rm-tag")]
        rm_tags: Vec<String>,
        /// Replace the dependency list with these task ids. May be repeated.
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
        /// Remove all dependencies.
        #[arg(long)]
        clear_deps: bool,
    },

    /// Delete a task.
    Delete { id: String },

    /// Move a task to another status.
    Move {
        id: String,
        /// Status id or label.
        status: String,
    },

    /// Start the timer on a task and mark it in progress.
    Start { id: String },

    /// Stop the timer on a task.
    Stop { id: String },

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage the status configuration.
    Status {
        #[command(subcommand)]
        action: StatusAction,
    },

    /// Manage owners.
    Owner {
        #[command(subcommand)]
        action: OwnerAction,
    },

    /// Show or set the preferred view.
    ViewMode {
        #[arg(value_enum)]
        mode: Option<ViewMode>,
        /// Forget the stored preference and use the default layout.
        #[arg(long, conflicts_with = "mode")]
        reset: bool,
    },

    /// Show or set whether stopping a timer moves the task back to Ready.
    AutoReturn {
        #[arg(value_enum)]
        state: Option<Toggle>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List projects with task counts.
    List,
    /// Create a project.
    Add {
        name: String,
        /// Colour, e.g. #3b82f6.
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename a project.
    Rename { project: String, name: String },
    /// Change a project's colour.
    Color { project: String, color: String },
    /// Delete a project and all of its tasks.
    Delete { project: String },
    /// Make a project the active scope.
    Use { project: String },
}

#[derive(Subcommand)]
pub enum StatusAction {
    /// List statuses in order.
    List,
    /// Add a status.
    Add {
        label: String,
        #[arg(long, default_value = "")]
        description: String,
        /// New tasks receive this status.
        #[arg(long)]
        default: bool,
        /// Tasks in this status count as finished.
        #[arg(long)]
        completion: bool,
        /// Keyboard shortcut.
        #[arg(long)]
        key: Option<char>,
    },
    /// Update a status.
    Update {
        status: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Make this the default status.
        #[arg(long)]
        default: bool,
        #[arg(long, value_enum)]
        completion: Option<Toggle>,
        #[arg(long)]
        key: Option<char>,
        #[arg(long)]
        clear_key: bool,
    },
    /// Delete a status, moving its tasks to another one.
    Delete {
        status: String,
        /// Status that receives the tasks.
        #[arg(long)]
        into: String,
    },
    /// Set the column order; list every status.
    Reorder {
        #[arg(required = true, num_args = 1..)]
        statuses: Vec<String>,
    },
    /// Replace the configuration with the built-in statuses.
    Restore,
}

#[derive(Subcommand)]
pub enum OwnerAction {
    /// List owners with task counts.
    List,
    /// Suggest owners matching a partial name.
    Suggest {
        #[arg(default_value = "")]
        query: String,
    },
    /// Register an owner name.
    Add { name: String },
    /// Add an owner to a task.
    Assign { task: String, name: String },
    /// Remove an owner from a task.
    Unassign { task: String, name: String },
    /// Remove an owner from every task and the registry.
    Remove { name: String },
    /// Move all of one owner's tasks to another owner.
    Transfer {
        from: String,
        to: String,
        /// Remove the source owner afterwards.
        #[arg(long)]
        remove: bool,
    },
}

/// Dispatch a parsed command.
pub fn run_command<S: KeyValueStore>(engine: &mut Engine<S>, command: Commands) -> Result<()> {
    match command {
        Commands::Add { text, project } => cmd_add(engine, &text.join(" "), project).map(|_| ()),
        Commands::List { all, all_projects, status, owner, tags, sort, limit } => {
            cmd_list(engine, all, all_projects, status, owner, tags, sort, limit)
        }
        Commands::View { id } => cmd_view(engine, &id),
        Commands::Update {
            id, title, desc, project, status, impact, urgency, effort, bucket, clear_bucket,
            due, clear_due, expect, clear_expect, owner_type, add_tags, rm_tags, depends_on,
            clear_deps,
        } => {
            let db = engine.db();
            let task_id = db.resolve_task_id(&id)?;
            let current = db.task(&task_id)?;
            let mut patch = TaskPatch {
                title,
                description: desc.map(Some),
                impact,
                urgency,
                effort,
                owner_type,
                ..Default::default()
            };
            if let Some(p) = project {
                patch.project = Some(db.resolve_project(&p)?.id.clone());
            }
            if let Some(s) = status {
                patch.status = Some(resolve_status(engine, &s)?);
            }
            if clear_bucket {
                patch.bucket = Some(None);
            } else if bucket.is_some() {
                patch.bucket = Some(bucket);
            }
            if clear_due {
                patch.due = Some(None);
            } else if let Some(raw) = due {
                patch.due = Some(Some(parse_when_arg("due", &raw)?));
            }
            if clear_expect {
                patch.expected_by = Some(None);
            } else if let Some(raw) = expect {
                patch.expected_by = Some(Some(parse_when_arg("expect", &raw)?));
            }
            if !add_tags.is_empty() || !rm_tags.is_empty() {
                let rm = normalise_tags(&rm_tags);
                let mut tags = current.tags.clone();
                tags.extend(normalise_tags(&add_tags));
                tags.retain(|t| !rm.contains(t));
                patch.tags = Some(tags);
            }
            if clear_deps {
                patch.dependencies = Some(Vec::new());
            } else if !depends_on.is_empty() {
                let deps = depends_on
                    .iter()
                    .map(|d| db.resolve_task_id(d))
                    .collect::<Result<Vec<_>>>()?;
                patch.dependencies = Some(deps);
            }
            if patch.is_empty() {
                return Err(EngineError::validation("Nothing to update"));
            }
            engine.db_mut().update_task(&task_id, patch)?;
            println!("Updated task {}", short(&task_id));
            Ok(())
        }
        Commands::Delete { id } => {
            let task_id = engine.db().resolve_task_id(&id)?;
            let task = engine.db_mut().delete_task(&task_id)?;
            println!("Deleted '{}'", task.title);
            Ok(())
        }
        Commands::Move { id, status } => {
            let task_id = engine.db().resolve_task_id(&id)?;
            let status = resolve_status(engine, &status)?;
            engine.db_mut().move_task(&task_id, &status)?;
            println!("Moved {} to {}", short(&task_id), status);
            Ok(())
        }
        Commands::Start { id } => {
            let task_id = engine.db().resolve_task_id(&id)?;
            engine.db_mut().start_timer(&task_id)?;
            println!("Timer started for {}", short(&task_id));
            Ok(())
        }
        Commands::Stop { id } => {
            let task_id = engine.db().resolve_task_id(&id)?;
            let added = engine.db_mut().stop_timer(&task_id)?;
            let total = engine.db().elapsed_secs(&task_id, Utc::now())?;
            println!(
                "Timer stopped for {}: +{} (total {})",
                short(&task_id),
                crate::timer::format_elapsed(added),
                crate::timer::format_elapsed(total)
            );
            Ok(())
        }
        Commands::Project { action } => cmd_project(engine, action),
        Commands::Status { action } => cmd_status(engine, action),
        Commands::Owner { action } => cmd_owner(engine, action),
        Commands::ViewMode { mode, reset } => {
            match mode {
                None if reset => {
                    engine.reset_view_mode()?;
                    println!("View reset to {:?}", engine.view_mode());
                }
                Some(mode) => {
                    engine.set_view_mode(mode)?;
                    println!("View set to {:?}", mode);
                }
                None => println!("{:?}", engine.view_mode()),
            }
            Ok(())
        }
        Commands::AutoReturn { state } => {
            match state {
                Some(state) => {
                    engine.db_mut().auto_return_on_stop = matches!(state, Toggle::On);
                    println!("Auto-return on stop: {:?}", state);
                }
                None => println!(
                    "Auto-return on stop: {}",
                    if engine.db().auto_return_on_stop { "on" } else { "off" }
                ),
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

/// Quick-add a task. Without an explicit project it lands in the active project.
pub fn cmd_add<S: KeyValueStore>(
    engine: &mut Engine<S>,
    text: &str,
    project: Option<String>,
) -> Result<String> {
    let mut patch = parse_quick_add(text);
    patch.project = Some(match project {
        Some(p) => engine.db().resolve_project(&p)?.id.clone(),
        None => engine.db().current_project_id.clone(),
    });
    let id = engine.db_mut().create_task(patch)?;
    if let Some(task) = engine.db().get(&id) {
        println!("Added task {} [{}] {}", short(&id), task.bucket, task.title);
    }
    Ok(id)
}

/// List tasks with optional filtering and sorting.
#[allow(clippy::too_many_arguments)]
pub fn cmd_list<S: KeyValueStore>(
    engine: &Engine<S>,
    all: bool,
    all_projects: bool,
    status: Option<String>,
    owner: Option<String>,
    tags: Vec<String>,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<()> {
    let db = engine.db();
    let status = status.map(|s| resolve_status(engine, &s)).transpose()?;
    let tags = normalise_tags(&tags);

    let mut filtered: Vec<&Task> = db
        .tasks
        .iter()
        .filter(|t| all_projects || t.project == db.current_project_id)
        .filter(|t| {
            if let Some(s) = &status {
                return &t.status == s;
            }
            all || !db.status_config.is_completion(&t.status)
        })
        .filter(|t| owner.as_deref().map_or(true, |o| t.has_owner(o)))
        .filter(|t| tags.iter().all(|tag| t.tags.contains(tag)))
        .collect();

    match sort {
        SortKey::Score => filtered.sort_by(|a, b| {
            a.bucket
                .cmp(&b.bucket)
                .then(b.score.total_cmp(&a.score))
                .then(a.created_at.cmp(&b.created_at))
        }),
        SortKey::Due => filtered.sort_by_key(|t| (t.due.is_none(), t.due, t.created_at)),
        SortKey::Created => filtered.sort_by_key(|t| t.created_at),
    }

    if let Some(n) = limit {
        filtered.truncate(n);
    }
    print_table(db, &filtered);
    Ok(())
}

/// View detailed information about a specific task.
pub fn cmd_view<S: KeyValueStore>(engine: &Engine<S>, id: &str) -> Result<()> {
    let db = engine.db();
    let task = db.task(&db.resolve_task_id(id)?)?;
    print_task(db, task);
    Ok(())
}

fn cmd_project<S: KeyValueStore>(engine: &mut Engine<S>, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::List => {
            let db = engine.db();
            println!("{:<3} {:<16} {:<8} {}", "", "Project", "Color", "Tasks");
            for p in &db.projects {
                let marker = if p.id == db.current_project_id { "*" } else { "" };
                println!(
                    "{:<3} {:<16} {:<8} {}",
                    marker,
                    truncate(&p.name, 16),
                    p.color,
                    db.tasks_in_project(&p.id).len()
                );
            }
        }
        ProjectAction::Add { name, color } => {
            engine.db_mut().create_project(&name, color.as_deref())?;
            println!("Created project '{}'", name.trim());
        }
        ProjectAction::Rename { project, name } => {
            let id = engine.db().resolve_project(&project)?.id.clone();
            engine.db_mut().rename_project(&id, &name)?;
            println!("Renamed project to '{}'", name.trim());
        }
        ProjectAction::Color { project, color } => {
            let id = engine.db().resolve_project(&project)?.id.clone();
            engine.db_mut().set_project_color(&id, &color)?;
            println!("Project '{}' is now {}", project, color);
        }
        ProjectAction::Delete { project } => {
            let id = engine.db().resolve_project(&project)?.id.clone();
            let removed = engine.db_mut().delete_project(&id)?;
            println!("Deleted project '{}' and {} task(s)", project, removed);
        }
        ProjectAction::Use { project } => {
            let id = engine.db().resolve_project(&project)?.id.clone();
            engine.db_mut().set_active_project(&id)?;
            println!("Active project: {}", project);
        }
    }
    Ok(())
}

fn cmd_status<S: KeyValueStore>(engine: &mut Engine<S>, action: StatusAction) -> Result<()> {
    match action {
        StatusAction::List => {
            let db = engine.db();
            println!("{:<3} {:<14} {:<20} {:<5} {}", "#", "Id", "Label", "Key", "Flags");
            for s in db.status_config.ordered() {
                let mut flags = Vec::new();
                if s.is_default {
                    flags.push("default");
                }
                if s.is_completion {
                    flags.push("completion");
                }
                println!(
                    "{:<3} {:<14} {:<20} {:<5} {}",
                    s.order,
                    truncate(s.id.as_str(), 14),
                    truncate(&s.label, 20),
                    s.shortcut.map(String::from).unwrap_or_else(|| "-".into()),
                    flags.join(",")
                );
            }
        }
        StatusAction::Add { label, description, default, completion, key } => {
            let new = NewStatus {
                label,
                description,
                is_default: default,
                is_completion: completion,
                shortcut: key,
            };
            let id = engine.db_mut().add_status(new)?;
            println!("Added status {}", id);
        }
        StatusAction::Update { status, label, description, default, completion, key, clear_key } => {
            let id = resolve_status(engine, &status)?;
            let update = StatusUpdate {
                label,
                description,
                is_default: default.then_some(true),
                is_completion: completion.map(|t| matches!(t, Toggle::On)),
                shortcut: if clear_key { Some(None) } else { key.map(Some) },
            };
            engine.db_mut().update_status(&id, update)?;
            println!("Updated status {}", id);
        }
        StatusAction::Delete { status, into } => {
            let id = resolve_status(engine, &status)?;
            let target = resolve_status(engine, &into)?;
            let moved = engine.db_mut().delete_status(&id, &target)?;
            println!("Deleted status {}; moved {} task(s) to {}", id, moved, target);
        }
        StatusAction::Reorder { statuses } => {
            let ids = statuses
                .iter()
                .map(|s| resolve_status(engine, s))
                .collect::<Result<Vec<_>>>()?;
            engine.db_mut().reorder_statuses(&ids)?;
            println!("Reordered statuses");
        }
        StatusAction::Restore => {
            let moved = engine.db_mut().restore_default_statuses();
            println!("Restored default statuses; moved {} task(s)", moved);
        }
    }
    Ok(())
}

fn cmd_owner<S: KeyValueStore>(engine: &mut Engine<S>, action: OwnerAction) -> Result<()> {
    match action {
        OwnerAction::List => {
            let db = engine.db();
            println!("{:<30} {:<6} {}", "Owner", "Tasks", "Last used");
            for name in db.suggest_owners("") {
                let stats = db.owner_registry.stats(name);
                println!(
                    "{:<30} {:<6} {}",
                    name,
                    stats.map_or(0, |s| s.task_count),
                    stats.map(|s| s.last_used.format("%Y-%m-%d").to_string()).unwrap_or_else(|| "-".into())
                );
            }
        }
        OwnerAction::Suggest { query } => {
            for name in engine.db().suggest_owners(&query) {
                println!("{name}");
            }
        }
        OwnerAction::Add { name } => {
            let name = engine.db_mut().register_owner(&name)?;
            println!("Registered owner '{}'", name);
        }
        OwnerAction::Assign { task, name } => {
            let id = engine.db().resolve_task_id(&task)?;
            if engine.db_mut().add_task_owner(&id, &name)? {
                println!("Assigned '{}' to {}", name.trim(), short(&id));
            } else {
                println!("'{}' already owns {}", name.trim(), short(&id));
            }
        }
        OwnerAction::Unassign { task, name } => {
            let id = engine.db().resolve_task_id(&task)?;
            if engine.db_mut().remove_task_owner(&id, &name)? {
                println!("Removed '{}' from {}", name, short(&id));
            } else {
                println!("'{}' does not own {}", name, short(&id));
            }
        }
        OwnerAction::Remove { name } => {
            let count = engine.db_mut().remove_owner(&name)?;
            println!("Removed owner '{}' from {} task(s)", name, count);
        }
        OwnerAction::Transfer { from, to, remove } => {
            let count = engine.db_mut().transfer_owner(&from, &to, remove)?;
            println!("Transferred {} task(s) from '{}' to '{}'", count, from, to.trim());
        }
    }
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

fn resolve_status<S: KeyValueStore>(engine: &Engine<S>, key: &str) -> Result<StatusId> {
    engine
        .db()
        .status_config
        .resolve(key)
        .map(|s| s.id.clone())
        .ok_or_else(|| EngineError::status_not_found(key))
}

fn parse_when_arg(field: &str, raw: &str) -> Result<chrono::DateTime<Utc>> {
    parse_when(raw).ok_or_else(|| {
        EngineError::validation(format!(
            "Unrecognised {field} date '{raw}'. Use today, tomorrow or YYYY-MM-DD, optionally followed by HH:MM."
        ))
    })
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::time::Duration;

    fn engine() -> Engine<MemoryStore> {
        Engine::open(MemoryStore::new(), Duration::ZERO)
    }

    #[test]
    fn test_add_uses_active_project() {
        let mut engine = engine();
        let work = engine.db_mut().create_project("Work", None).unwrap();
        engine.db_mut().set_active_project(&work).unwrap();
        let id = cmd_add(&mut engine, "Draft plan !p1 +q3", None).unwrap();
        let task = engine.db().get(&id).unwrap();
        assert_eq!(task.project, work);
        assert_eq!(task.bucket, Bucket::P1);
        assert_eq!(task.tags, vec!["q3"]);
        assert!(engine.is_dirty());
    }

    #[test]
    fn test_add_into_named_project() {
        let mut engine = engine();
        engine.db_mut().create_project("Home", None).unwrap();
        let id = cmd_add(&mut engine, "Fix sink", Some("home".into())).unwrap();
        let project = engine.db().get(&id).unwrap().project.clone();
        assert_eq!(engine.db().project(&project).unwrap().name, "Home");
        assert!(cmd_add(&mut engine, "Nowhere", Some("missing".into())).is_err());
    }

    #[test]
    fn test_move_by_label() {
        let mut engine = engine();
        let id = cmd_add(&mut engine, "Thing", None).unwrap();
        let command = Commands::Move { id: id[..8].to_string(), status: "In Progress".into() };
        run_command(&mut engine, command).unwrap();
        assert!(engine.db().get(&id).unwrap().status.is_in_progress());
    }

    #[test]
    fn test_update_merges_tags() {
        let mut engine = engine();
        let id = cmd_add(&mut engine, "Thing +a +b", None).unwrap();
        let command = Commands::Update {
            id: id.clone(), title: None, desc: None, project: None, status: None,
            impact: Some(5), urgency: None, effort: None, bucket: None, clear_bucket: false,
            due: None, clear_due: false, expect: None, clear_expect: false, owner_type: None,
            add_tags: vec!["c".into()], rm_tags: vec!["a".into()], depends_on: vec![],
            clear_deps: false,
        };
        run_command(&mut engine, command).unwrap();
        let task = engine.db().get(&id).unwrap();
        assert_eq!(task.tags, vec!["b", "c"]);
        assert_eq!(task.impact, 5);
    }

    #[test]
    fn test_view_mode_reset() {
        let mut engine = engine();
        run_command(&mut engine, Commands::ViewMode { mode: Some(ViewMode::List), reset: false }).unwrap();
        assert_eq!(engine.view_mode(), ViewMode::List);
        run_command(&mut engine, Commands::ViewMode { mode: None, reset: true }).unwrap();
        assert_eq!(engine.view_mode(), ViewMode::Board);
    }
}
