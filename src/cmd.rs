//! Command implementations for the CLI interface.
//!
//! Every handler works against the API traits held by a [`Context`], resolves
//! the working project first, and loads that project's tasks into a
//! `TaskStore` when it needs them.

use std::io;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::{DateTime, Duration, Local, Utc};
use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use crate::api::{ProjectApi, TaskApi, TeamApi};
use crate::cli::Cli;
use crate::controller::{DropEvent, MoveOutcome, Position, StatusController};
use crate::fields::*;
use crate::project::{Project, ProjectStore};
use crate::report::{Agenda, StatusCounts};
use crate::store::{StoreError, TaskCollection, TaskStore};
use crate::task::{NewTask, Task, TaskPatch};
use crate::team::Team;
use crate::tui::run::run_board_tui;
use crate::utils::*;

#[derive(Subcommand)]
pub enum Commands {
    /// Open the kanban board for the current project.
    Board,

    /// List tasks with optional filters.
    List {
        /// Filter by status.
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Filter by priority.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Due filter: today | tomorrow | this-week | overdue | none.
        #[arg(long, value_enum)]
        due: Option<DueFilter>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Due)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task.
    View {
        /// Task ID to view
        id: u64,
    },

    /// Add a new task to the current project.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Priority: low | medium | high.
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Status: to-do | in-progress | done.
        #[arg(long, value_enum, default_value_t = Status::ToDo)]
        status: Status,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "friday", "in Nd", "eow".
        #[arg(long)]
        due: Option<String>,
        /// Assignee user ID (see `tb team`).
        #[arg(long)]
        assignee: Option<u64>,
    },

    /// Update fields on a task.
    Update {
        /// Task ID to update
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the due date.
        #[arg(long)]
        clear_due: bool,
        /// Assignee user ID.
        #[arg(long, conflicts_with = "clear_assignee")]
        assignee: Option<u64>,
        /// Unassign the task.
        #[arg(long)]
        clear_assignee: bool,
    },

    /// Move a task to a status column, as if dragged on the board.
    Move {
        /// Task ID to move
        id: u64,
        /// Target status.
        #[arg(value_enum)]
        status: Status,
        /// Position within the target column. Defaults to the end.
        #[arg(long)]
        index: Option<usize>,
    },

    /// Delete a task.
    Delete {
        /// Task ID to delete
        id: u64,
    },

    /// Project management.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// List team members.
    Team,

    /// Show task counts per status for the current project.
    Stats,

    /// Show open tasks grouped by due date.
    Agenda,

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List all projects.
    List,
    /// Create a project.
    Add {
        /// Project name
        name: String,
        /// Project description
        #[arg(long)]
        desc: Option<String>,
    },
    /// Delete a project.
    Rm {
        /// Project ID to delete
        id: u64,
    },
}

/// API handles and the project selection shared by every command.
pub struct Context {
    pub tasks: Arc<dyn TaskApi>,
    pub projects: Arc<dyn ProjectApi>,
    pub team: Arc<dyn TeamApi>,
    /// Project ID or name; the first project by name when unset.
    pub project: Option<String>,
}

impl Context {
    pub fn new<A>(api: Arc<A>, project: Option<String>) -> Self
    where
        A: TaskApi + ProjectApi + TeamApi + 'static,
    {
        Context {
            tasks: api.clone(),
            projects: api.clone(),
            team: api,
            project,
        }
    }

    /// Resolve the working project.
    async fn current_project(&self) -> Result<Project> {
        let mut projects = ProjectStore::new(self.projects.clone());
        projects.fetch_projects().await.context("Failed to load projects")?;
        match self.project.as_deref() {
            Some(identifier) => projects.resolve(identifier).cloned().map_err(|e| anyhow!(e)),
            None => projects
                .current()
                .cloned()
                .ok_or_else(|| anyhow!("No projects found. Create one with `tb project add <name>`.")),
        }
    }

    /// Resolve the working project and load its tasks.
    async fn load_tasks(&self) -> Result<(Project, TaskStore)> {
        let project = self.current_project().await?;
        let store = TaskStore::new(self.tasks.clone());
        store
            .fetch_tasks(project.id)
            .await
            .with_context(|| format!("Failed to load tasks for project '{}'", project.name))?;
        Ok((project, store))
    }

    /// Check an assignee id against the team directory.
    async fn check_assignee(&self, id: u64) -> Result<()> {
        let mut team = Team::new(self.team.clone());
        if team.fetch().await.is_empty() {
            // Directory unavailable; let the server decide.
            return Ok(());
        }
        if team.get(id).is_none() {
            bail!("No team member with ID {id}. See `tb team`.");
        }
        Ok(())
    }
}

/// Run one parsed command.
pub async fn dispatch(command: Commands, ctx: &Context) -> Result<()> {
    match command {
        Commands::Board => cmd_board(ctx).await,
        Commands::List { status, priority, due, sort, limit } => cmd_list(ctx, status, priority, due, sort, limit).await,
        Commands::View { id } => cmd_view(ctx, id).await,
        Commands::Add { title, desc, priority, status, due, assignee } => {
            cmd_add(ctx, title, desc, priority, status, due, assignee).await
        }
        Commands::Update {
            id, title, desc, priority, status, due, clear_due, assignee, clear_assignee,
        } => {
            let patch = build_patch(title, desc, priority, status, due, clear_due, assignee, clear_assignee)?;
            cmd_update(ctx, id, patch).await
        }
        Commands::Move { id, status, index } => cmd_move(ctx, id, status, index).await,
        Commands::Delete { id } => cmd_delete(ctx, id).await,
        Commands::Project { action } => cmd_project(ctx, action).await,
        Commands::Team => cmd_team(ctx).await,
        Commands::Stats => cmd_stats(ctx).await,
        Commands::Agenda => cmd_agenda(ctx).await,
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

pub async fn cmd_board(ctx: &Context) -> Result<()> {
    let project = ctx.current_project().await?;
    let store = TaskStore::new(ctx.tasks.clone());
    // A failed load is shown on the board, where `r` retries it.
    let _ = store.fetch_tasks(project.id).await;
    let controller = StatusController::new(store);
    run_board_tui(controller, project.id, &project.name)
        .await
        .context("Terminal error")
}

pub async fn cmd_list(
    ctx: &Context,
    status: Option<Status>,
    priority: Option<Priority>,
    due: Option<DueFilter>,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<()> {
    let (project, store) = ctx.load_tasks().await?;
    if store.read(TaskCollection::is_empty) {
        println!("No tasks in '{}' yet.", project.name);
        return Ok(());
    }
    let tasks = store.tasks();
    let selected = select_tasks(&tasks, status, priority, due, sort, limit, Utc::now());
    if selected.is_empty() {
        println!("No tasks in '{}' match.", project.name);
        return Ok(());
    }
    print_table(&selected);
    Ok(())
}

/// Filter, sort and limit tasks for `tb list`.
pub fn select_tasks(
    tasks: &[Task],
    status: Option<Status>,
    priority: Option<Priority>,
    due: Option<DueFilter>,
    sort: SortKey,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Vec<&Task> {
    let today = now.with_timezone(&Local).date_naive();
    let tomorrow = today + Duration::days(1);
    let (week_start, week_end) = start_end_of_week(today);
    let due_day = |t: &Task| t.due_date.map(|d| d.with_timezone(&Local).date_naive());

    let mut filtered: Vec<&Task> = tasks
        .iter()
        .filter(|t| status.map_or(true, |s| t.status == s))
        .filter(|t| priority.map_or(true, |p| t.priority == p))
        .filter(|t| match due {
            None => true,
            Some(DueFilter::Today) => due_day(*t) == Some(today),
            Some(DueFilter::Tomorrow) => due_day(*t) == Some(tomorrow),
            Some(DueFilter::ThisWeek) => due_day(*t).is_some_and(|d| d >= week_start && d <= week_end),
            Some(DueFilter::Overdue) => t.is_overdue(now),
            Some(DueFilter::None) => t.due_date.is_none(),
        })
        .collect();

    match sort {
        SortKey::Due => filtered.sort_by_key(|t| (t.due_date.unwrap_or(DateTime::<Utc>::MAX_UTC), t.id)),
        SortKey::Priority => filtered.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then(a.id.cmp(&b.id))
        }),
        SortKey::Id => filtered.sort_by_key(|t| t.id),
    }

    if let Some(n) = limit {
        filtered.truncate(n);
    }
    filtered
}

pub async fn cmd_view(ctx: &Context, id: u64) -> Result<()> {
    let (project, store) = ctx.load_tasks().await?;
    let task = store.task(id).ok_or(StoreError::TaskNotFound(id))?;
    let today = Local::now().date_naive();
    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Project:      {}", project.name);
    println!("Status:       {}", format_status(task.status));
    println!("Priority:     {}", format_priority(task.priority));
    println!("Due:          {}", match task.due_date {
        Some(d) => format!("{} ({})", d.with_timezone(&Local).format("%Y-%m-%d %H:%M"), format_due_relative(Some(d), today)),
        None => "-".into(),
    });
    println!("Assignee:     {}", task.assignee.as_ref().map(|a| a.name.as_str()).unwrap_or("-"));
    println!("Description:\n{}\n", task.description.unwrap_or_else(|| "-".into()));
    Ok(())
}

pub async fn cmd_add(
    ctx: &Context,
    title: String,
    desc: Option<String>,
    priority: Priority,
    status: Status,
    due: Option<String>,
    assignee: Option<u64>,
) -> Result<()> {
    let due_date = due.as_deref().map(parse_due).transpose()?;
    if let Some(id) = assignee {
        ctx.check_assignee(id).await?;
    }
    let project = ctx.current_project().await?;
    let store = TaskStore::new(ctx.tasks.clone());

    let mut new = NewTask::new(title.trim(), project.id);
    new.description = desc.filter(|d| !d.trim().is_empty());
    new.priority = priority;
    new.status = status;
    new.due_date = due_date;
    new.assignee_id = assignee;

    let created = store.add_task(new).await?;
    println!("Added task {} to '{}': {}", created.id, project.name, created.title);
    Ok(())
}

/// Turn `tb update` flags into a patch. `--clear-*` flags send explicit nulls.
#[allow(clippy::too_many_arguments)]
pub fn build_patch(
    title: Option<String>,
    desc: Option<String>,
    priority: Option<Priority>,
    status: Option<Status>,
    due: Option<String>,
    clear_due: bool,
    assignee: Option<u64>,
    clear_assignee: bool,
) -> Result<TaskPatch> {
    let due_date = match (due, clear_due) {
        (_, true) => Some(None),
        (Some(raw), false) => Some(Some(parse_due(&raw)?)),
        (None, false) => None,
    };
    let assignee_id = if clear_assignee { Some(None) } else { assignee.map(Some) };
    Ok(TaskPatch {
        title: title.map(|t| t.trim().to_string()),
        description: desc,
        status,
        priority,
        due_date,
        assignee_id,
    })
}

pub async fn cmd_update(ctx: &Context, id: u64, patch: TaskPatch) -> Result<()> {
    if let Some(Some(assignee)) = patch.assignee_id {
        ctx.check_assignee(assignee).await?;
    }
    let (_, store) = ctx.load_tasks().await?;
    if store.task(id).is_none() {
        return Err(StoreError::TaskNotFound(id).into());
    }
    let updated = store.update_task(id, patch).await?;
    println!("Updated task {}: {}", updated.id, updated.title);
    Ok(())
}

pub async fn cmd_move(ctx: &Context, id: u64, status: Status, index: Option<usize>) -> Result<()> {
    let (_, store) = ctx.load_tasks().await?;
    if store.task(id).is_none() {
        return Err(StoreError::TaskNotFound(id).into());
    }
    let controller = StatusController::new(store);

    let outcome = match index {
        None => controller.move_to_status(id, status).await,
        Some(index) => {
            let store = controller.store();
            let source = store
                .read(|tasks| {
                    let task = tasks.get(id)?;
                    let row = tasks.column(task.status).iter().position(|t| t.id == id)?;
                    Some(Position::new(task.status, row))
                })
                .ok_or(StoreError::TaskNotFound(id))?;
            controller
                .move_task(DropEvent {
                    task_id: id,
                    source,
                    destination: Some(Position::new(status, index)),
                })
                .await
        }
    };

    match outcome {
        MoveOutcome::Persisted(task) => {
            println!("Moved task {} to {}.", task.id, format_status(task.status));
            Ok(())
        }
        MoveOutcome::Unchanged => {
            println!("Task {id} is already there.");
            Ok(())
        }
        MoveOutcome::Reordered => {
            println!("Task {id} stays in {}; column order is not saved.", format_status(status));
            Ok(())
        }
        MoveOutcome::RolledBack(notice) => bail!(notice.message),
        MoveOutcome::Ignored => Err(StoreError::TaskNotFound(id).into()),
        MoveOutcome::Busy => bail!("Task {id} is already being moved"),
    }
}

pub async fn cmd_delete(ctx: &Context, id: u64) -> Result<()> {
    let (_, store) = ctx.load_tasks().await?;
    let task = store.task(id).ok_or(StoreError::TaskNotFound(id))?;
    store.delete_task(id).await?;
    println!("Deleted task {}: {}", id, task.title);
    Ok(())
}

pub async fn cmd_project(ctx: &Context, action: ProjectAction) -> Result<()> {
    let mut projects = ProjectStore::new(ctx.projects.clone());
    projects.fetch_projects().await.context("Failed to load projects")?;

    match action {
        ProjectAction::List => {
            if projects.projects().is_empty() {
                println!("No projects yet.");
                return Ok(());
            }
            let selected = ctx
                .project
                .as_deref()
                .and_then(|identifier| projects.resolve(identifier).ok().map(|p| p.id));
            if let Some(id) = selected {
                projects.select(id);
            }
            let current = projects.current().map(|p| p.id);
            println!("{:<2} {:<5} {:<24} {}", "", "ID", "Name", "Description");
            for p in projects.projects() {
                let marker = if Some(p.id) == current { "*" } else { "" };
                println!(
                    "{:<2} {:<5} {:<24} {}",
                    marker,
                    p.id,
                    truncate(&p.name, 24),
                    p.description.as_deref().unwrap_or("-")
                );
            }
        }
        ProjectAction::Add { name, desc } => {
            let project = projects.create_project(&name, desc).await?;
            println!("Created project {}: {}", project.id, project.name);
        }
        ProjectAction::Rm { id } => {
            let name = projects
                .projects()
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.name.clone())
                .ok_or_else(|| anyhow!("Project with ID {id} not found"))?;
            projects.delete_project(id).await?;
            println!("Deleted project {id}: {name}");
        }
    }
    Ok(())
}

pub async fn cmd_team(ctx: &Context) -> Result<()> {
    let mut team = Team::new(ctx.team.clone());
    let members = team.fetch().await;
    if members.is_empty() {
        println!("No team members found.");
        return Ok(());
    }
    println!("{:<5} {:<24} {:<10} {}", "ID", "Name", "Role", "Email");
    for u in members {
        println!(
            "{:<5} {:<24} {:<10} {}",
            u.id,
            truncate(&u.name, 24),
            u.role_label(),
            u.email.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn cmd_stats(ctx: &Context) -> Result<()> {
    let (project, store) = ctx.load_tasks().await?;
    let counts = StatusCounts::of(&store.tasks(), Utc::now());
    println!("Project:      {}", project.name);
    println!("To Do:        {}", counts.to_do);
    println!("In Progress:  {}", counts.in_progress);
    println!("Done:         {}", counts.done);
    println!("Overdue:      {}", counts.overdue);
    println!("Total:        {} ({}% done)", counts.total(), counts.percent_done());
    Ok(())
}

pub async fn cmd_agenda(ctx: &Context) -> Result<()> {
    let (_, store) = ctx.load_tasks().await?;
    let open: Vec<Task> = store
        .tasks()
        .into_iter()
        .filter(|t| t.status != Status::Done)
        .collect();
    let agenda = Agenda::build(&open, Local::now().date_naive());
    for (label, tasks) in agenda.groups() {
        if tasks.is_empty() {
            continue;
        }
        println!("{label}:");
        print_table(tasks);
        println!();
    }
    if open.is_empty() {
        println!("Nothing open.");
    }
    Ok(())
}

pub fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn parse_due(raw: &str) -> Result<DateTime<Utc>> {
    parse_due_input(raw, Local::now().date_naive()).ok_or_else(|| {
        anyhow!("Could not understand due date '{raw}'. Try YYYY-MM-DD, 'tomorrow', 'friday' or 'in 3d'.")
    })
}
