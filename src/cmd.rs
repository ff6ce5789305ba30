//! Command implementations for the CLI interface.
//!
//! Each `cmd_*` handler builds the stores it needs from a shared [`Context`],
//! performs one user action and prints the result. Handlers return errors
//! instead of exiting so `main` owns the single exit path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::{Args, Subcommand};
use clap_complete::{generate, Shell};
use tracing::{debug, warn};

use crate::activity::{Activity, NewActivity};
use crate::analytics::Analytics;
use crate::comment::{Comment, CommentPatch, NewComment};
use crate::config::Config;
use crate::display::{bar, format_due_relative, parse_due_input, print_task_table, sort_tasks, split_and_normalise_tags, truncate};
use crate::error::{Error, Result};
use crate::fields::*;
use crate::gateway::client::Gateway;
use crate::gateway::http::HttpGateway;
use crate::gateway::local::LocalGateway;
use crate::poller::Poller;
use crate::prefs::{LocalState, ThemePrefs};
use crate::project::{NewProject, Project, ProjectPatch};
use crate::recurring::{NewRecurring, RecurringTask};
use crate::search::{filter_tasks, FilterCriteria, FilterPatch, SearchEngine};
use crate::session::{Credentials, Session};
use crate::stats::{kanban_columns, priority_counts, recent_tasks, status_counts, DashboardStats};
use crate::store::{Entity, EntityStore};
use crate::task::{NewTask, NewTemplate, Task, TaskPatch, TaskTemplate};
use crate::tui::board::Board;
use crate::tui::run::run_board;
use crate::user::User;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with an existing account's email.
    Login {
        #[arg(long)]
        email: String,
        /// Accepted for compatibility; the API does not check it.
        #[arg(long, default_value = "")]
        password: String,
    },

    /// Create an account and sign in as it.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },

    /// Forget the stored session.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// List tasks with optional filters.
    List(ListArgs),

    /// View a single task.
    View {
        /// Task ID
        id: String,
        /// Show the comment thread.
        #[arg(long)]
        comments: bool,
        /// Show the activity log.
        #[arg(long)]
        activity: bool,
    },

    /// Add a new task.
    Add(AddArgs),

    /// Update fields on a task.
    Update(UpdateArgs),

    /// Move a task to another column.
    Move {
        /// Task ID
        id: String,
        #[arg(value_enum)]
        status: Status,
    },

    /// Delete one or more tasks.
    Delete {
        /// Task IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Headline numbers, status and priority breakdown, recent tasks.
    Dashboard,

    /// Print the kanban columns.
    Board {
        /// Only tasks of this project.
        #[arg(long)]
        project: Option<String>,
    },

    /// Manage projects.
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// List users.
    Users,

    /// Task comments.
    Comments {
        #[command(subcommand)]
        action: CommentAction,
    },

    /// Task activity log.
    Activity {
        #[command(subcommand)]
        action: ActivityAction,
    },

    /// Recurring task definitions.
    Recurring {
        #[command(subcommand)]
        action: RecurringAction,
    },

    /// Task templates.
    Templates {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Project analytics.
    Analytics {
        /// Project ID
        project: String,
        /// Include per-member productivity.
        #[arg(long)]
        team: bool,
        /// Print the completion trend over this many days.
        #[arg(long)]
        trend: Option<u32>,
    },

    /// Show or change the color theme.
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },

    /// Poll tasks and print changes until interrupted.
    Watch {
        /// Seconds between polls (default from config).
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Launch the interactive kanban board.
    Ui,

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ListArgs {
    /// Free text matched against title and description.
    #[arg(long, short)]
    pub query: Option<String>,
    /// Status: todo | in-progress | review | done.
    #[arg(long)]
    pub status: Option<String>,
    /// Priority: low | medium | high | urgent.
    #[arg(long)]
    pub priority: Option<String>,
    /// Project ID.
    #[arg(long)]
    pub project: Option<String>,
    /// Assignee user ID.
    #[arg(long)]
    pub assignee: Option<String>,
    /// Created on or after: YYYY-MM-DD, "yesterday", "in -7d", ...
    #[arg(long)]
    pub from: Option<String>,
    /// Created on or before.
    #[arg(long)]
    pub to: Option<String>,
    /// Let the API do the filtering instead of filtering locally.
    #[arg(long)]
    pub remote: bool,
    /// Sort key.
    #[arg(long, value_enum, default_value_t = SortKey::Source)]
    pub sort: SortKey,
    /// Limit number of rows printed.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl ListArgs {
    /// All flags as one criteria patch. Date words become calendar dates;
    /// an upper bound date covers the whole day.
    pub fn patch(&self) -> FilterPatch {
        FilterPatch {
            query: self.query.clone(),
            status: Some(self.status.clone()),
            priority: Some(self.priority.clone()),
            project_id: Some(self.project.clone()),
            assignee: Some(self.assignee.clone()),
            date_from: Some(self.from.as_deref().map(|d| date_bound(d, false))),
            date_to: Some(self.to.as_deref().map(|d| date_bound(d, true))),
        }
    }
}

#[derive(Args)]
pub struct AddArgs {
    /// Short title for the task.
    pub title: String,
    /// Optional longer description.
    #[arg(long)]
    pub desc: Option<String>,
    #[arg(long, value_enum)]
    pub priority: Option<Priority>,
    #[arg(long, value_enum)]
    pub status: Option<Status>,
    /// Project ID. Required unless the template names one.
    #[arg(long)]
    pub project: Option<String>,
    /// Assignee user ID.
    #[arg(long)]
    pub assignee: Option<String>,
    /// Due date: YYYY-MM-DD, "today", "tomorrow", "in 3d", "fri", ...
    #[arg(long)]
    pub due: Option<String>,
    /// Comma-separated tags. May be repeated.
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Estimated hours.
    #[arg(long)]
    pub estimate: Option<f64>,
    /// Template ID for default values.
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Task ID to update
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub desc: Option<String>,
    #[arg(long, value_enum)]
    pub status: Option<Status>,
    #[arg(long, value_enum)]
    pub priority: Option<Priority>,
    /// Assignee user ID; "none" unassigns.
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub due: Option<String>,
    #[arg(long)]
    pub clear_due: bool,
    /// Replace the tags. Comma-separated, may be repeated.
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(long)]
    pub estimate: Option<f64>,
    #[arg(long)]
    pub actual: Option<f64>,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List all projects.
    List,
    /// List active projects.
    Active,
    /// Create a project owned by the signed-in user.
    Add {
        name: String,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long)]
        deadline: Option<String>,
        /// Team member user IDs, comma-separated.
        #[arg(long = "member")]
        members: Vec<String>,
        /// Owner user ID (defaults to the signed-in user).
        #[arg(long)]
        owner: Option<String>,
    },
    /// Update a project.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        status: Option<ProjectStatus>,
        #[arg(long)]
        deadline: Option<String>,
        #[arg(long)]
        progress: Option<f64>,
    },
    /// Delete a project.
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum CommentAction {
    /// Show a task's thread.
    List { task: String },
    /// Comment on a task. `@name` mentions are picked up.
    Add { task: String, content: String },
    /// Replace a comment's text.
    Edit { id: String, content: String },
    /// Like a comment.
    Like { id: String },
    /// Delete a comment.
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ActivityAction {
    /// Show activity for a task, a project or a user.
    List {
        #[arg(long, conflicts_with_all = ["project", "user"])]
        task: Option<String>,
        #[arg(long, conflicts_with = "user")]
        project: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// Record an entry by hand.
    Add {
        task: String,
        #[arg(value_enum)]
        action: ActivityType,
        description: String,
    },
}

#[derive(Subcommand)]
pub enum RecurringAction {
    /// List definitions, optionally for one project.
    List {
        #[arg(long)]
        project: Option<String>,
    },
    /// Create a definition.
    Add {
        title: String,
        #[arg(long)]
        project: String,
        #[arg(long, value_enum)]
        frequency: RecurrenceFrequency,
        /// First due date.
        #[arg(long)]
        next: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long)]
        desc: Option<String>,
    },
    /// Pause or resume a definition.
    Toggle { id: String },
    /// Create the next task instance now.
    Generate { id: String },
    /// Delete a definition.
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum TemplateAction {
    /// List templates, optionally for one project.
    List {
        #[arg(long)]
        project: Option<String>,
    },
    /// Create a template.
    Add {
        name: String,
        #[arg(long)]
        project: String,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long)]
        estimate: Option<f64>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Checklist step. May be repeated; order is kept.
        #[arg(long = "step")]
        steps: Vec<String>,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Create a task from a template.
    Use { id: String, title: String },
    /// Copy a template.
    Duplicate { id: String },
    /// Delete a template.
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ThemeAction {
    /// Print the current theme.
    Show,
    /// Switch between light and dark.
    Toggle,
    /// Choose a theme.
    Set {
        #[arg(value_enum)]
        theme: Theme,
    },
}

/// Everything a handler needs: configuration, the gateway the stores talk
/// through, and the persisted client state.
pub struct Context {
    pub config: Config,
    pub gateway: Arc<dyn Gateway>,
    pub state: LocalState,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let gateway: Arc<dyn Gateway> = match &config.mock_db {
            Some(path) => Arc::new(LocalGateway::open(path)?),
            None => Arc::new(HttpGateway::new(&config.api_url)?),
        };
        debug!(backend = %gateway.describe(), "gateway ready");
        let state = LocalState::open(&config.state_path());
        Ok(Self { config, gateway, state })
    }

    pub fn store<E: Entity>(&self) -> EntityStore<E> {
        EntityStore::with_cache(Arc::clone(&self.gateway), self.config.cache_options())
    }

    pub fn session(&self) -> Session {
        Session::restore(&self.state)
    }

    /// The signed-in user, or an error telling how to sign in.
    pub fn require_user(&self) -> Result<User> {
        self.session()
            .current_user()
            .cloned()
            .ok_or_else(|| Error::Invalid("Not logged in. Run `tf login --email <email>` first.".into()))
    }

    /// Best-effort audit entry; a failure is logged, not returned.
    fn record(&self, draft: NewActivity) {
        let mut activities: EntityStore<Activity> = self.store();
        if let Err(e) = activities.create(&draft) {
            warn!("could not record activity: {e}");
        }
    }
}

fn due_arg(raw: &str) -> Result<String> {
    parse_due_input(raw).map(|d| d.format("%Y-%m-%d").to_string()).ok_or_else(|| {
        Error::Invalid(format!(
            "Could not parse due date '{raw}'. Try YYYY-MM-DD, today, tomorrow, in 3d, or a weekday."
        ))
    })
}

/// Creation-date bound for the filter. Unparseable input is passed through
/// and compared as text.
fn date_bound(raw: &str, end_of_day: bool) -> String {
    match parse_due_input(raw) {
        Some(d) if end_of_day => format!("{}T23:59:59.999Z", d.format("%Y-%m-%d")),
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => raw.to_string(),
    }
}

fn print_task(task: &Task, project: &str) {
    let today = Local::now().date_naive();
    println!("#{} {}", task.id, task.title);
    println!("  Status:   {}", task.status.label());
    println!("  Priority: {}", task.priority.label());
    println!("  Project:  {project}");
    println!("  Assignee: {}", task.assignee.as_deref().unwrap_or("-"));
    println!("  Due:      {}", format_due_relative(task.due_date.as_deref(), today));
    if !task.tags.is_empty() {
        println!("  Tags:     {}", task.tags.join(", "));
    }
    if let Some(h) = task.estimated_hours {
        println!("  Estimate: {h:.1}h");
    }
    if let Some(h) = task.actual_hours {
        println!("  Actual:   {h:.1}h");
    }
    println!("  Created:  {}", task.created_at);
    if let Some(u) = &task.updated_at {
        println!("  Updated:  {u}");
    }
    if !task.description.is_empty() {
        println!();
        for line in task.description.lines() {
            println!("  {line}");
        }
    }
}

/// Fetch projects for display names; an empty store if that fails.
fn project_names(ctx: &Context) -> EntityStore<Project> {
    let mut projects: EntityStore<Project> = ctx.store();
    if let Err(e) = projects.fetch_all() {
        debug!("project names unavailable: {e}");
    }
    projects
}

// ---- session ----

pub fn cmd_login(ctx: &mut Context, email: String, password: String) -> Result<()> {
    let mut users: EntityStore<User> = ctx.store();
    let mut session = ctx.session();
    let user = session.login(&Credentials { email, password }, &mut users, &mut ctx.state)?;
    println!("Logged in as {} <{}>", user.name, user.email);
    Ok(())
}

pub fn cmd_register(ctx: &mut Context, email: String, name: String, password: String) -> Result<()> {
    let mut users: EntityStore<User> = ctx.store();
    let mut session = ctx.session();
    let user = session.register(&email, &name, &password, &mut users, &mut ctx.state)?;
    println!("Registered and logged in as {} (#{})", user.name, user.id);
    Ok(())
}

pub fn cmd_logout(ctx: &mut Context) -> Result<()> {
    ctx.session().logout(&mut ctx.state)?;
    println!("Logged out.");
    Ok(())
}

pub fn cmd_whoami(ctx: &Context) -> Result<()> {
    match ctx.session().current_user() {
        Some(u) => println!("{} <{}> (#{})", u.name, u.email, u.id),
        None => println!("Not logged in."),
    }
    Ok(())
}

// ---- tasks ----

/// List tasks, filtered locally through the search engine or remotely.
pub fn cmd_list(ctx: &Context, args: ListArgs) -> Result<()> {
    let mut tasks: EntityStore<Task> = ctx.store();
    let projects = project_names(ctx);
    let patch = args.patch();

    let remote: Vec<Task>;
    let mut engine = SearchEngine::new();
    let (mut rows, total) = if args.remote {
        let mut criteria = FilterCriteria::default();
        criteria.merge(patch);
        remote = tasks.query(&criteria.to_query())?;
        // The API has no date parameters.
        let dates = FilterCriteria {
            date_from: criteria.date_from.clone(),
            date_to: criteria.date_to.clone(),
            ..FilterCriteria::default()
        };
        (filter_tasks(&remote, &dates), remote.len())
    } else {
        engine.set_tasks(tasks.fetch_all()?.to_vec());
        engine.update_filters(patch);
        (engine.filtered_view(), engine.tasks().len())
    };

    sort_tasks(&mut rows, args.sort);
    let matched = rows.len();
    if let Some(limit) = args.limit {
        rows.truncate(limit);
    }

    if rows.is_empty() {
        println!("No matching tasks.");
        return Ok(());
    }
    print_task_table(&rows, &|id| projects.name_of(id));
    println!("\n{} of {} tasks", matched, total);
    Ok(())
}

pub fn cmd_view(ctx: &Context, id: String, comments: bool, activity: bool) -> Result<()> {
    let mut tasks: EntityStore<Task> = ctx.store();
    let task = tasks.fetch_by_id(&id)?;
    let projects = project_names(ctx);
    print_task(&task, &projects.name_of(&task.project_id));

    if comments {
        let mut store: EntityStore<Comment> = ctx.store();
        let thread = store.load_for_task(&task.id)?;
        println!("\nComments ({}):", thread.len());
        for c in thread {
            println!("  #{} {} ({} likes): {}", c.id, c.user_name.as_deref().unwrap_or(&c.user_id), c.likes, c.content);
        }
    }
    if activity {
        let mut store: EntityStore<Activity> = ctx.store();
        let log = store.load_for_task(&task.id)?;
        println!("\nActivity:");
        for a in log {
            println!("  {}  {:<16} {}", truncate(&a.created_at, 19), a.action.label(), a.description);
        }
    }
    Ok(())
}

pub fn cmd_add(ctx: &Context, args: AddArgs) -> Result<()> {
    let mut tasks: EntityStore<Task> = ctx.store();
    let mut templates: EntityStore<TaskTemplate> = ctx.store();

    let mut draft = match &args.template {
        Some(id) => templates.fetch_by_id(id)?.to_new_task(&args.title),
        None => NewTask::new(args.title.clone(), String::new()),
    };
    if let Some(p) = args.project {
        draft.project_id = p;
    }
    if draft.project_id.is_empty() {
        return Err(Error::Invalid("--project is required".into()));
    }
    if let Some(d) = args.desc {
        draft.description = d;
    }
    if let Some(p) = args.priority {
        draft.priority = p;
    }
    if let Some(s) = args.status {
        draft.status = s;
    }
    if let Some(a) = args.assignee {
        draft.assignee = Some(a);
    }
    if let Some(raw) = args.due.as_deref() {
        draft.due_date = Some(due_arg(raw)?);
    }
    if !args.tags.is_empty() {
        let mut tags = draft.tags;
        tags.extend(split_and_normalise_tags(&args.tags));
        tags.sort();
        tags.dedup();
        draft.tags = tags;
    }
    if args.estimate.is_some() {
        draft.estimated_hours = args.estimate;
    }

    let task = tasks.create(&draft)?;
    if let Some(id) = &args.template {
        if let Err(e) = templates.increment_usage(id) {
            warn!("template usage not recorded: {e}");
        }
    }
    if let Ok(user) = ctx.require_user() {
        ctx.record(NewActivity {
            task_id: task.id.clone(),
            user_id: user.id,
            action: ActivityType::Created,
            details: None,
            description: format!("created task {}", task.title),
        });
    }
    println!("Added task #{}: {}", task.id, task.title);
    Ok(())
}

pub fn cmd_update(ctx: &Context, args: UpdateArgs) -> Result<()> {
    let mut tasks: EntityStore<Task> = ctx.store();
    let before = tasks.fetch_by_id(&args.id)?;

    let due_date = if args.clear_due {
        Some(None)
    } else {
        args.due.as_deref().map(due_arg).transpose()?.map(Some)
    };
    let assignee = args.assignee.map(|a| if a == "none" { None } else { Some(a) });
    let patch = TaskPatch {
        title: args.title,
        description: args.desc,
        status: args.status,
        priority: args.priority,
        assignee,
        due_date,
        tags: (!args.tags.is_empty()).then(|| split_and_normalise_tags(&args.tags)),
        estimated_hours: args.estimate,
        actual_hours: args.actual,
    };
    if patch.is_empty() {
        return Err(Error::Invalid("Nothing to update.".into()));
    }

    let after = tasks.update(&args.id, &patch)?;
    if let Ok(user) = ctx.require_user() {
        let changes = [
            ("status", before.status.as_str().to_string(), after.status.as_str().to_string()),
            ("priority", before.priority.as_str().to_string(), after.priority.as_str().to_string()),
            (
                "assignee",
                before.assignee.clone().unwrap_or_default(),
                after.assignee.clone().unwrap_or_default(),
            ),
        ];
        for (field, old, new) in changes.iter().filter(|(_, old, new)| old != new) {
            ctx.record(NewActivity::field_change(&after.id, &user.id, field, old, new));
        }
    }
    println!("Updated task #{}.", after.id);
    Ok(())
}

pub fn cmd_move(ctx: &Context, id: String, status: Status) -> Result<()> {
    let mut tasks: EntityStore<Task> = ctx.store();
    let task = tasks.move_to(&id, status)?;
    println!("Moved #{} to {}.", task.id, task.status.label());
    Ok(())
}

pub fn cmd_delete(ctx: &Context, ids: Vec<String>) -> Result<()> {
    let mut tasks: EntityStore<Task> = ctx.store();
    tasks.bulk_delete(&ids)?;
    println!("Deleted {} task(s).", ids.len());
    Ok(())
}

pub fn cmd_dashboard(ctx: &Context) -> Result<()> {
    let mut tasks: EntityStore<Task> = ctx.store();
    let projects = project_names(ctx);
    let all = tasks.fetch_all()?;
    let stats = DashboardStats::compute(all, projects.items().len());

    println!(
        "Tasks: {}   Done: {}   In progress: {}   Projects: {}",
        stats.total, stats.done, stats.in_progress, stats.projects
    );
    println!("Completion {} {:.1}%", bar(stats.completion_rate, 20), stats.completion_rate);

    println!("\nBy status");
    for (status, count) in status_counts(all) {
        let pct = crate::stats::completion_rate(count, stats.total);
        println!("  {:<12} {:>4} {}", status.label(), count, bar(pct, 20));
    }
    println!("\nBy priority");
    for (priority, count) in priority_counts(all) {
        let pct = crate::stats::completion_rate(count, stats.total);
        println!("  {:<12} {:>4} {}", priority.label(), count, bar(pct, 20));
    }

    let recent = recent_tasks(all);
    if !recent.is_empty() {
        println!("\nRecent");
        print_task_table(&recent, &|id| projects.name_of(id));
    }
    Ok(())
}

pub fn cmd_board(ctx: &Context, project: Option<String>) -> Result<()> {
    let mut tasks: EntityStore<Task> = ctx.store();
    let mut engine = SearchEngine::new();
    engine.set_tasks(tasks.fetch_all()?.to_vec());
    engine.update_filters(FilterPatch::project(project.as_deref()));

    for column in kanban_columns(engine.filtered_view()) {
        println!("== {} ({}) ==", column.status.label(), column.tasks.len());
        for t in column.tasks {
            println!("  #{:<5} {:<8} {}", t.id, t.priority.label(), truncate(&t.title, 60));
        }
        println!();
    }
    Ok(())
}

// ---- projects, users ----

pub fn cmd_projects(ctx: &Context, action: ProjectAction) -> Result<()> {
    let mut projects: EntityStore<Project> = ctx.store();
    match action {
        ProjectAction::List => {
            let all = projects.fetch_all()?;
            print_projects(all);
        }
        ProjectAction::Active => {
            let active = projects.active()?;
            print_projects(&active);
        }
        ProjectAction::Add { name, desc, deadline, members, owner } => {
            let owner = match owner {
                Some(o) => o,
                None => ctx.require_user()?.id,
            };
            let mut draft = NewProject::new(name, owner);
            draft.description = desc.unwrap_or_default();
            draft.deadline = deadline.as_deref().map(due_arg).transpose()?;
            draft.team_members = split_and_normalise_tags(&members);
            let p = projects.create(&draft)?;
            println!("Added project #{}: {}", p.id, p.name);
        }
        ProjectAction::Update { id, name, desc, status, deadline, progress } => {
            let patch = ProjectPatch {
                name,
                description: desc,
                status,
                deadline: deadline.as_deref().map(due_arg).transpose()?,
                progress: progress.map(|p| p.clamp(0.0, 100.0)),
                team_members: None,
            };
            let p = projects.update(&id, &patch)?;
            println!("Updated project #{}.", p.id);
        }
        ProjectAction::Delete { id } => {
            projects.delete(&id)?;
            println!("Deleted project #{id}.");
        }
    }
    Ok(())
}

fn print_projects(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects.");
        return;
    }
    println!("{:<6} {:<24} {:<10} {:<12} {}", "ID", "Name", "Status", "Deadline", "Progress");
    for p in projects {
        println!(
            "{:<6} {:<24} {:<10} {:<12} {}",
            truncate(&p.id, 6),
            truncate(&p.name, 24),
            p.status.label(),
            p.deadline.as_deref().map(|d| truncate(d, 10)).unwrap_or_else(|| "-".into()),
            bar(p.progress.unwrap_or(0.0), 10)
        );
    }
}

pub fn cmd_users(ctx: &Context) -> Result<()> {
    let mut users: EntityStore<User> = ctx.store();
    for u in users.fetch_all()? {
        let role = match u.role {
            Some(Role::Admin) => "admin",
            Some(Role::Member) => "member",
            None => "-",
        };
        println!("{:<6} {:<20} {:<28} {}", truncate(&u.id, 6), truncate(&u.name, 20), u.email, role);
    }
    Ok(())
}

// ---- comments, activity ----

pub fn cmd_comments(ctx: &Context, action: CommentAction) -> Result<()> {
    let mut comments: EntityStore<Comment> = ctx.store();
    match action {
        CommentAction::List { task } => {
            let thread = comments.load_for_task(&task)?;
            if thread.is_empty() {
                println!("No comments on #{task}.");
            }
            for c in thread {
                let mentions =
                    if c.mentions.is_empty() { String::new() } else { format!(" [@{}]", c.mentions.join(", @")) };
                println!(
                    "#{} {} ({} likes){}\n  {}",
                    c.id,
                    c.user_name.as_deref().unwrap_or(&c.user_id),
                    c.likes,
                    mentions,
                    c.content
                );
            }
        }
        CommentAction::Add { task, content } => {
            let user = ctx.require_user()?;
            let mut draft = NewComment::new(&task, &user.id, &content);
            draft.user_name = Some(user.name.clone());
            let c = comments.create(&draft)?;
            ctx.record(NewActivity {
                task_id: task,
                user_id: user.id,
                action: ActivityType::Commented,
                details: None,
                description: "added a comment".into(),
            });
            println!("Added comment #{}.", c.id);
        }
        CommentAction::Edit { id, content } => {
            let c = comments.update(&id, &CommentPatch::new(&content))?;
            println!("Edited comment #{}.", c.id);
        }
        CommentAction::Like { id } => {
            let c = comments.like(&id)?;
            println!("Comment #{} now has {} likes.", c.id, c.likes);
        }
        CommentAction::Delete { id } => {
            comments.delete(&id)?;
            println!("Deleted comment #{id}.");
        }
    }
    Ok(())
}

pub fn cmd_activity(ctx: &Context, action: ActivityAction) -> Result<()> {
    let mut activities: EntityStore<Activity> = ctx.store();
    match action {
        ActivityAction::List { task, project, user } => {
            let entries: Vec<Activity> = match (task, project, user) {
                (Some(t), _, _) => activities.load_for_task(&t)?.to_vec(),
                (_, Some(p), _) => activities.load_for_project(&p)?.to_vec(),
                (_, _, Some(u)) => {
                    let mut items = activities.for_user(&u)?;
                    crate::activity::sort_newest_first(&mut items);
                    items
                }
                (None, None, None) => {
                    return Err(Error::Invalid("Pass one of --task, --project or --user.".into()));
                }
            };
            for a in &entries {
                println!(
                    "{}  #{:<5} {:<16} {}",
                    truncate(&a.created_at, 19),
                    a.task_id,
                    a.action.label(),
                    a.description
                );
            }
        }
        ActivityAction::Add { task, action, description } => {
            let user = ctx.require_user()?;
            let a = activities.create(&NewActivity { task_id: task, user_id: user.id, action, details: None, description })?;
            println!("Recorded activity #{}.", a.id);
        }
    }
    Ok(())
}

// ---- recurring tasks, templates ----

pub fn cmd_recurring(ctx: &Context, action: RecurringAction) -> Result<()> {
    let mut recurring: EntityStore<RecurringTask> = ctx.store();
    match action {
        RecurringAction::List { project } => {
            let defs = match project {
                Some(p) => recurring.load_for_project(&p)?,
                None => recurring.fetch_all()?,
            };
            for r in defs {
                println!(
                    "#{:<5} {:<28} {:<10} next {:<10} {:>3}x {}",
                    r.id,
                    truncate(&r.title, 28),
                    r.frequency.label(),
                    truncate(&r.next_due_date, 10),
                    r.generated_instances,
                    if r.is_active { "active" } else { "paused" }
                );
            }
        }
        RecurringAction::Add { title, project, frequency, next, end, priority, desc } => {
            let user = ctx.require_user()?;
            let draft = NewRecurring {
                title,
                description: desc.unwrap_or_default(),
                project_id: project,
                frequency,
                next_due_date: due_arg(&next)?,
                end_date: end.as_deref().map(due_arg).transpose()?,
                days_of_week: Vec::new(),
                day_of_month: None,
                priority,
                is_active: true,
                created_by: user.id,
            };
            let r = recurring.create(&draft)?;
            println!("Added recurring task #{} ({}).", r.id, r.frequency.label());
        }
        RecurringAction::Toggle { id } => {
            let r = recurring.toggle(&id)?;
            println!("#{} is now {}.", r.id, if r.is_active { "active" } else { "paused" });
        }
        RecurringAction::Generate { id } => {
            let mut tasks: EntityStore<Task> = ctx.store();
            let task = recurring.generate_next(&id, &mut tasks)?;
            println!("Created task #{}: {} (due {})", task.id, task.title, task.due_date.as_deref().unwrap_or("-"));
        }
        RecurringAction::Delete { id } => {
            recurring.delete(&id)?;
            println!("Deleted recurring task #{id}.");
        }
    }
    Ok(())
}

pub fn cmd_templates(ctx: &Context, action: TemplateAction) -> Result<()> {
    let mut templates: EntityStore<TaskTemplate> = ctx.store();
    match action {
        TemplateAction::List { project } => {
            let list = match project {
                Some(p) => templates.for_project(&p)?,
                None => templates.fetch_all()?.to_vec(),
            };
            if list.is_empty() {
                println!("No templates found.");
            }
            for t in &list {
                println!(
                    "#{:<5} {:<24} {:<8} {:>2} steps, used {}x",
                    t.id,
                    truncate(&t.name, 24),
                    t.priority.label(),
                    t.checklist.len(),
                    t.usage_count
                );
            }
        }
        TemplateAction::Add { name, project, desc, priority, estimate, tags, steps, assignee } => {
            let created_by = ctx.session().current_user().map(|u| u.id.clone()).unwrap_or_default();
            let draft = NewTemplate {
                name,
                description: desc.unwrap_or_default(),
                project_id: project,
                priority,
                estimated_hours: estimate,
                tags: split_and_normalise_tags(&tags),
                checklist: NewTemplate::checklist_from(&steps),
                default_assignee: assignee,
                created_by,
                usage_count: 0,
            };
            let t = templates.create(&draft)?;
            println!("Added template #{}: {}", t.id, t.name);
        }
        TemplateAction::Use { id, title } => {
            let template = templates.fetch_by_id(&id)?;
            let mut tasks: EntityStore<Task> = ctx.store();
            let task = tasks.create(&template.to_new_task(&title))?;
            templates.increment_usage(&id)?;
            println!("Added task #{} from template '{}'.", task.id, template.name);
        }
        TemplateAction::Duplicate { id } => {
            let copy = templates.duplicate(&id)?;
            println!("Created template #{}: {}", copy.id, copy.name);
        }
        TemplateAction::Delete { id } => {
            templates.delete(&id)?;
            println!("Deleted template #{id}.");
        }
    }
    Ok(())
}

// ---- analytics ----

pub fn cmd_analytics(ctx: &Context, project: String, team: bool, trend: Option<u32>) -> Result<()> {
    let analytics = Analytics::new(Arc::clone(&ctx.gateway));
    let today = Local::now().date_naive();
    let projects = project_names(ctx);
    let name = projects.name_of(&project);

    let report = analytics.project(&project, today)?;
    let metrics = analytics.metrics(&project, &name, today)?;
    println!("{name}: {} tasks, {} done, {} overdue", report.total_tasks, report.completed_tasks, report.tasks_overdue);
    println!("Completion {} {:.1}%   health: {}", bar(report.completion_rate, 20), report.completion_rate, metrics.health);
    println!("Average completion time: {:.1}h", report.avg_completion_time);

    println!("\nBy status");
    for s in &report.tasks_by_status {
        println!("  {:<12} {:>4} {:>5.1}%", s.status, s.count, s.percentage);
    }
    println!("\nBy priority");
    for p in &report.tasks_by_priority {
        println!("  {:<12} {:>4} avg {:.1}h", p.priority, p.count, p.avg_completion_time);
    }
    if !report.weekly_trend.is_empty() {
        println!("\nWeekly");
        for w in &report.weekly_trend {
            println!("  {:<10} created {:>3}  done {:>3}  active {:>3}", w.week, w.created, w.completed, w.in_progress);
        }
    }

    if team {
        println!("\nTeam");
        for m in analytics.team_productivity(&project)? {
            println!(
                "  {:<20} done {:>3}  open {:>3}  score {:>5.1}  {}",
                truncate(&m.user_name, 20),
                m.tasks_completed,
                m.current_workload,
                m.productivity_score,
                m.trend
            );
        }
    }
    if let Some(days) = trend {
        let series = analytics.completion_trend(&project, days)?;
        println!("\nCompletion trend ({days} days)\n{}", serde_json::to_string_pretty(&series)?);
    }
    Ok(())
}

// ---- theme, watch, ui ----

pub fn cmd_theme(ctx: &mut Context, action: Option<ThemeAction>) -> Result<()> {
    let mut prefs = ThemePrefs::load(&ctx.state);
    match action.unwrap_or(ThemeAction::Show) {
        ThemeAction::Show => {}
        ThemeAction::Toggle => {
            prefs.toggle(&mut ctx.state)?;
        }
        ThemeAction::Set { theme } => prefs.set(theme, &mut ctx.state)?,
    }
    println!("Theme: {}", prefs.theme().as_str());
    Ok(())
}

/// One line per task that appeared, disappeared or changed between two
/// snapshots.
pub fn diff_snapshots(old: &[Task], new: &[Task]) -> Vec<String> {
    let before: HashMap<&str, &Task> = old.iter().map(|t| (t.id.as_str(), t)).collect();
    let after: HashMap<&str, &Task> = new.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut lines = Vec::new();
    for t in new {
        match before.get(t.id.as_str()) {
            None => lines.push(format!("+ #{} {} [{}]", t.id, t.title, t.status.label())),
            Some(o) if o.status != t.status => {
                lines.push(format!("~ #{} {}: {} -> {}", t.id, t.title, o.status.label(), t.status.label()))
            }
            Some(o) if *o != t => lines.push(format!("~ #{} {} updated", t.id, t.title)),
            Some(_) => {}
        }
    }
    for t in old.iter().filter(|t| !after.contains_key(t.id.as_str())) {
        lines.push(format!("- #{} {}", t.id, t.title));
    }
    lines
}

pub fn cmd_watch(ctx: &Context, interval: Option<u64>) -> Result<()> {
    let interval = interval.map(Duration::from_secs).unwrap_or(ctx.config.poll_interval);
    let mut tasks: EntityStore<Task> = ctx.store();
    let mut previous = tasks.fetch_all()?.to_vec();
    println!("Watching {} tasks on {} (Ctrl-C to stop)", previous.len(), ctx.gateway.describe());

    let poller: Poller<Task> = Poller::start(Arc::clone(&ctx.gateway), interval);
    loop {
        match poller.recv_timeout(interval + Duration::from_secs(30)) {
            Some(Ok(items)) => {
                let stamp = Local::now().format("%H:%M:%S");
                for line in diff_snapshots(&previous, &items) {
                    println!("{stamp} {line}");
                }
                tasks.apply_fetched(items);
                previous = tasks.items().to_vec();
            }
            Some(Err(e)) => eprintln!("poll failed: {e}"),
            None => {}
        }
    }
}

/// Launch the interactive kanban board.
pub fn cmd_ui(ctx: Context) -> Result<()> {
    let Context { config, gateway, state } = ctx;
    let mut board = Board::new(gateway, config.cache_options(), state).with_polling(config.poll_interval);
    board.load();
    run_board(&mut board)?;
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(id: &str, status: &str) -> Task {
        serde_json::from_value(json!({
            "id": id, "title": format!("t{id}"), "status": status, "priority": "low", "projectId": "1"
        }))
        .unwrap()
    }

    fn context() -> (tempfile::TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.json");
        std::fs::write(
            &db,
            json!({
                "users": [{"id": 1, "email": "ana@example.com", "name": "Ana"}],
                "projects": [{"id": 1, "name": "Website", "status": "active"}],
                "tasks": [{"id": 1, "title": "Design", "status": "todo", "priority": "low",
                           "projectId": 1, "createdAt": "2024-01-01T00:00:00Z"}],
                "activities": [],
                "comments": []
            })
            .to_string(),
        )
        .unwrap();
        let mut config = Config::defaults(dir.path().to_path_buf());
        config.mock_db = Some(db);
        (dir, Context::new(config).unwrap())
    }

    #[test]
    fn test_diff_snapshots() {
        let old = vec![task("1", "todo"), task("2", "todo")];
        let new = vec![task("1", "done"), task("3", "review")];
        let lines = diff_snapshots(&old, &new);
        assert_eq!(lines, vec!["~ #1 t1: To Do -> Done", "+ #3 t3 [Review]", "- #2 t2"]);
        assert!(diff_snapshots(&new, &new).is_empty());
    }

    #[test]
    fn test_date_bound_expands_end_of_day() {
        assert_eq!(date_bound("2024-01-15", false), "2024-01-15");
        assert_eq!(date_bound("2024-01-15", true), "2024-01-15T23:59:59.999Z");
        assert_eq!(date_bound("garbage", true), "garbage");
    }

    #[test]
    fn test_due_arg_rejects_nonsense() {
        assert_eq!(due_arg("2024-03-01").unwrap(), "2024-03-01");
        assert!(matches!(due_arg("someday"), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_add_requires_project_and_login_records_activity() {
        let (_dir, mut ctx) = context();
        let args = |project: Option<&str>| AddArgs {
            title: "Write docs".into(),
            desc: None,
            priority: Some(Priority::High),
            status: None,
            project: project.map(str::to_string),
            assignee: None,
            due: Some("2024-05-01".into()),
            tags: vec!["Docs, api".into()],
            estimate: None,
            template: None,
        };
        assert!(matches!(cmd_add(&ctx, args(None)), Err(Error::Invalid(_))));

        cmd_login(&mut ctx, "ana@example.com".into(), String::new()).unwrap();
        cmd_add(&ctx, args(Some("1"))).unwrap();

        let mut tasks: EntityStore<Task> = ctx.store();
        let created = tasks.fetch_by_id("2").unwrap();
        assert_eq!(created.tags, vec!["api", "docs"]);
        assert_eq!(created.due_date.as_deref(), Some("2024-05-01"));
        let mut log: EntityStore<Activity> = ctx.store();
        assert_eq!(log.load_for_task("2").unwrap().len(), 1);
    }

    #[test]
    fn test_update_records_status_change() {
        let (_dir, mut ctx) = context();
        cmd_login(&mut ctx, "ana@example.com".into(), String::new()).unwrap();
        let args = UpdateArgs {
            id: "1".into(),
            title: None,
            desc: None,
            status: Some(Status::Review),
            priority: None,
            assignee: Some("none".into()),
            due: None,
            clear_due: false,
            tags: Vec::new(),
            estimate: None,
            actual: None,
        };
        cmd_update(&ctx, args).unwrap();

        let mut log: EntityStore<Activity> = ctx.store();
        let entries = log.load_for_task("1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActivityType::StatusChanged);
    }

    #[test]
    fn test_comment_requires_login() {
        let (_dir, ctx) = context();
        let err = cmd_comments(&ctx, CommentAction::Add { task: "1".into(), content: "hi @bo".into() }).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }
}
