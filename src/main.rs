//! # tf - TaskFlow terminal client
//!
//! Command-line and kanban-board client for a TaskFlow task management
//! backend: tasks, projects, comments, activity, recurring tasks,
//! templates and analytics.
//!
//! ## Quick Start
//!
//! ```bash
//! # Point at a running API (default http://localhost:3000)
//! tf login --email ana@example.com
//! tf list --status in-progress --sort due
//!
//! # Or work against a json-server style file
//! tf --mock-db db.json add "Write release notes" --project 1 --due fri
//!
//! # Interactive board
//! tf ui
//! ```
//!
//! Settings live in `~/.taskflow/config.json` and can be overridden with
//! `TASKFLOW_*` environment variables or command-line flags. The session and
//! theme are kept in `~/.taskflow/state.json`.

use clap::Parser;

pub mod activity;
pub mod analytics;
pub mod cache;
pub mod cli;
pub mod cmd;
pub mod comment;
pub mod config;
pub mod display;
pub mod error;
pub mod fields;
pub mod logging;
pub mod notify;
pub mod poller;
pub mod prefs;
pub mod project;
pub mod recurring;
pub mod search;
pub mod session;
pub mod signal;
pub mod stats;
pub mod store;
pub mod task;
pub mod user;
pub mod wire;
pub mod gateway {
    pub mod client;
    pub mod http;
    pub mod local;
}
pub mod tui {
    pub mod board;
    pub mod colors;
    pub mod input;
    pub mod run;
    pub mod utils;
}

use cli::Cli;
use cmd::*;
use config::Config;
use error::Result;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let is_ui = matches!(cli.command, Commands::Ui);
    // The board owns the screen, so it logs to a file instead.
    if !is_ui {
        logging::init(cli.verbose);
    }

    let config = Config::load(&cli.overrides())?;
    if is_ui {
        logging::init_file(&config.log_path(), cli.verbose)?;
    }

    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return Ok(());
    }

    let mut ctx = Context::new(config)?;
    match cli.command {
        Commands::Login { email, password } => cmd_login(&mut ctx, email, password),
        Commands::Register { email, name, password } => cmd_register(&mut ctx, email, name, password),
        Commands::Logout => cmd_logout(&mut ctx),
        Commands::Whoami => cmd_whoami(&ctx),

        Commands::List(args) => cmd_list(&ctx, args),
        Commands::View { id, comments, activity } => cmd_view(&ctx, id, comments, activity),
        Commands::Add(args) => cmd_add(&ctx, args),
        Commands::Update(args) => cmd_update(&ctx, args),
        Commands::Move { id, status } => cmd_move(&ctx, id, status),
        Commands::Delete { ids } => cmd_delete(&ctx, ids),

        Commands::Dashboard => cmd_dashboard(&ctx),
        Commands::Board { project } => cmd_board(&ctx, project),
        Commands::Projects { action } => cmd_projects(&ctx, action),
        Commands::Users => cmd_users(&ctx),
        Commands::Comments { action } => cmd_comments(&ctx, action),
        Commands::Activity { action } => cmd_activity(&ctx, action),
        Commands::Recurring { action } => cmd_recurring(&ctx, action),
        Commands::Templates { action } => cmd_templates(&ctx, action),
        Commands::Analytics { project, team, trend } => cmd_analytics(&ctx, project, team, trend),

        Commands::Theme { action } => cmd_theme(&mut ctx, action),
        Commands::Watch { interval } => cmd_watch(&ctx, interval),
        Commands::Ui => cmd_ui(ctx),
        Commands::Completions { .. } => unreachable!("completions handled above"),
    }
}
