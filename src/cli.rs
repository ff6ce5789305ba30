use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;
use crate::config::Overrides;

/// Terminal client for the TaskFlow task board.
/// Talks to the REST API at --api-url, or to a json-server style file
/// passed via --mock-db.
#[derive(Parser)]
#[command(name = "tf", version, about = "TaskFlow task board client")]
pub struct Cli {
    /// Base URL of the API (default http://localhost:3000).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Serve requests from this JSON file instead of the API.
    #[arg(long, global = true)]
    pub mock_db: Option<PathBuf>,

    /// Directory for config.json, state.json and the board log.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides { api_url: self.api_url.clone(), mock_db: self.mock_db.clone(), data_dir: self.data_dir.clone() }
    }
}
