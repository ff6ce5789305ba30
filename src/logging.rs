//! tracing-subscriber setup.
//!
//! `RUST_LOG` wins when set. Otherwise commands log warnings to stderr, and
//! `-v` raises that to debug for this crate.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

fn filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "warn,taskflow=debug" } else { "warn" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Log to stderr. Safe to call more than once; later calls are no-ops.
pub fn init(verbose: bool) {
    let _ = fmt().with_env_filter(filter(verbose)).with_writer(std::io::stderr).with_target(false).try_init();
}

/// Log to a file, for the board, where stderr would tear the screen.
pub fn init_file(path: &Path, verbose: bool) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let _ = fmt()
        .with_env_filter(filter(verbose))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}
