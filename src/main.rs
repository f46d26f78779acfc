mod cli;
mod commands;
mod ui;

use anyhow::{Context as _, Result};
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use stickyboard::storage::{default_log_path, StorageLocation};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.clone().unwrap_or(cli::Command::Tui);
    let config = args.config()?;
    let interactive = matches!(command, cli::Command::Tui);
    match &config.log_file {
        Some(path) if interactive => init_file_logging(path)?,
        None if interactive => init_file_logging(&default_log_path()?)?,
        _ => init_stderr_logging(),
    }
    info!(
        base_url = %config.base_url,
        timeout = ?config.timeout,
        note_limit = config.note_limit,
        "resolved configuration"
    );

    let ctx = commands::Context {
        config,
        storage: StorageLocation::locate()?,
        board: args.board_choice(),
    };
    match command {
        cli::Command::Login { username, password } => commands::login(&ctx, username, password),
        cli::Command::Logout => commands::logout(&ctx),
        cli::Command::List { view } => commands::list(&ctx, view),
        cli::Command::Add { text, x, y } => commands::add(&ctx, text, x.zip(y)),
        cli::Command::Move { id, x, y } => commands::move_note(&ctx, id, x, y),
        cli::Command::Like { id } => commands::like(&ctx, id),
        cli::Command::Dislike { id } => commands::dislike(&ctx, id),
        cli::Command::Done { id } => commands::done(&ctx, id),
        cli::Command::Delete { id } => commands::delete(&ctx, id),
        cli::Command::Restore { id } => commands::restore(&ctx, id),
        cli::Command::Purge { id, yes } => commands::purge(&ctx, id, yes),
        cli::Command::Private { id, value } => commands::set_private(&ctx, id, value),
        cli::Command::Theme { name } => commands::theme(&ctx, name),
        cli::Command::Style { name } => commands::note_style(&ctx, name),
        cli::Command::Tui => commands::tui(&ctx),
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

// The board owns the terminal, so its log goes to a file.
fn init_file_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {:?}", path))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("stickyboard=info"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("stickyboard=warn"))
        .with_writer(std::io::stderr)
        .init();
}
