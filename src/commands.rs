use crate::cli::BoardChoice;
use crate::ui;
use anyhow::{bail, Context as _, Result};
use std::io::{self, BufRead, Write};
use stickyboard::api::ApiClient;
use stickyboard::config::Config;
use stickyboard::model::{BoardScope, Note, NoteId};
use stickyboard::storage::{Session, StorageLocation};
use stickyboard::sync::Board;
use stickyboard::theme::{NoteStyle, ThemeName};
use stickyboard::views::View;
use tokio::runtime::Runtime;
use tracing::info;

/// Everything a command needs, resolved once in `main`.
pub struct Context {
    pub config: Config,
    pub storage: StorageLocation,
    pub board: BoardChoice,
}

impl Context {
    pub fn scope(&self, session: &Session) -> Result<BoardScope> {
        match self.board {
            BoardChoice::Main => Ok(BoardScope::Main),
            BoardChoice::Profile { private } => match &session.username {
                Some(username) if session.is_logged_in() => Ok(BoardScope::Profile {
                    username: username.clone(),
                    private,
                }),
                _ => bail!("log in first to use your profile board"),
            },
        }
    }

    /// Connects to the service and loads the current notes.
    fn open_board(&self) -> Result<(Runtime, Board<ApiClient>)> {
        let session = self.storage.load_session()?;
        let scope = self.scope(&session)?;
        let username = session.username.clone();
        let api = ApiClient::new(&self.config, session)?;
        let runtime = Runtime::new().context("starting async runtime")?;
        let mut board = Board::new(api, scope, username, &self.config);
        runtime.block_on(board.refresh())?;
        Ok((runtime, board))
    }
}

pub fn login(ctx: &Context, username: String, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };
    let api = ApiClient::new(&ctx.config, Session::default())?;
    let runtime = Runtime::new().context("starting async runtime")?;
    let session = runtime.block_on(api.login(&username, &password))?;
    ctx.storage.save_session(&session)?;
    info!(%username, "logged in");
    println!("Logged in as {}", username);
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    ctx.storage.clear_session()?;
    println!("Logged out");
    Ok(())
}

pub fn list(ctx: &Context, view: View) -> Result<()> {
    let (_runtime, board) = ctx.open_board()?;
    let notes = view.project(board.store().notes());
    println!(
        "Board: {} / {} ({} of {} active)",
        board.scope().label(),
        view,
        board.store().active_count(),
        board.store().note_limit()
    );
    if notes.is_empty() {
        println!("  (empty)");
    }
    for note in notes {
        print_note(note);
    }
    Ok(())
}

pub fn add(ctx: &Context, text: String, position: Option<(f64, f64)>) -> Result<()> {
    let (runtime, mut board) = ctx.open_board()?;
    let saved = runtime.block_on(board.add(&text, position))?;
    match saved {
        Some(note) => println!("Added note {}", note.id),
        None => println!("Added note"),
    }
    Ok(())
}

pub fn move_note(ctx: &Context, id: NoteId, x: f64, y: f64) -> Result<()> {
    let (runtime, mut board) = ctx.open_board()?;
    runtime.block_on(board.move_to(&id, x, y))?;
    if let Some(note) = board.store().get(&id) {
        println!("Moved note {} to ({}, {})", id, note.x, note.y);
    }
    Ok(())
}

pub fn like(ctx: &Context, id: NoteId) -> Result<()> {
    let (runtime, mut board) = ctx.open_board()?;
    runtime.block_on(board.like(&id))?;
    report(board.store().get(&id), &id, "Liked");
    Ok(())
}

pub fn dislike(ctx: &Context, id: NoteId) -> Result<()> {
    let (runtime, mut board) = ctx.open_board()?;
    runtime.block_on(board.dislike(&id))?;
    match board.store().get(&id) {
        Some(note) => report(Some(note), &id, "Disliked"),
        None => println!("Note {} was removed after too many dislikes", id),
    }
    Ok(())
}

pub fn done(ctx: &Context, id: NoteId) -> Result<()> {
    let (runtime, mut board) = ctx.open_board()?;
    runtime.block_on(board.done(&id))?;
    println!("Marked note {} done", id);
    Ok(())
}

pub fn delete(ctx: &Context, id: NoteId) -> Result<()> {
    let (runtime, mut board) = ctx.open_board()?;
    runtime.block_on(board.delete(&id))?;
    println!("Moved note {} to deleted", id);
    Ok(())
}

pub fn restore(ctx: &Context, id: NoteId) -> Result<()> {
    let (runtime, mut board) = ctx.open_board()?;
    runtime.block_on(board.restore(&id))?;
    println!("Restored note {}", id);
    Ok(())
}

pub fn purge(ctx: &Context, id: NoteId, yes: bool) -> Result<()> {
    if !yes {
        let answer = prompt(&format!("Permanently delete note {}? [y/N] ", id))?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
    }
    let (runtime, mut board) = ctx.open_board()?;
    runtime.block_on(board.purge(&id))?;
    println!("Permanently deleted note {}", id);
    Ok(())
}

pub fn set_private(ctx: &Context, id: NoteId, value: bool) -> Result<()> {
    let (runtime, mut board) = ctx.open_board()?;
    runtime.block_on(board.set_private(&id, value))?;
    let visibility = if value { "private" } else { "public" };
    println!("Note {} is now {}", id, visibility);
    Ok(())
}

pub fn theme(ctx: &Context, name: Option<ThemeName>) -> Result<()> {
    let mut preferences = ctx.storage.load_preferences()?;
    match name {
        Some(theme) => {
            preferences.theme = theme;
            ctx.storage.save_preferences(&preferences)?;
            println!("Theme set to {}", theme);
        }
        None => println!("{}", preferences.theme),
    }
    Ok(())
}

pub fn note_style(ctx: &Context, name: Option<NoteStyle>) -> Result<()> {
    let mut preferences = ctx.storage.load_preferences()?;
    match name {
        Some(style) => {
            preferences.note_style = style;
            ctx.storage.save_preferences(&preferences)?;
            println!("Note style set to {}", style);
        }
        None => println!("{}", preferences.note_style),
    }
    Ok(())
}

pub fn tui(ctx: &Context) -> Result<()> {
    let session = ctx.storage.load_session()?;
    let scope = ctx.scope(&session)?;
    let preferences = ctx.storage.load_preferences()?;
    ui::run(ctx, session, scope, preferences)
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn report(note: Option<&Note>, id: &NoteId, verb: &str) {
    match note {
        Some(note) => println!(
            "{} note {} ({} likes, {} dislikes)",
            verb, id, note.likes, note.dislikes
        ),
        None => println!("{} note {}", verb, id),
    }
}

fn print_note(note: &Note) {
    println!("  - {}: {}", note.id, note.text);
    let mut flags = Vec::new();
    if note.done {
        flags.push("done");
    }
    if note.deleted {
        flags.push("deleted");
    }
    if note.is_private {
        flags.push("private");
    }
    println!(
        "    at ({}, {})  +{} -{}{}",
        note.x,
        note.y,
        note.likes,
        note.dislikes,
        if flags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", flags.join(", "))
        }
    );
    if let Some(author) = &note.username {
        println!("    by {}", author);
    }
    if let Some(at) = note.last_touched() {
        println!("    updated {}", at.format("%Y-%m-%d %H:%M"));
    }
}
