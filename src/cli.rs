use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use stickyboard::config::{Config, ConfigError, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use stickyboard::model::{NoteId, DEFAULT_NOTE_LIMIT};
use stickyboard::theme::{NoteStyle, ThemeName};
use stickyboard::views::View;

#[derive(Parser, Debug)]
#[command(
    name = "stickyboard",
    version,
    about = "Terminal client for a shared sticky-note board"
)]
pub struct Cli {
    /// Base URL of the note service
    #[arg(long, env = "STICKYBOARD_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,
    /// Request timeout in seconds
    #[arg(long, env = "STICKYBOARD_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
    /// Maximum number of active notes on a board
    #[arg(long, env = "STICKYBOARD_NOTE_LIMIT", default_value_t = DEFAULT_NOTE_LIMIT)]
    pub note_limit: usize,
    /// Use your profile board instead of the main board
    #[arg(long)]
    pub profile: bool,
    /// Only private profile notes
    #[arg(long, requires = "profile", conflicts_with = "public")]
    pub private: bool,
    /// Only public profile notes
    #[arg(long, requires = "profile")]
    pub public: bool,
    /// Where the interactive board writes its log
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Which board the command works on, before the username is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardChoice {
    Main,
    Profile { private: Option<bool> },
}

impl Cli {
    pub fn config(&self) -> Result<Config, ConfigError> {
        Config::new(
            &self.api_url,
            self.timeout,
            self.note_limit,
            self.log_file.clone(),
        )
    }

    pub fn board_choice(&self) -> BoardChoice {
        if !self.profile {
            return BoardChoice::Main;
        }
        let private = match (self.private, self.public) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        BoardChoice::Profile { private }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and remember the session token
    Login {
        username: String,
        /// Password (prompted for when omitted)
        #[arg(long, env = "STICKYBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// List notes on the board
    List {
        /// board|active, done, deleted, top or important
        #[arg(long, default_value = "active")]
        view: View,
    },
    /// Add a new note
    Add {
        text: String,
        /// Horizontal position in board pixels (defaults to the centre)
        #[arg(long, requires = "y")]
        x: Option<f64>,
        /// Vertical position in board pixels
        #[arg(long, requires = "x")]
        y: Option<f64>,
    },
    /// Move a note to a new position
    Move { id: NoteId, x: f64, y: f64 },
    /// Like a note
    Like { id: NoteId },
    /// Dislike a note; notes with enough dislikes are removed
    Dislike { id: NoteId },
    /// Mark a note done
    Done { id: NoteId },
    /// Move a note to the deleted list
    Delete { id: NoteId },
    /// Bring a done or deleted note back to the board
    Restore { id: NoteId },
    /// Permanently delete a done or deleted note
    Purge {
        id: NoteId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Make a note private or public
    Private {
        id: NoteId,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
    /// Show or set the board theme
    Theme { name: Option<ThemeName> },
    /// Show or set the note card style
    Style { name: Option<NoteStyle> },
    /// Launch the interactive board
    Tui,
}
