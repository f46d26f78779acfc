use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Colours handed out to new notes that do not bring their own.
pub const PALETTE: [&str; 6] = [
    "#ffea5c", "#ffb6c1", "#98fb98", "#add8e6", "#dda0dd", "#f0e68c",
];

/// The server removes a note once its dislikes reach this count.
pub const DISLIKE_THRESHOLD: u32 = 20;

pub const DEFAULT_NOTE_LIMIT: usize = 10;

const DEFAULT_POSITION: f64 = 50.0;
const TEMP_PREFIX: &str = "temp-";

/// Server-assigned note identifier. Older backends hand out numbers, newer
/// ones strings; drafts carry a `temp-<millis>` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteId {
    Num(i64),
    Text(String),
}

impl NoteId {
    pub fn temporary(now: DateTime<Utc>) -> Self {
        NoteId::Text(format!("{}{}", TEMP_PREFIX, now.timestamp_millis()))
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, NoteId::Text(s) if s.starts_with(TEMP_PREFIX))
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteId::Num(n) => write!(f, "{}", n),
            NoteId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for NoteId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<i64>() {
            Ok(n) => NoteId::Num(n),
            Err(_) => NoteId::Text(s.trim().to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardType {
    #[default]
    Main,
    Profile,
}

/// Which slice of the note collection a board shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardScope {
    Main,
    /// A user's profile board. `private: None` shows every profile note of
    /// the user, `Some(flag)` only those with a matching privacy flag.
    Profile {
        username: String,
        private: Option<bool>,
    },
}

impl BoardScope {
    pub fn board_type(&self) -> BoardType {
        match self {
            BoardScope::Main => BoardType::Main,
            BoardScope::Profile { .. } => BoardType::Profile,
        }
    }

    /// Privacy flag given to notes created on this board.
    pub fn creates_private(&self) -> bool {
        match self {
            BoardScope::Main => false,
            BoardScope::Profile { private, .. } => private.unwrap_or(true),
        }
    }

    pub fn label(&self) -> String {
        match self {
            BoardScope::Main => "main".into(),
            BoardScope::Profile { username, private } => match private {
                Some(true) => format!("{} (private)", username),
                Some(false) => format!("{} (public)", username),
                None => username.clone(),
            },
        }
    }
}

/// Board area in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Viewport { width, height }
    }

    pub fn center_for_new_note(&self) -> (f64, f64) {
        let x = ((self.width - 150.0) / 2.0).round().max(0.0);
        let y = ((self.height - 120.0) / 2.0).round().max(0.0);
        (x, y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default, deserialize_with = "nullable")]
    pub text: String,
    #[serde(default = "default_position", deserialize_with = "position")]
    pub x: f64,
    #[serde(default = "default_position", deserialize_with = "position")]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub done: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub deleted: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub likes: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub dislikes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, alias = "private", deserialize_with = "nullable")]
    pub is_private: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub board_type: BoardType,
    #[serde(skip)]
    pub z_index: Option<i32>,
    #[serde(
        default,
        deserialize_with = "lenient_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Shown on the board: neither completed nor soft-deleted.
    pub fn is_active(&self) -> bool {
        !self.done && !self.deleted
    }

    pub fn last_touched(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }

    pub fn display_color(&self) -> &str {
        self.color.as_deref().unwrap_or(PALETTE[0])
    }
}

/// Body of a create request, built client-side before the server assigns
/// an id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub done: bool,
    pub likes: u32,
    pub dislikes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub board_type: BoardType,
    pub is_private: bool,
}

impl NoteDraft {
    pub fn new(
        text: impl Into<String>,
        scope: &BoardScope,
        username: Option<String>,
        (x, y): (f64, f64),
    ) -> Self {
        NoteDraft {
            text: text.into(),
            x,
            y,
            color: random_color(),
            done: false,
            likes: 0,
            dislikes: 0,
            username,
            board_type: scope.board_type(),
            is_private: scope.creates_private(),
        }
    }

    pub fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            text: self.text,
            x: self.x,
            y: self.y,
            color: Some(self.color),
            done: self.done,
            deleted: false,
            likes: self.likes,
            dislikes: self.dislikes,
            username: self.username,
            is_private: self.is_private,
            board_type: self.board_type,
            z_index: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Partial note sent with `PUT /api/notes/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

impl NotePatch {
    pub fn position(x: f64, y: f64) -> Self {
        NotePatch {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn soft_delete() -> Self {
        NotePatch {
            deleted: Some(true),
            ..Default::default()
        }
    }

    pub fn restore() -> Self {
        NotePatch {
            done: Some(false),
            deleted: Some(false),
            ..Default::default()
        }
    }

    pub fn privacy(is_private: bool) -> Self {
        NotePatch {
            is_private: Some(is_private),
            ..Default::default()
        }
    }

    pub fn apply(&self, note: &mut Note) {
        if let Some(x) = self.x {
            note.x = x;
        }
        if let Some(y) = self.y {
            note.y = y;
        }
        if let Some(done) = self.done {
            note.done = done;
        }
        if let Some(deleted) = self.deleted {
            note.deleted = deleted;
        }
        if let Some(is_private) = self.is_private {
            note.is_private = is_private;
        }
    }
}

pub fn random_color() -> String {
    PALETTE
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(PALETTE[0])
        .to_string()
}

fn default_position() -> f64 {
    DEFAULT_POSITION
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn position<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_POSITION))
}

fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => parse_timestamp(&s),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    })
}

/// Accepts RFC 3339 or a zone-less `YYYY-MM-DDTHH:MM:SS[.fff]`, read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}
