//! Filtered projections over the shared note collection.

use crate::model::Note;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const TOP_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Board,
    Done,
    Deleted,
    Top,
    Important,
}

impl View {
    pub const ALL: [View; 5] = [View::Board, View::Done, View::Deleted, View::Top, View::Important];

    /// Notes this view shows, in display order.
    pub fn project<'a, I>(self, notes: I) -> Vec<&'a Note>
    where
        I: IntoIterator<Item = &'a Note>,
    {
        match self {
            View::Board => notes.into_iter().filter(|n| n.is_active()).collect(),
            View::Done => done(notes),
            View::Deleted => deleted(notes),
            View::Top => top(notes),
            View::Important => important(notes),
        }
    }

    /// Whether restore and permanent delete apply to this view's notes.
    pub fn is_archive(self) -> bool {
        matches!(self, View::Done | View::Deleted)
    }

    pub fn next(self) -> Self {
        let idx = View::ALL.iter().position(|v| *v == self).unwrap_or(0);
        View::ALL[(idx + 1) % View::ALL.len()]
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            View::Board => "Board",
            View::Done => "Done",
            View::Deleted => "Deleted",
            View::Top => "Top",
            View::Important => "Important",
        };
        f.write_str(name)
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "board" | "active" => Ok(View::Board),
            "done" => Ok(View::Done),
            "deleted" => Ok(View::Deleted),
            "top" => Ok(View::Top),
            "important" => Ok(View::Important),
            other => Err(format!("unknown view {}", other)),
        }
    }
}

/// Completed notes that are not deleted, most recently touched first.
pub fn done<'a, I>(notes: I) -> Vec<&'a Note>
where
    I: IntoIterator<Item = &'a Note>,
{
    let mut done: Vec<&Note> = notes
        .into_iter()
        .filter(|n| n.done && !n.deleted)
        .collect();
    done.sort_by(|a, b| newest_first(a, b));
    done
}

pub fn deleted<'a, I>(notes: I) -> Vec<&'a Note>
where
    I: IntoIterator<Item = &'a Note>,
{
    let mut deleted: Vec<&Note> = notes.into_iter().filter(|n| n.deleted).collect();
    deleted.sort_by(|a, b| newest_first(a, b));
    deleted
}

/// The ten best-liked notes; fewer dislikes break ties, then list order.
pub fn top<'a, I>(notes: I) -> Vec<&'a Note>
where
    I: IntoIterator<Item = &'a Note>,
{
    let mut ranked: Vec<&Note> = notes.into_iter().collect();
    ranked.sort_by(|a, b| b.likes.cmp(&a.likes).then(a.dislikes.cmp(&b.dislikes)));
    ranked.truncate(TOP_COUNT);
    ranked
}

pub fn important<'a, I>(notes: I) -> Vec<&'a Note>
where
    I: IntoIterator<Item = &'a Note>,
{
    notes.into_iter().filter(|n| is_important(n)).collect()
}

pub fn is_important(note: &Note) -> bool {
    note.likes > 0 || note.text.to_lowercase().contains("important") || note.text.contains('!')
}

// Missing timestamps sort last.
fn newest_first(a: &Note, b: &Note) -> Ordering {
    match (a.last_touched(), b.last_touched()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
