use ratatui::prelude::Color;
use ratatui::widgets::BorderType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Triangles,
    Bubbles,
    Hearts,
}

#[derive(Error, Debug)]
#[error("unknown theme {0} (expected triangles, bubbles or hearts)")]
pub struct UnknownTheme(String);

impl ThemeName {
    pub const ALL: [ThemeName; 3] = [ThemeName::Triangles, ThemeName::Bubbles, ThemeName::Hearts];

    pub fn next(self) -> Self {
        match self {
            ThemeName::Triangles => ThemeName::Bubbles,
            ThemeName::Bubbles => ThemeName::Hearts,
            ThemeName::Hearts => ThemeName::Triangles,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            ThemeName::Triangles => Palette {
                background: Color::Rgb(16, 18, 24),
                border: Color::DarkGray,
                accent: Color::Cyan,
                text: Color::Gray,
                ornament: '△',
            },
            ThemeName::Bubbles => Palette {
                background: Color::Rgb(14, 22, 34),
                border: Color::Blue,
                accent: Color::LightBlue,
                text: Color::White,
                ornament: '○',
            },
            ThemeName::Hearts => Palette {
                background: Color::Rgb(30, 14, 22),
                border: Color::Magenta,
                accent: Color::LightMagenta,
                text: Color::White,
                ornament: '♥',
            },
        }
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThemeName::Triangles => "triangles",
            ThemeName::Bubbles => "bubbles",
            ThemeName::Hearts => "hearts",
        };
        f.write_str(name)
    }
}

impl FromStr for ThemeName {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThemeName::ALL
            .into_iter()
            .find(|theme| theme.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTheme(s.to_string()))
    }
}

/// Shape of the note cards, chosen independently of the board theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStyle {
    #[default]
    Default,
    Puzzle,
    Bubble,
}

#[derive(Error, Debug)]
#[error("unknown note style {0} (expected default, puzzle or bubble)")]
pub struct UnknownNoteStyle(String);

impl NoteStyle {
    pub const ALL: [NoteStyle; 3] = [NoteStyle::Default, NoteStyle::Puzzle, NoteStyle::Bubble];

    pub fn next(self) -> Self {
        match self {
            NoteStyle::Default => NoteStyle::Puzzle,
            NoteStyle::Puzzle => NoteStyle::Bubble,
            NoteStyle::Bubble => NoteStyle::Default,
        }
    }

    pub fn border(self) -> BorderType {
        match self {
            NoteStyle::Default => BorderType::Plain,
            NoteStyle::Puzzle => BorderType::Thick,
            NoteStyle::Bubble => BorderType::Rounded,
        }
    }
}

impl fmt::Display for NoteStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NoteStyle::Default => "default",
            NoteStyle::Puzzle => "puzzle",
            NoteStyle::Bubble => "bubble",
        };
        f.write_str(name)
    }
}

impl FromStr for NoteStyle {
    type Err = UnknownNoteStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NoteStyle::ALL
            .into_iter()
            .find(|style| style.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownNoteStyle(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub border: Color,
    pub accent: Color,
    pub text: Color,
    pub ornament: char,
}

/// Parses `#rrggbb` note colours; anything else falls back to yellow.
pub fn note_color(hex: &str) -> Color {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return Color::LightYellow;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::LightYellow,
    }
}
