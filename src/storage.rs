use crate::theme::{NoteStyle, ThemeName};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = "session.yml";
const PREFERENCES_FILE: &str = "preferences.yml";
const LOG_FILE: &str = "stickyboard.log";

/// Who is logged in. Written after a successful login and attached as a
/// bearer token to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub username: Option<String>,
}

impl Session {
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Session {
            token: Some(token.into()),
            username: Some(username.into()),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: ThemeName,
    #[serde(default)]
    pub note_style: NoteStyle,
}

/// Directory holding the session and preference files.
#[derive(Debug, Clone)]
pub struct StorageLocation {
    pub dir: PathBuf,
}

impl StorageLocation {
    pub fn locate() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "stickyboard").context("locating config directory")?;
        Ok(StorageLocation {
            dir: dirs.config_dir().to_path_buf(),
        })
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        StorageLocation { dir: dir.into() }
    }

    pub fn load_session(&self) -> Result<Session> {
        load_or_default(&self.dir.join(SESSION_FILE))
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        save(&self.dir.join(SESSION_FILE), session)
    }

    pub fn clear_session(&self) -> Result<()> {
        let path = self.dir.join(SESSION_FILE);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("removing {:?}", path))?;
        }
        Ok(())
    }

    pub fn load_preferences(&self) -> Result<Preferences> {
        load_or_default(&self.dir.join(PREFERENCES_FILE))
    }

    pub fn save_preferences(&self, preferences: &Preferences) -> Result<()> {
        save(&self.dir.join(PREFERENCES_FILE), preferences)
    }
}

pub fn default_log_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "stickyboard").context("locating data directory")?;
    Ok(dirs.data_dir().join(LOG_FILE))
}

fn load_or_default<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    if data.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(&data).with_context(|| format!("parsing {:?}", path))
}

fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(value).context("serializing settings")?;
    fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}
