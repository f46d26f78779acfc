use crate::model::{Viewport, DEFAULT_NOTE_LIMIT};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://localhost:8081";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Hosts served only over TLS; plain `http` URLs pointing at them are
/// upgraded.
const HOSTED_DOMAINS: &[&str] = &["run.app"];

/// Pixel size of one terminal cell when mapping board coordinates.
const CELL_WIDTH_PX: f64 = 8.0;
const CELL_HEIGHT_PX: f64 = 16.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid api url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("note limit must be at least 1")]
    ZeroNoteLimit,
}

/// Everything the client needs to know about its environment, resolved once
/// at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub timeout: Duration,
    pub note_limit: usize,
    /// Board size used when no terminal is attached (CLI commands).
    pub viewport: Viewport,
    pub cell_width: f64,
    pub cell_height: f64,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn new(
        api_url: &str,
        timeout_secs: u64,
        note_limit: usize,
        log_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if note_limit == 0 {
            return Err(ConfigError::ZeroNoteLimit);
        }
        let base_url = normalize_base_url(api_url)?;
        Ok(Config {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            note_limit,
            viewport: Viewport::new(1280.0, 800.0),
            cell_width: CELL_WIDTH_PX,
            cell_height: CELL_HEIGHT_PX,
            log_file,
        })
    }

    /// Converts a terminal cell position to board pixels.
    pub fn cell_to_px(&self, column: u16, row: u16) -> (f64, f64) {
        (
            f64::from(column) * self.cell_width,
            f64::from(row) * self.cell_height,
        )
    }

    pub fn px_to_cell(&self, x: f64, y: f64) -> (u16, u16) {
        let column = (x / self.cell_width).floor().clamp(0.0, f64::from(u16::MAX));
        let row = (y / self.cell_height).floor().clamp(0.0, f64::from(u16::MAX));
        (column as u16, row as u16)
    }
}

/// Parses the base URL, drops any trailing slash from the path and moves
/// known hosted domains onto `https`.
pub fn normalize_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a base url".into()));
    }
    let hosted = url
        .host_str()
        .map(|host| {
            HOSTED_DOMAINS
                .iter()
                .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
        })
        .unwrap_or(false);
    if hosted && url.scheme() == "http" {
        debug!(host = url.host_str(), "upgrading hosted api url to https");
        url.set_scheme("https")
            .map_err(|_| invalid("cannot switch scheme".into()))?;
    }
    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}/", trimmed));
    Ok(url)
}
