//! HTTP access to the note service.
//!
//! Every call is attempted once. A `204 No Content` reply, or a successful
//! reply that is not JSON, decodes to `None` so callers can fall back to a
//! value of their choosing instead of failing on a loose backend.

use crate::config::Config;
use crate::model::{BoardScope, Note, NoteDraft, NoteId, NotePatch};
use crate::storage::Session;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("could not reach the server: {0}")]
    Transport(String),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid endpoint {0}")]
    Url(String),
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("login response carried no token")]
    MissingToken,
}

impl ApiError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport(err.to_string())
        }
    }

    /// Text suitable for a status line.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Timeout => "Request timeout. Please try again.".into(),
            ApiError::Transport(_) => {
                "No response from server. Please check your connection.".into()
            }
            ApiError::Status { status, .. } if *status == 401 || *status == 403 => {
                "Authentication failed. Please log in again.".into()
            }
            ApiError::Status { status, message } if message.is_empty() => {
                format!("Server error ({})", status)
            }
            ApiError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// The note operations the board depends on.
pub trait NoteApi {
    fn fetch_notes(
        &self,
        scope: &BoardScope,
    ) -> impl Future<Output = Result<Vec<Note>, ApiError>> + Send;

    fn create_note(
        &self,
        draft: &NoteDraft,
    ) -> impl Future<Output = Result<Option<Note>, ApiError>> + Send;

    fn update_note(
        &self,
        id: &NoteId,
        patch: &NotePatch,
    ) -> impl Future<Output = Result<Option<Note>, ApiError>> + Send;

    fn mark_done(&self, id: &NoteId)
        -> impl Future<Output = Result<Option<Note>, ApiError>> + Send;

    fn like(&self, id: &NoteId) -> impl Future<Output = Result<Option<Note>, ApiError>> + Send;

    /// `Ok(None)` means the server removed the note after it crossed the
    /// dislike threshold.
    fn dislike(&self, id: &NoteId)
        -> impl Future<Output = Result<Option<Note>, ApiError>> + Send;

    fn delete_note(&self, id: &NoteId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: Session,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Some endpoints wrap their list in an object. Entries stay raw so one
/// malformed note does not cost the whole board.
#[derive(Deserialize)]
#[serde(untagged)]
enum NoteList {
    Bare(Vec<serde_json::Value>),
    Data { data: Vec<serde_json::Value> },
    Notes { notes: Vec<serde_json::Value> },
}

impl NoteList {
    fn into_vec(self) -> Vec<Note> {
        let raw = match self {
            NoteList::Bare(notes) | NoteList::Data { data: notes } | NoteList::Notes { notes } => {
                notes
            }
        };
        raw.into_iter()
            .filter_map(|value| match serde_json::from_value::<Note>(value) {
                Ok(note) => Some(note),
                Err(err) => {
                    warn!(error = %err, "skipping note that could not be decoded");
                    None
                }
            })
            .collect()
    }
}

impl ApiClient {
    pub fn new(config: &Config, session: Session) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        Ok(ApiClient {
            http,
            base_url: config.base_url.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resolves a resource path against the base URL, adding the `api/`
    /// prefix when the path does not already carry it.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let clean = path.trim_start_matches('/');
        let full = if clean.starts_with("api/") {
            clean.to_string()
        } else {
            format!("api/{}", clean)
        };
        self.base_url
            .join(&full)
            .map_err(|e| ApiError::Url(format!("{}: {}", full, e)))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let builder = self
            .request(Method::POST, "auth/login")?
            .json(&LoginRequest { username, password });
        let reply: Option<LoginResponse> = self.execute(builder).await?;
        let token = reply
            .and_then(|r| r.token)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::MissingToken)?;
        Ok(Session::new(token, username))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "api request");
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.session.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let response = builder.send().await.map_err(ApiError::from_reqwest)?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(ApiError::from_reqwest)?;
        debug!(status = status.as_u16(), bytes = body.len(), "api response");
        decode_body(status, content_type.as_deref(), &body)
    }
}

impl NoteApi for ApiClient {
    async fn fetch_notes(&self, scope: &BoardScope) -> Result<Vec<Note>, ApiError> {
        let builder = match scope {
            BoardScope::Main => self.request(Method::GET, "notes")?,
            BoardScope::Profile { username, private } => {
                let builder =
                    self.request(Method::GET, &format!("notes/profile/{}", username))?;
                match private {
                    Some(flag) => builder.query(&[("isPrivate", flag)]),
                    None => builder,
                }
            }
        };
        let list: Option<NoteList> = self.execute(builder).await?;
        Ok(list.map(NoteList::into_vec).unwrap_or_default())
    }

    async fn create_note(&self, draft: &NoteDraft) -> Result<Option<Note>, ApiError> {
        let builder = self.request(Method::POST, "notes")?.json(draft);
        self.execute(builder).await
    }

    async fn update_note(&self, id: &NoteId, patch: &NotePatch) -> Result<Option<Note>, ApiError> {
        let builder = self
            .request(Method::PUT, &format!("notes/{}", id))?
            .json(patch);
        self.execute(builder).await
    }

    async fn mark_done(&self, id: &NoteId) -> Result<Option<Note>, ApiError> {
        let builder = self.request(Method::PUT, &format!("notes/{}/done", id))?;
        self.execute(builder).await
    }

    async fn like(&self, id: &NoteId) -> Result<Option<Note>, ApiError> {
        let builder = self.request(Method::PUT, &format!("notes/{}/like", id))?;
        self.execute(builder).await
    }

    async fn dislike(&self, id: &NoteId) -> Result<Option<Note>, ApiError> {
        let builder = self.request(Method::PUT, &format!("notes/{}/dislike", id))?;
        self.execute(builder).await
    }

    async fn delete_note(&self, id: &NoteId) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &format!("notes/{}", id))?;
        let _: Option<serde_json::Value> = self.execute(builder).await?;
        Ok(())
    }
}

/// Maps a raw reply onto the client's tolerance rules.
pub fn decode_body<T: DeserializeOwned>(
    status: StatusCode,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Option<T>, ApiError> {
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(status, body),
        });
    }
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);
    if !is_json || body.iter().all(u8::is_ascii_whitespace) {
        debug!(?content_type, "reply is not json, using fallback");
        return Ok(None);
    }
    match serde_json::from_slice(body) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(error = %err, "could not parse json reply, using fallback");
            Ok(None)
        }
    }
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.trim().is_empty() {
                    return text.trim().to_string();
                }
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() && text.len() <= 200 && !text.starts_with('{') && !text.starts_with('<') {
        return text.to_string();
    }
    status.canonical_reason().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_API_URL;

    fn client(base: &str) -> ApiClient {
        let config = Config::new(base, 10, 10, None).unwrap();
        ApiClient::new(&config, Session::default()).unwrap()
    }

    #[test]
    fn endpoints_gain_api_prefix_once() {
        let api = client(DEFAULT_API_URL);
        assert_eq!(
            api.endpoint("notes").unwrap().as_str(),
            "http://localhost:8081/api/notes"
        );
        assert_eq!(
            api.endpoint("/api/notes/7/like").unwrap().as_str(),
            "http://localhost:8081/api/notes/7/like"
        );
        let api = client("http://example.com/base");
        assert_eq!(
            api.endpoint("notes").unwrap().as_str(),
            "http://example.com/base/api/notes"
        );
    }

    #[test]
    fn no_content_and_non_json_fall_back() {
        let empty: Option<Vec<Note>> = decode_body(StatusCode::NO_CONTENT, None, b"").unwrap();
        assert!(empty.is_none());
        let text: Option<Note> =
            decode_body(StatusCode::OK, Some("text/plain"), b"saved").unwrap();
        assert!(text.is_none());
        let broken: Option<Note> =
            decode_body(StatusCode::OK, Some("application/json"), b"{oops").unwrap();
        assert!(broken.is_none());
    }

    #[test]
    fn json_replies_decode() {
        let note: Option<Note> = decode_body(
            StatusCode::OK,
            Some("application/json;charset=UTF-8"),
            br#"{"id":3,"text":"hi","likes":2}"#,
        )
        .unwrap();
        let note = note.unwrap();
        assert_eq!(note.id, NoteId::Num(3));
        assert_eq!(note.likes, 2);
    }

    #[test]
    fn error_statuses_carry_a_message() {
        let err = decode_body::<Note>(
            StatusCode::BAD_REQUEST,
            Some("application/json"),
            br#"{"message":"text must not be blank"}"#,
        )
        .unwrap_err();
        assert_eq!(err.user_message(), "text must not be blank");

        let err = decode_body::<Note>(StatusCode::INTERNAL_SERVER_ERROR, None, b"").unwrap_err();
        match &err {
            ApiError::Status { status, message } => {
                assert_eq!(*status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = decode_body::<Note>(StatusCode::UNAUTHORIZED, None, b"").unwrap_err();
        assert_eq!(err.user_message(), "Authentication failed. Please log in again.");
    }

    #[test]
    fn note_lists_accept_wrapped_shapes() {
        for raw in [
            r#"[{"id":1}]"#,
            r#"{"data":[{"id":1}]}"#,
            r#"{"notes":[{"id":1}]}"#,
        ] {
            let list: NoteList = serde_json::from_str(raw).unwrap();
            assert_eq!(list.into_vec().len(), 1);
        }
    }

    #[test]
    fn a_malformed_note_does_not_hide_the_rest_of_the_board() {
        let raw = r#"{"data":[{"id":1,"text":"ok"},{"id":2,"likes":-1},{"id":"abc"}]}"#;
        let list: NoteList = serde_json::from_str(raw).unwrap();
        let notes = list.into_vec();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, NoteId::Num(1));
        assert_eq!(notes[1].id, NoteId::Text("abc".into()));
    }

    #[test]
    fn transport_errors_read_as_connectivity_problems() {
        assert_eq!(
            ApiError::Transport("refused".into()).user_message(),
            "No response from server. Please check your connection."
        );
        assert_eq!(ApiError::Timeout.user_message(), "Request timeout. Please try again.");
    }
}
