#![allow(dead_code)]

//! In-process stand-in for the note service.

use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
pub struct Db {
    pub notes: Vec<Value>,
    pub next_id: i64,
    pub auth_headers: Vec<String>,
    pub fail_likes: bool,
}

#[derive(Clone, Default)]
pub struct Backend {
    pub db: Arc<Mutex<Db>>,
}

impl Backend {
    pub fn seed(&self, notes: Vec<Value>) {
        let mut db = self.db.lock().unwrap();
        db.next_id = notes.len() as i64;
        db.notes = notes;
    }

    pub fn notes(&self) -> Vec<Value> {
        self.db.lock().unwrap().notes.clone()
    }

    fn record(&self, headers: &HeaderMap) {
        if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            self.db.lock().unwrap().auth_headers.push(value.to_string());
        }
    }
}

/// Starts the fake service on a free port and returns its base URL.
pub async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/notes", get(list_notes).post(create_note))
        .route("/api/notes/profile/{username}", get(profile_notes))
        .route("/api/notes/{id}", put(update_note).delete(delete_note))
        .route("/api/notes/{id}/like", put(like))
        .route("/api/notes/{id}/dislike", put(dislike))
        .route("/api/notes/{id}/done", put(done))
        .with_state(backend.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", address), backend)
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": "Note not found"})),
    )
        .into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default().to_string();
    match body["password"].as_str() {
        Some("secret") => Json(json!({"token": "tok-123", "username": username})).into_response(),
        Some("tokenless") => Json(json!({"username": username})).into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid credentials"})),
        )
            .into_response(),
    }
}

async fn list_notes(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.record(&headers);
    let db = backend.db.lock().unwrap();
    if db.notes.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(db.notes.clone()).into_response()
}

async fn profile_notes(
    State(backend): State<Backend>,
    Path(username): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let wanted = params.get("isPrivate").map(|v| v == "true");
    let db = backend.db.lock().unwrap();
    let notes: Vec<Value> = db
        .notes
        .iter()
        .filter(|n| n["username"] == username.as_str())
        .filter(|n| wanted.map_or(true, |flag| n["isPrivate"] == flag))
        .cloned()
        .collect();
    Json(json!({"data": notes})).into_response()
}

async fn create_note(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    backend.record(&headers);
    let mut db = backend.db.lock().unwrap();
    db.next_id += 1;
    body["id"] = json!(db.next_id);
    body["createdAt"] = json!("2024-05-01T10:00:00");
    db.notes.push(body.clone());
    Json(body).into_response()
}

fn edit<F: FnOnce(&mut Value)>(backend: &Backend, id: i64, f: F) -> Option<Value> {
    let mut db = backend.db.lock().unwrap();
    let note = db.notes.iter_mut().find(|n| n["id"] == id)?;
    f(note);
    Some(note.clone())
}

async fn update_note(
    State(backend): State<Backend>,
    Path(id): Path<i64>,
    Json(patch): Json<Value>,
) -> Response {
    let updated = edit(&backend, id, |note| {
        if let Some(fields) = patch.as_object() {
            for (key, value) in fields {
                note[key] = value.clone();
            }
        }
        note["updatedAt"] = json!("2024-05-02T09:30:00");
    });
    match updated {
        Some(note) => Json(note).into_response(),
        None => not_found(),
    }
}

async fn like(State(backend): State<Backend>, Path(id): Path<i64>) -> Response {
    if backend.db.lock().unwrap().fail_likes {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "database down"})),
        )
            .into_response();
    }
    match edit(&backend, id, |n| n["likes"] = json!(n["likes"].as_u64().unwrap_or(0) + 1)) {
        Some(note) => Json(note).into_response(),
        None => not_found(),
    }
}

async fn dislike(State(backend): State<Backend>, Path(id): Path<i64>) -> Response {
    let Some(note) = edit(&backend, id, |n| {
        n["dislikes"] = json!(n["dislikes"].as_u64().unwrap_or(0) + 1)
    }) else {
        return not_found();
    };
    if note["dislikes"].as_u64().unwrap_or(0) >= 20 {
        backend.db.lock().unwrap().notes.retain(|n| n["id"] != id);
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(note).into_response()
}

async fn done(State(backend): State<Backend>, Path(id): Path<i64>) -> Response {
    match edit(&backend, id, |n| n["done"] = json!(true)) {
        Some(_) => ([(CONTENT_TYPE, "text/plain")], "Note marked as done").into_response(),
        None => not_found(),
    }
}

async fn delete_note(State(backend): State<Backend>, Path(id): Path<i64>) -> Response {
    let mut db = backend.db.lock().unwrap();
    let before = db.notes.len();
    db.notes.retain(|n| n["id"] != id);
    if db.notes.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}
