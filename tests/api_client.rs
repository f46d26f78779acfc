mod common;

use common::spawn_backend;
use serde_json::json;
use stickyboard::api::{ApiClient, ApiError, NoteApi};
use stickyboard::config::Config;
use stickyboard::model::{BoardScope, NoteId};
use stickyboard::storage::Session;
use stickyboard::sync::{Board, BoardError};

fn config(base: &str) -> Config {
    Config::new(base, 5, 10, None).unwrap()
}

fn board(base: &str, session: Session) -> Board<ApiClient> {
    let config = config(base);
    let username = session.username.clone();
    let api = ApiClient::new(&config, session).unwrap();
    Board::new(api, BoardScope::Main, username, &config)
}

#[tokio::test]
async fn login_token_is_sent_as_bearer_auth() {
    let (base, backend) = spawn_backend().await;
    let anonymous = ApiClient::new(&config(&base), Session::default()).unwrap();
    let session = anonymous.login("ana", "secret").await.unwrap();
    assert_eq!(session, Session::new("tok-123", "ana"));

    let api = ApiClient::new(&config(&base), session).unwrap();
    api.fetch_notes(&BoardScope::Main).await.unwrap();
    let seen = backend.db.lock().unwrap().auth_headers.clone();
    assert_eq!(seen, vec!["Bearer tok-123".to_string()]);
}

#[tokio::test]
async fn login_failures_are_reported() {
    let (base, _backend) = spawn_backend().await;
    let api = ApiClient::new(&config(&base), Session::default()).unwrap();

    let err = api.login("ana", "nope").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 401, .. }));
    assert_eq!(err.user_message(), "Authentication failed. Please log in again.");

    let err = api.login("ana", "tokenless").await.unwrap_err();
    assert!(matches!(err, ApiError::MissingToken));
}

#[tokio::test]
async fn empty_board_answers_no_content() {
    let (base, _backend) = spawn_backend().await;
    let mut board = board(&base, Session::default());
    assert_eq!(board.refresh().await.unwrap(), 0);
}

#[tokio::test]
async fn note_lifecycle_round_trips_through_the_service() {
    let (base, backend) = spawn_backend().await;
    let mut board = board(&base, Session::new("tok-123", "ana"));

    let saved = board.add("ship it!", Some((40.0, 60.0))).await.unwrap().unwrap();
    assert_eq!(saved.id, NoteId::Num(1));
    assert_eq!(saved.username.as_deref(), Some("ana"));
    assert!(saved.created_at.is_some());
    let id = saved.id.clone();

    board.like(&id).await.unwrap();
    assert_eq!(board.store().get(&id).unwrap().likes, 1);

    board.move_to(&id, 300.0, 200.0).await.unwrap();
    assert_eq!(backend.notes()[0]["x"], json!(300.0));

    // The done endpoint answers with plain text; the optimistic state stays.
    board.done(&id).await.unwrap();
    assert!(board.store().get(&id).unwrap().done);
    assert_eq!(backend.notes()[0]["done"], json!(true));

    board.restore(&id).await.unwrap();
    board.delete(&id).await.unwrap();
    assert!(board.store().get(&id).unwrap().deleted);
    assert!(board.store().get(&id).unwrap().updated_at.is_some());

    board.purge(&id).await.unwrap();
    assert!(board.store().get(&id).is_none());
    assert!(backend.notes().is_empty());
}

#[tokio::test]
async fn dislike_threshold_removes_the_note() {
    let (base, backend) = spawn_backend().await;
    backend.seed(vec![
        json!({"id": 1, "text": "meh", "dislikes": 19}),
        json!({"id": 2, "text": "fine"}),
    ]);
    let mut board = board(&base, Session::default());
    board.refresh().await.unwrap();
    board.dislike(&NoteId::Num(1)).await.unwrap();
    assert!(board.store().get(&NoteId::Num(1)).is_none());
    assert_eq!(backend.notes().len(), 1);
}

#[tokio::test]
async fn failed_like_rolls_back_with_the_server_message() {
    let (base, backend) = spawn_backend().await;
    backend.seed(vec![json!({"id": 1, "text": "hi", "likes": 2})]);
    backend.db.lock().unwrap().fail_likes = true;
    let mut board = board(&base, Session::default());
    board.refresh().await.unwrap();

    let err = board.like(&NoteId::Num(1)).await.unwrap_err();
    assert!(matches!(err, BoardError::Sync(_)));
    assert_eq!(err.to_string(), "Liking note failed: database down");
    assert_eq!(board.store().get(&NoteId::Num(1)).unwrap().likes, 2);
}

#[tokio::test]
async fn profile_scope_filters_by_privacy() {
    let (base, backend) = spawn_backend().await;
    backend.seed(vec![
        json!({"id": 1, "text": "diary", "username": "ana", "isPrivate": true}),
        json!({"id": 2, "text": "hello", "username": "ana", "isPrivate": false}),
        json!({"id": 3, "text": "other", "username": "bo", "isPrivate": true}),
    ]);
    let api = ApiClient::new(&config(&base), Session::default()).unwrap();

    let private = BoardScope::Profile {
        username: "ana".into(),
        private: Some(true),
    };
    let notes = api.fetch_notes(&private).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, NoteId::Num(1));

    let all = BoardScope::Profile {
        username: "ana".into(),
        private: None,
    };
    assert_eq!(api.fetch_notes(&all).await.unwrap().len(), 2);
}

#[tokio::test]
async fn missing_note_surfaces_a_not_found_message() {
    let (base, _backend) = spawn_backend().await;
    let api = ApiClient::new(&config(&base), Session::default()).unwrap();
    let err = api.like(&NoteId::Num(42)).await.unwrap_err();
    assert_eq!(err.user_message(), "Note not found");
}

#[tokio::test]
async fn unreachable_server_reads_as_a_connection_problem() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let mut board = board(&format!("http://{}", address), Session::default());
    let err = board.refresh().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to load notes: No response from server. Please check your connection."
    );
}
