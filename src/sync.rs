//! Runs store requests against a [`NoteApi`].

use crate::api::NoteApi;
use crate::config::Config;
use crate::drag::clamp_to_viewport;
use crate::model::{BoardScope, Note, NoteDraft, NoteId, Viewport};
use crate::store::{Completion, NoteStore, Request, StoreError};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BoardError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The request reached the server (or tried to) and failed; the store
    /// has already been rolled back.
    #[error("{0}")]
    Sync(String),
}

/// Performs the network call behind `request`.
pub async fn dispatch<A: NoteApi + Sync>(api: &A, request: Request) -> Completion {
    debug!(id = %request.id(), "{}", request.describe());
    let outcome = match &request {
        Request::Create { draft, .. } => api.create_note(draft).await,
        Request::Like { id, .. } => api.like(id).await,
        Request::Dislike { id, .. } => api.dislike(id).await,
        Request::Done { id, .. } => api.mark_done(id).await,
        Request::Purge { id, .. } => api.delete_note(id).await.map(|()| None),
        other => {
            let patch = other.patch().unwrap_or_default();
            api.update_note(other.id(), &patch).await
        }
    };
    Completion::Mutation { request, outcome }
}

/// Loads the notes for `scope`; settling the result replaces the store's
/// collection.
pub async fn fetch<A: NoteApi + Sync>(api: &A, scope: &BoardScope) -> Completion {
    Completion::Refresh(api.fetch_notes(scope).await)
}

/// A board bound to one API and scope, running each operation to
/// completion before returning.
pub struct Board<A> {
    api: A,
    scope: BoardScope,
    username: Option<String>,
    viewport: Viewport,
    store: NoteStore,
}

impl<A: NoteApi + Sync> Board<A> {
    pub fn new(api: A, scope: BoardScope, username: Option<String>, config: &Config) -> Self {
        Board {
            api,
            scope,
            username,
            viewport: config.viewport,
            store: NoteStore::new(config.note_limit),
        }
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn scope(&self) -> &BoardScope {
        &self.scope
    }

    /// Replaces the collection with the server's. Returns the note count.
    pub async fn refresh(&mut self) -> Result<usize, BoardError> {
        let completion = fetch(&self.api, &self.scope).await;
        self.settle(completion)?;
        let count = self.store.notes().count();
        info!(scope = %self.scope.label(), count, "board refreshed");
        Ok(count)
    }

    /// Creates a note at `position`, or centred on the board. Returns the
    /// note as the server confirmed it.
    pub async fn add(
        &mut self,
        text: &str,
        position: Option<(f64, f64)>,
    ) -> Result<Option<Note>, BoardError> {
        let (x, y) = position.unwrap_or_else(|| self.viewport.center_for_new_note());
        let (x, y) = clamp_to_viewport(self.viewport, x, y);
        let draft = NoteDraft::new(text.trim(), &self.scope, self.username.clone(), (x, y));
        let request = self.store.begin_create(draft, Utc::now())?;
        let slot = self.store.entries().len() - 1;
        self.run(request).await?;
        Ok(self.store.entries().get(slot).map(|e| e.note.clone()))
    }

    pub async fn move_to(&mut self, id: &NoteId, x: f64, y: f64) -> Result<(), BoardError> {
        let (x, y) = clamp_to_viewport(self.viewport, x, y);
        self.store.begin_move(id, x, y)?;
        let request = self.store.begin_persist_position(id)?;
        self.run(request).await
    }

    pub async fn like(&mut self, id: &NoteId) -> Result<(), BoardError> {
        let request = self.store.begin_like(id)?;
        self.run(request).await
    }

    pub async fn dislike(&mut self, id: &NoteId) -> Result<(), BoardError> {
        let request = self.store.begin_dislike(id)?;
        self.run(request).await
    }

    pub async fn done(&mut self, id: &NoteId) -> Result<(), BoardError> {
        let request = self.store.begin_done(id)?;
        self.run(request).await
    }

    pub async fn set_private(&mut self, id: &NoteId, is_private: bool) -> Result<(), BoardError> {
        let request = self.store.begin_set_private(id, is_private)?;
        self.run(request).await
    }

    pub async fn delete(&mut self, id: &NoteId) -> Result<(), BoardError> {
        let request = self.store.begin_delete(id)?;
        self.run(request).await
    }

    pub async fn restore(&mut self, id: &NoteId) -> Result<(), BoardError> {
        let request = self.store.begin_restore(id)?;
        self.run(request).await
    }

    pub async fn purge(&mut self, id: &NoteId) -> Result<(), BoardError> {
        let request = self.store.begin_purge(id)?;
        self.run(request).await
    }

    async fn run(&mut self, request: Request) -> Result<(), BoardError> {
        let completion = dispatch(&self.api, request).await;
        self.settle(completion)
    }

    fn settle(&mut self, completion: Completion) -> Result<(), BoardError> {
        match self.store.settle(completion) {
            None => Ok(()),
            Some(message) => Err(BoardError::Sync(message)),
        }
    }
}
