//! Authoritative in-memory note collection for one board.
//!
//! Mutations are two-phase. A `begin_*` call changes local state right
//! away and returns the [`Request`] that persists the change; once the
//! request has run, [`NoteStore::settle`] reconciles the store with the
//! server's reply or rolls the note back to the snapshot taken when the
//! request was issued. Each request is stamped with a revision, and a reply
//! whose revision is no longer the note's latest is dropped so a slow
//! server answer never overwrites a newer local edit.

use crate::api::ApiError;
use crate::model::{Note, NoteDraft, NoteId, NotePatch, DISLIKE_THRESHOLD};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

pub type Revision = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("note limit reached ({limit} active notes)")]
    NoteLimit { limit: usize },
    #[error("note not found: {0}")]
    NoteNotFound(NoteId),
    #[error("note {0} is still being saved")]
    Unsaved(NoteId),
    #[error("note {0} is neither done nor deleted")]
    NotInSubset(NoteId),
    #[error("note text is empty")]
    EmptyText,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    Synced,
    /// Draft carrying a temporary id, waiting for the server to assign one.
    PendingCreate,
    PendingUpdate {
        revision: Revision,
        snapshot: Box<Note>,
    },
    /// Permanent delete in flight; hidden from every view.
    PendingDelete {
        revision: Revision,
        snapshot: Box<Note>,
    },
}

impl SyncState {
    fn revision(&self) -> Option<Revision> {
        match self {
            SyncState::PendingUpdate { revision, .. } | SyncState::PendingDelete { revision, .. } => {
                Some(*revision)
            }
            SyncState::Synced | SyncState::PendingCreate => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub note: Note,
    pub state: SyncState,
}

/// A network call that persists an optimistic change.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Create { temp_id: NoteId, draft: NoteDraft },
    Move { id: NoteId, revision: Revision, x: f64, y: f64 },
    Like { id: NoteId, revision: Revision },
    Dislike { id: NoteId, revision: Revision },
    Done { id: NoteId, revision: Revision },
    Privacy { id: NoteId, revision: Revision, is_private: bool },
    SoftDelete { id: NoteId, revision: Revision },
    Restore { id: NoteId, revision: Revision },
    Purge { id: NoteId, revision: Revision },
}

impl Request {
    pub fn id(&self) -> &NoteId {
        match self {
            Request::Create { temp_id, .. } => temp_id,
            Request::Move { id, .. }
            | Request::Like { id, .. }
            | Request::Dislike { id, .. }
            | Request::Done { id, .. }
            | Request::Privacy { id, .. }
            | Request::SoftDelete { id, .. }
            | Request::Restore { id, .. }
            | Request::Purge { id, .. } => id,
        }
    }

    fn revision(&self) -> Option<Revision> {
        match self {
            Request::Create { .. } => None,
            Request::Move { revision, .. }
            | Request::Like { revision, .. }
            | Request::Dislike { revision, .. }
            | Request::Done { revision, .. }
            | Request::Privacy { revision, .. }
            | Request::SoftDelete { revision, .. }
            | Request::Restore { revision, .. }
            | Request::Purge { revision, .. } => Some(*revision),
        }
    }

    /// Body for requests that go through `PUT /api/notes/{id}`.
    pub fn patch(&self) -> Option<NotePatch> {
        match self {
            Request::Move { x, y, .. } => Some(NotePatch::position(*x, *y)),
            Request::Privacy { is_private, .. } => Some(NotePatch::privacy(*is_private)),
            Request::SoftDelete { .. } => Some(NotePatch::soft_delete()),
            Request::Restore { .. } => Some(NotePatch::restore()),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Request::Create { .. } => "Saving note",
            Request::Move { .. } => "Updating position",
            Request::Like { .. } => "Liking note",
            Request::Dislike { .. } => "Disliking note",
            Request::Done { .. } => "Marking note done",
            Request::Privacy { .. } => "Changing visibility",
            Request::SoftDelete { .. } => "Deleting note",
            Request::Restore { .. } => "Restoring note",
            Request::Purge { .. } => "Permanently deleting note",
        }
    }
}

/// Result of running a [`Request`] or a refresh.
#[derive(Debug)]
pub enum Completion {
    Mutation {
        request: Request,
        outcome: Result<Option<Note>, ApiError>,
    },
    Refresh(Result<Vec<Note>, ApiError>),
}

#[derive(Debug, Clone)]
pub struct NoteStore {
    entries: Vec<Entry>,
    note_limit: usize,
    last_revision: Revision,
}

impl NoteStore {
    pub fn new(note_limit: usize) -> Self {
        NoteStore {
            entries: Vec::new(),
            note_limit,
            last_revision: 0,
        }
    }

    pub fn note_limit(&self) -> usize {
        self.note_limit
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Every note a view may show, in list order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.entries
            .iter()
            .filter(|e| !matches!(e.state, SyncState::PendingDelete { .. }))
            .map(|e| &e.note)
    }

    pub fn active(&self) -> impl Iterator<Item = &Note> + '_ {
        self.notes().filter(|n| n.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn snapshot(&self) -> Vec<Note> {
        self.notes().cloned().collect()
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.entry(id).map(|e| &e.note)
    }

    pub fn entry(&self, id: &NoteId) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.note.id == id)
    }

    pub fn is_pending(&self, id: &NoteId) -> bool {
        self.entry(id)
            .map(|e| e.state != SyncState::Synced)
            .unwrap_or(false)
    }

    /// Active notes ordered back to front. Earlier notes sit on top unless
    /// a note carries an explicit z-index (e.g. while dragged).
    pub fn paint_order(&self) -> Vec<(i32, &Note)> {
        let total = self.entries.len() as i32;
        let mut layers: Vec<(i32, &Note)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !matches!(e.state, SyncState::PendingDelete { .. }))
            .filter(|(_, e)| e.note.is_active())
            .map(|(idx, e)| (e.note.z_index.unwrap_or(total - idx as i32), &e.note))
            .collect();
        layers.sort_by_key(|(z, _)| *z);
        layers
    }

    pub fn set_z_index(&mut self, id: &NoteId, z_index: Option<i32>) -> Result<(), StoreError> {
        let entry = self.entry_mut(id)?;
        entry.note.z_index = z_index;
        Ok(())
    }

    /// Replaces the collection with freshly fetched notes. Drafts still
    /// waiting for the server are kept, notes with a request in flight keep
    /// their optimistic state, and client-only z-indices survive.
    pub fn replace_all(&mut self, notes: Vec<Note>) {
        let mut previous = std::mem::take(&mut self.entries);
        let mut fresh: Vec<Entry> = Vec::with_capacity(notes.len());
        for mut note in notes {
            if fresh.iter().any(|e| e.note.id == note.id) {
                warn!(id = %note.id, "dropping duplicate note from server");
                continue;
            }
            let known = previous
                .iter()
                .position(|e| e.note.id == note.id)
                .map(|idx| previous.remove(idx));
            let entry = match known {
                Some(entry) if entry.state.revision().is_some() => {
                    debug!(id = %note.id, "keeping in-flight change over refreshed note");
                    entry
                }
                Some(entry) => {
                    note.z_index = entry.note.z_index;
                    Entry {
                        note,
                        state: SyncState::Synced,
                    }
                }
                None => Entry {
                    note,
                    state: SyncState::Synced,
                },
            };
            fresh.push(entry);
        }
        let drafts = previous
            .into_iter()
            .filter(|e| e.state == SyncState::PendingCreate);
        fresh.extend(drafts);
        info!(count = fresh.len(), "note collection replaced");
        self.entries = fresh;
    }

    pub fn begin_create(
        &mut self,
        draft: NoteDraft,
        now: DateTime<Utc>,
    ) -> Result<Request, StoreError> {
        if draft.text.trim().is_empty() {
            return Err(StoreError::EmptyText);
        }
        if self.active_count() >= self.note_limit {
            return Err(StoreError::NoteLimit {
                limit: self.note_limit,
            });
        }
        let mut temp_id = NoteId::temporary(now);
        let mut bump = 1;
        while self.entry(&temp_id).is_some() {
            temp_id = NoteId::Text(format!("{}-{}", NoteId::temporary(now), bump));
            bump += 1;
        }
        self.entries.push(Entry {
            note: draft.clone().into_note(temp_id.clone()),
            state: SyncState::PendingCreate,
        });
        debug!(id = %temp_id, "draft note added");
        Ok(Request::Create { temp_id, draft })
    }

    /// Local-only position change, applied on every pointer move. A request
    /// already in flight for the note becomes stale, so its reply cannot
    /// pull the note back to an older position.
    pub fn begin_move(&mut self, id: &NoteId, x: f64, y: f64) -> Result<(), StoreError> {
        let revision = self.last_revision + 1;
        let entry = self.saved_entry_mut(id)?;
        entry.note.x = x;
        entry.note.y = y;
        let superseded = match &mut entry.state {
            SyncState::PendingUpdate { revision: current, .. } => {
                *current = revision;
                true
            }
            _ => false,
        };
        if superseded {
            self.last_revision = revision;
        }
        Ok(())
    }

    /// Persists the note's current position.
    pub fn begin_persist_position(&mut self, id: &NoteId) -> Result<Request, StoreError> {
        let (revision, note) = self.mutate(id, |_| {})?;
        Ok(Request::Move {
            id: id.clone(),
            revision,
            x: note.x,
            y: note.y,
        })
    }

    pub fn begin_like(&mut self, id: &NoteId) -> Result<Request, StoreError> {
        let (revision, _) = self.mutate(id, |n| n.likes = n.likes.saturating_add(1))?;
        Ok(Request::Like {
            id: id.clone(),
            revision,
        })
    }

    pub fn begin_dislike(&mut self, id: &NoteId) -> Result<Request, StoreError> {
        let (revision, _) = self.mutate(id, |n| n.dislikes = n.dislikes.saturating_add(1))?;
        Ok(Request::Dislike {
            id: id.clone(),
            revision,
        })
    }

    pub fn begin_done(&mut self, id: &NoteId) -> Result<Request, StoreError> {
        let (revision, _) = self.mutate(id, |n| n.done = true)?;
        Ok(Request::Done {
            id: id.clone(),
            revision,
        })
    }

    /// Marks an active note done, or brings a done note back to the board.
    pub fn begin_toggle_done(&mut self, id: &NoteId) -> Result<Request, StoreError> {
        if self.saved_entry_mut(id)?.note.done {
            self.begin_restore(id)
        } else {
            self.begin_done(id)
        }
    }

    pub fn begin_set_private(&mut self, id: &NoteId, is_private: bool) -> Result<Request, StoreError> {
        let (revision, _) = self.mutate(id, |n| n.is_private = is_private)?;
        Ok(Request::Privacy {
            id: id.clone(),
            revision,
            is_private,
        })
    }

    /// Soft delete: the note leaves the board at once and shows up in the
    /// deleted view.
    pub fn begin_delete(&mut self, id: &NoteId) -> Result<Request, StoreError> {
        let (revision, _) = self.mutate(id, |n| n.deleted = true)?;
        Ok(Request::SoftDelete {
            id: id.clone(),
            revision,
        })
    }

    pub fn begin_restore(&mut self, id: &NoteId) -> Result<Request, StoreError> {
        self.require_archived(id)?;
        let (revision, _) = self.mutate(id, |n| {
            n.done = false;
            n.deleted = false;
        })?;
        Ok(Request::Restore {
            id: id.clone(),
            revision,
        })
    }

    /// Permanent delete of a done or deleted note. Callers confirm with the
    /// user first; there is no undo once the server accepts it.
    pub fn begin_purge(&mut self, id: &NoteId) -> Result<Request, StoreError> {
        self.require_archived(id)?;
        let revision = self.last_revision + 1;
        let entry = self.saved_entry_mut(id)?;
        let snapshot = Box::new(entry.note.clone());
        entry.state = SyncState::PendingDelete { revision, snapshot };
        self.last_revision = revision;
        Ok(Request::Purge {
            id: id.clone(),
            revision,
        })
    }

    /// Applies the outcome of a request or refresh. Returns a message for
    /// the user when something failed.
    pub fn settle(&mut self, completion: Completion) -> Option<String> {
        match completion {
            Completion::Refresh(Ok(notes)) => {
                self.replace_all(notes);
                None
            }
            Completion::Refresh(Err(err)) => {
                warn!(error = %err, "refresh failed");
                Some(format!("Failed to load notes: {}", err.user_message()))
            }
            Completion::Mutation { request, outcome } => match outcome {
                Ok(reply) => {
                    self.apply_reply(&request, reply);
                    None
                }
                Err(err) => {
                    warn!(id = %request.id(), error = %err, "{} failed", request.describe());
                    self.roll_back(&request);
                    Some(format!("{} failed: {}", request.describe(), err.user_message()))
                }
            },
        }
    }

    fn apply_reply(&mut self, request: &Request, reply: Option<Note>) {
        match request {
            Request::Create { temp_id, .. } => self.confirm_create(temp_id, reply),
            Request::Dislike { id, .. }
                if reply
                    .as_ref()
                    .map_or(true, |n| n.dislikes >= DISLIKE_THRESHOLD) =>
            {
                info!(%id, "note removed after reaching the dislike threshold");
                self.remove(id);
            }
            Request::Purge { id, .. } => {
                info!(%id, "note permanently deleted");
                self.remove(id);
            }
            _ => self.confirm_update(request, reply),
        }
    }

    fn confirm_create(&mut self, temp_id: &NoteId, reply: Option<Note>) {
        let Some(idx) = self.position(temp_id) else {
            debug!(id = %temp_id, "draft vanished before the server answered");
            return;
        };
        match reply {
            Some(mut saved) => {
                if saved.id != *temp_id && self.position(&saved.id).is_some() {
                    // A refresh already brought the saved note in.
                    self.entries.remove(idx);
                    return;
                }
                let entry = &mut self.entries[idx];
                saved.z_index = entry.note.z_index;
                debug!(temp = %temp_id, id = %saved.id, "draft confirmed");
                entry.note = saved;
                entry.state = SyncState::Synced;
            }
            None => self.entries[idx].state = SyncState::Synced,
        }
    }

    fn confirm_update(&mut self, request: &Request, reply: Option<Note>) {
        let Some(entry) = self.current_entry_mut(request) else {
            debug!(id = %request.id(), "dropping stale reply");
            return;
        };
        if let Some(mut note) = reply {
            note.z_index = entry.note.z_index;
            entry.note = note;
        }
        entry.state = SyncState::Synced;
    }

    fn roll_back(&mut self, request: &Request) {
        if let Request::Create { temp_id, .. } = request {
            self.remove(temp_id);
            return;
        }
        let Some(entry) = self.current_entry_mut(request) else {
            debug!(id = %request.id(), "newer edit owns the note, skipping rollback");
            return;
        };
        let previous = std::mem::replace(&mut entry.state, SyncState::Synced);
        if let SyncState::PendingUpdate { snapshot, .. } | SyncState::PendingDelete { snapshot, .. } =
            previous
        {
            let z_index = entry.note.z_index;
            entry.note = *snapshot;
            entry.note.z_index = z_index;
        }
    }

    /// The entry the request targets, if the request is still its latest.
    fn current_entry_mut(&mut self, request: &Request) -> Option<&mut Entry> {
        let revision = request.revision();
        self.entries
            .iter_mut()
            .find(|e| &e.note.id == request.id())
            .filter(|e| e.state.revision().is_some() && e.state.revision() == revision)
    }

    fn mutate<F>(&mut self, id: &NoteId, f: F) -> Result<(Revision, Note), StoreError>
    where
        F: FnOnce(&mut Note),
    {
        let revision = self.last_revision + 1;
        let entry = self.saved_entry_mut(id)?;
        let snapshot = Box::new(entry.note.clone());
        f(&mut entry.note);
        entry.state = SyncState::PendingUpdate { revision, snapshot };
        let note = entry.note.clone();
        self.last_revision = revision;
        Ok((revision, note))
    }

    fn require_archived(&self, id: &NoteId) -> Result<(), StoreError> {
        let note = self
            .notes()
            .find(|n| &n.id == id)
            .ok_or_else(|| StoreError::NoteNotFound(id.clone()))?;
        if note.done || note.deleted {
            Ok(())
        } else {
            Err(StoreError::NotInSubset(id.clone()))
        }
    }

    fn position(&self, id: &NoteId) -> Option<usize> {
        self.entries.iter().position(|e| &e.note.id == id)
    }

    fn remove(&mut self, id: &NoteId) {
        self.entries.retain(|e| &e.note.id != id);
    }

    fn entry_mut(&mut self, id: &NoteId) -> Result<&mut Entry, StoreError> {
        self.entries
            .iter_mut()
            .find(|e| &e.note.id == id)
            .ok_or_else(|| StoreError::NoteNotFound(id.clone()))
    }

    /// A visible note the server already knows about.
    fn saved_entry_mut(&mut self, id: &NoteId) -> Result<&mut Entry, StoreError> {
        let entry = self.entry_mut(id)?;
        match entry.state {
            SyncState::PendingCreate => Err(StoreError::Unsaved(id.clone())),
            SyncState::PendingDelete { .. } => Err(StoreError::NoteNotFound(id.clone())),
            SyncState::Synced | SyncState::PendingUpdate { .. } => Ok(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoardScope;
    use chrono::TimeZone;

    fn note(id: i64) -> Note {
        let mut note = NoteDraft::new(format!("note {}", id), &BoardScope::Main, None, (0.0, 0.0))
            .into_note(NoteId::Num(id));
        note.color = Some("#ffea5c".into());
        note
    }

    fn store_with(notes: Vec<Note>) -> NoteStore {
        let mut store = NoteStore::new(10);
        store.replace_all(notes);
        store
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn draft(text: &str) -> NoteDraft {
        NoteDraft::new(text, &BoardScope::Main, Some("ana".into()), (100.0, 80.0))
    }

    fn ok(request: Request, reply: Option<Note>) -> Completion {
        Completion::Mutation {
            request,
            outcome: Ok(reply),
        }
    }

    fn failed(request: Request) -> Completion {
        Completion::Mutation {
            request,
            outcome: Err(ApiError::Transport("connection refused".into())),
        }
    }

    #[test]
    fn create_is_rejected_at_the_limit_without_a_request() {
        let mut store = store_with((1..=10).map(note).collect());
        let before = store.snapshot();
        let err = store.begin_create(draft("one too many"), now()).unwrap_err();
        assert_eq!(err, StoreError::NoteLimit { limit: 10 });
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn done_and_deleted_notes_do_not_count_toward_the_limit() {
        let mut notes: Vec<Note> = (1..=10).map(note).collect();
        notes[0].done = true;
        notes[1].deleted = true;
        let mut store = store_with(notes);
        assert_eq!(store.active_count(), 8);
        assert!(store.begin_create(draft("fits"), now()).is_ok());
    }

    #[test]
    fn create_replaces_draft_with_server_note() {
        let mut store = store_with(vec![]);
        let request = store.begin_create(draft("hello"), now()).unwrap();
        let temp_id = request.id().clone();
        assert!(temp_id.is_temporary());
        assert_eq!(store.entry(&temp_id).unwrap().state, SyncState::PendingCreate);
        store.set_z_index(&temp_id, Some(7)).unwrap();

        let mut saved = note(99);
        saved.text = "hello".into();
        assert!(store.settle(ok(request, Some(saved))).is_none());

        assert!(store.get(&temp_id).is_none());
        let entry = store.entry(&NoteId::Num(99)).unwrap();
        assert_eq!(entry.state, SyncState::Synced);
        assert_eq!(entry.note.z_index, Some(7));
    }

    #[test]
    fn create_without_body_keeps_the_draft() {
        let mut store = store_with(vec![]);
        let request = store.begin_create(draft("hello"), now()).unwrap();
        let temp_id = request.id().clone();
        store.settle(ok(request, None));
        let entry = store.entry(&temp_id).unwrap();
        assert_eq!(entry.state, SyncState::Synced);
        assert_eq!(entry.note.text, "hello");
    }

    #[test]
    fn failed_create_removes_the_draft_and_reports() {
        let mut store = store_with(vec![note(1)]);
        let request = store.begin_create(draft("hello"), now()).unwrap();
        let message = store.settle(failed(request)).unwrap();
        assert!(message.starts_with("Saving note failed"));
        assert_eq!(store.snapshot(), vec![note(1)]);
    }

    #[test]
    fn blank_text_is_rejected() {
        let mut store = store_with(vec![]);
        assert_eq!(
            store.begin_create(draft("   "), now()).unwrap_err(),
            StoreError::EmptyText
        );
    }

    #[test]
    fn temp_ids_stay_unique_within_one_millisecond() {
        let mut store = store_with(vec![]);
        let a = store.begin_create(draft("a"), now()).unwrap();
        let b = store.begin_create(draft("b"), now()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn pending_drafts_cannot_be_mutated() {
        let mut store = store_with(vec![]);
        let request = store.begin_create(draft("a"), now()).unwrap();
        let id = request.id().clone();
        assert_eq!(store.begin_like(&id).unwrap_err(), StoreError::Unsaved(id.clone()));
        assert_eq!(
            store.begin_move(&id, 1.0, 1.0).unwrap_err(),
            StoreError::Unsaved(id)
        );
    }

    #[test]
    fn like_adopts_server_counters() {
        let mut store = store_with(vec![note(1)]);
        let request = store.begin_like(&NoteId::Num(1)).unwrap();
        assert_eq!(store.get(&NoteId::Num(1)).unwrap().likes, 1);
        let mut reply = note(1);
        reply.likes = 4;
        store.settle(ok(request, Some(reply)));
        assert_eq!(store.get(&NoteId::Num(1)).unwrap().likes, 4);
        assert!(!store.is_pending(&NoteId::Num(1)));
    }

    #[test]
    fn failed_like_rolls_back() {
        let mut store = store_with(vec![note(1)]);
        let request = store.begin_like(&NoteId::Num(1)).unwrap();
        let message = store.settle(failed(request));
        assert!(message.is_some());
        assert_eq!(store.get(&NoteId::Num(1)).unwrap().likes, 0);
        assert!(!store.is_pending(&NoteId::Num(1)));
    }

    #[test]
    fn dislike_without_body_removes_the_note() {
        let mut store = store_with(vec![note(1), note(2)]);
        let request = store.begin_dislike(&NoteId::Num(1)).unwrap();
        store.settle(ok(request, None));
        assert!(store.get(&NoteId::Num(1)).is_none());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn dislike_reaching_threshold_removes_the_note() {
        let mut store = store_with(vec![note(1)]);
        let request = store.begin_dislike(&NoteId::Num(1)).unwrap();
        let mut reply = note(1);
        reply.dislikes = DISLIKE_THRESHOLD;
        store.settle(ok(request, Some(reply)));
        assert!(store.get(&NoteId::Num(1)).is_none());
    }

    #[test]
    fn dislike_below_threshold_keeps_the_note() {
        let mut store = store_with(vec![note(1)]);
        let request = store.begin_dislike(&NoteId::Num(1)).unwrap();
        let mut reply = note(1);
        reply.dislikes = DISLIKE_THRESHOLD - 1;
        store.settle(ok(request, Some(reply)));
        assert_eq!(
            store.get(&NoteId::Num(1)).unwrap().dislikes,
            DISLIKE_THRESHOLD - 1
        );
    }

    #[test]
    fn failed_soft_delete_restores_the_collection() {
        let mut store = store_with(vec![note(1), note(2), note(3)]);
        let before = store.snapshot();
        let request = store.begin_delete(&NoteId::Num(2)).unwrap();
        assert_eq!(store.active_count(), 2);
        let message = store.settle(failed(request)).unwrap();
        assert!(message.starts_with("Deleting note failed"));
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.active_count(), 3);
    }

    #[test]
    fn stale_replies_do_not_clobber_newer_edits() {
        let mut store = store_with(vec![note(1)]);
        let id = NoteId::Num(1);
        let first = store.begin_like(&id).unwrap();
        let second = store.begin_like(&id).unwrap();

        let mut stale = note(1);
        stale.likes = 1;
        store.settle(ok(first, Some(stale)));
        assert_eq!(store.get(&id).unwrap().likes, 2);
        assert!(store.is_pending(&id));

        let mut fresh = note(1);
        fresh.likes = 2;
        store.settle(ok(second, Some(fresh)));
        assert_eq!(store.get(&id).unwrap().likes, 2);
        assert!(!store.is_pending(&id));
    }

    #[test]
    fn stale_failures_do_not_roll_back_newer_edits() {
        let mut store = store_with(vec![note(1)]);
        let id = NoteId::Num(1);
        let first = store.begin_like(&id).unwrap();
        let _second = store.begin_like(&id).unwrap();
        store.settle(failed(first));
        assert_eq!(store.get(&id).unwrap().likes, 2);
    }

    #[test]
    fn toggling_done_moves_notes_between_board_and_archive() {
        let mut store = store_with(vec![note(1)]);
        let id = NoteId::Num(1);
        let request = store.begin_toggle_done(&id).unwrap();
        assert!(matches!(request, Request::Done { .. }));
        assert_eq!(store.active_count(), 0);
        store.settle(ok(request, None));

        let request = store.begin_toggle_done(&id).unwrap();
        assert!(matches!(request, Request::Restore { .. }));
        assert_eq!(request.patch(), Some(NotePatch::restore()));
        store.settle(ok(request, None));
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn restore_and_purge_only_touch_archived_notes() {
        let mut store = store_with(vec![note(1)]);
        let id = NoteId::Num(1);
        assert_eq!(
            store.begin_purge(&id).unwrap_err(),
            StoreError::NotInSubset(id.clone())
        );
        assert_eq!(
            store.begin_restore(&id).unwrap_err(),
            StoreError::NotInSubset(id.clone())
        );
    }

    #[test]
    fn purge_hides_then_removes() {
        let mut deleted = note(1);
        deleted.deleted = true;
        let mut store = store_with(vec![deleted.clone()]);
        let id = NoteId::Num(1);
        let request = store.begin_purge(&id).unwrap();
        assert_eq!(store.notes().count(), 0);
        store.settle(ok(request, None));
        assert!(store.entry(&id).is_none());

        let mut store = store_with(vec![deleted.clone()]);
        let request = store.begin_purge(&id).unwrap();
        store.settle(failed(request));
        assert_eq!(store.snapshot(), vec![deleted]);
    }

    #[test]
    fn moves_are_local_until_persisted() {
        let mut store = store_with(vec![note(1)]);
        let id = NoteId::Num(1);
        store.begin_move(&id, 30.0, 40.0).unwrap();
        assert!(!store.is_pending(&id));
        let request = store.begin_persist_position(&id).unwrap();
        match &request {
            Request::Move { x, y, .. } => assert_eq!((*x, *y), (30.0, 40.0)),
            other => panic!("unexpected request {other:?}"),
        }
        assert_eq!(request.patch(), Some(NotePatch::position(30.0, 40.0)));
        store.settle(ok(request, None));
        assert_eq!(store.get(&id).unwrap().x, 30.0);
    }

    #[test]
    fn refresh_keeps_drafts_and_dedupes() {
        let mut store = store_with(vec![note(1)]);
        let request = store.begin_create(draft("draft"), now()).unwrap();
        store.settle(Completion::Refresh(Ok(vec![note(2), note(2), note(3)])));
        let ids: Vec<String> = store.notes().map(|n| n.id.to_string()).collect();
        assert_eq!(ids, vec!["2".to_string(), "3".into(), request.id().to_string()]);
    }

    #[test]
    fn refresh_during_soft_delete_keeps_the_pending_change() {
        let mut store = store_with(vec![note(1), note(2)]);
        let id = NoteId::Num(1);
        let request = store.begin_delete(&id).unwrap();

        store.settle(Completion::Refresh(Ok(vec![note(1), note(2)])));
        assert!(store.get(&id).unwrap().deleted);
        assert!(store.is_pending(&id));

        let mut confirmed = note(1);
        confirmed.deleted = true;
        assert!(store.settle(ok(request, Some(confirmed))).is_none());
        assert!(store.get(&id).unwrap().deleted);
        assert!(!store.is_pending(&id));
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn refresh_during_like_still_rolls_back_on_failure() {
        let mut store = store_with(vec![note(1)]);
        let id = NoteId::Num(1);
        let request = store.begin_like(&id).unwrap();
        store.settle(Completion::Refresh(Ok(vec![note(1)])));
        assert_eq!(store.get(&id).unwrap().likes, 1);

        assert!(store.settle(failed(request)).is_some());
        assert_eq!(store.get(&id).unwrap().likes, 0);
        assert!(!store.is_pending(&id));
    }

    #[test]
    fn local_moves_outdate_replies_already_in_flight() {
        let mut store = store_with(vec![note(1)]);
        let id = NoteId::Num(1);
        store.begin_move(&id, 10.0, 0.0).unwrap();
        let first = store.begin_persist_position(&id).unwrap();
        store.begin_move(&id, 300.0, 0.0).unwrap();

        let mut old = note(1);
        old.x = 10.0;
        store.settle(ok(first, Some(old)));
        assert_eq!(store.get(&id).unwrap().x, 300.0);
        assert!(store.is_pending(&id));
    }

    #[test]
    fn empty_refresh_clears_without_error() {
        let mut store = store_with(vec![note(1), note(2)]);
        assert!(store.settle(Completion::Refresh(Ok(vec![]))).is_none());
        assert_eq!(store.notes().count(), 0);
    }

    #[test]
    fn failed_refresh_keeps_notes_and_reports() {
        let mut store = store_with(vec![note(1)]);
        let message = store
            .settle(Completion::Refresh(Err(ApiError::Timeout)))
            .unwrap();
        assert!(message.contains("Request timeout"));
        assert_eq!(store.notes().count(), 1);
    }

    #[test]
    fn paint_order_puts_earlier_notes_on_top_unless_lifted() {
        let mut store = store_with(vec![note(1), note(2), note(3)]);
        let order: Vec<i64> = store
            .paint_order()
            .iter()
            .map(|(_, n)| match n.id {
                NoteId::Num(v) => v,
                _ => 0,
            })
            .collect();
        assert_eq!(order, vec![3, 2, 1]);

        store.set_z_index(&NoteId::Num(3), Some(i32::MAX)).unwrap();
        let top = store.paint_order().last().map(|(_, n)| n.id.clone());
        assert_eq!(top, Some(NoteId::Num(3)));
    }
}
