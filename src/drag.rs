//! Dragging notes around the board.
//!
//! Every pointer move updates the note locally; the position is persisted
//! at most once per [`SYNC_INTERVAL`] while the drag lasts and always once
//! on release.

use crate::config::Config;
use crate::model::{NoteId, Viewport};
use crate::store::{NoteStore, Request, StoreError};
use crossterm::event::MouseEvent;
use std::time::{Duration, Instant};
use tracing::trace;

pub const NOTE_WIDTH: f64 = 150.0;
pub const NOTE_HEIGHT: f64 = 120.0;

/// Z-index a note is lifted to while it is being dragged.
pub const FRONT_Z: i32 = 1000;

pub const SYNC_INTERVAL: Duration = Duration::from_millis(250);

/// Keeps a note's top-left corner on the board.
pub fn clamp_to_viewport(viewport: Viewport, x: f64, y: f64) -> (f64, f64) {
    let max_x = (viewport.width - NOTE_WIDTH).max(0.0);
    let max_y = (viewport.height - NOTE_HEIGHT).max(0.0);
    (x.clamp(0.0, max_x), y.clamp(0.0, max_y))
}

/// Pointer position in board pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

impl Pointer {
    pub fn new(x: f64, y: f64) -> Self {
        Pointer { x, y }
    }

    pub fn from_mouse(event: &MouseEvent, config: &Config) -> Self {
        let (x, y) = config.cell_to_px(event.column, event.row);
        Pointer { x, y }
    }

    /// Multi-touch input follows the first touch point only.
    pub fn from_touches(touches: &[(f64, f64)]) -> Option<Self> {
        touches.first().map(|&(x, y)| Pointer { x, y })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        id: NoteId,
        /// Pointer position relative to the note's top-left corner.
        offset: (f64, f64),
        last_sync: Option<Instant>,
        resting_z: Option<i32>,
    },
}

#[derive(Debug, Clone)]
pub struct Drag {
    state: DragState,
    viewport: Viewport,
}

impl Drag {
    pub fn new(viewport: Viewport) -> Self {
        Drag {
            state: DragState::Idle,
            viewport,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn dragged(&self) -> Option<&NoteId> {
        match &self.state {
            DragState::Dragging { id, .. } => Some(id),
            DragState::Idle => None,
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Grabs `id` and lifts it above every other note.
    pub fn press(
        &mut self,
        store: &mut NoteStore,
        id: &NoteId,
        pointer: Pointer,
    ) -> Result<(), StoreError> {
        let note = store
            .get(id)
            .ok_or_else(|| StoreError::NoteNotFound(id.clone()))?;
        let offset = (pointer.x - note.x, pointer.y - note.y);
        let resting_z = note.z_index;
        if id.is_temporary() {
            return Err(StoreError::Unsaved(id.clone()));
        }
        store.set_z_index(id, Some(FRONT_Z))?;
        self.state = DragState::Dragging {
            id: id.clone(),
            offset,
            last_sync: None,
            resting_z,
        };
        Ok(())
    }

    /// Moves the grabbed note under the pointer. Returns a request when a
    /// throttled sync is due.
    pub fn motion(
        &mut self,
        store: &mut NoteStore,
        pointer: Pointer,
        now: Instant,
    ) -> Result<Option<Request>, StoreError> {
        let DragState::Dragging {
            id,
            offset,
            last_sync,
            ..
        } = &mut self.state
        else {
            return Ok(None);
        };
        let (x, y) = clamp_to_viewport(self.viewport, pointer.x - offset.0, pointer.y - offset.1);
        store.begin_move(id, x, y)?;
        let due = last_sync.map_or(true, |at| now.duration_since(at) >= SYNC_INTERVAL);
        if !due {
            return Ok(None);
        }
        trace!(%id, x, y, "throttled position sync");
        *last_sync = Some(now);
        store.begin_persist_position(id).map(Some)
    }

    /// Drops the note under `pointer` and returns the request persisting
    /// where it landed.
    pub fn release(
        &mut self,
        store: &mut NoteStore,
        pointer: Pointer,
    ) -> Result<Option<Request>, StoreError> {
        let DragState::Dragging {
            id,
            offset,
            resting_z,
            ..
        } = std::mem::replace(&mut self.state, DragState::Idle)
        else {
            return Ok(None);
        };
        let (x, y) = clamp_to_viewport(self.viewport, pointer.x - offset.0, pointer.y - offset.1);
        store.set_z_index(&id, resting_z)?;
        store.begin_move(&id, x, y)?;
        store.begin_persist_position(&id).map(Some)
    }

    /// Abandons the drag without persisting, e.g. when the note vanished.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}
