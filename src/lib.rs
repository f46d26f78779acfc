//! Client for a shared sticky-note board served over REST.
//!
//! [`store::NoteStore`] keeps the board's notes and applies every change
//! optimistically; [`sync`] runs the matching network calls through an
//! [`api::NoteApi`] and feeds the outcome back.

pub mod api;
pub mod config;
pub mod drag;
pub mod model;
pub mod storage;
pub mod store;
pub mod sync;
pub mod theme;
pub mod views;
