//! Window-system-independent input.
//!
//! The desktop app translates native events into [`InputState`] calls; the
//! renderer and camera read the snapshot and the [`Action`]s derived from it,
//! never raw events.
//!
//! # Invariants
//! - A key is "pressed" only on the frame its state went from up to down.
//! - Mouse delta accumulates within a frame and resets in [`InputState::end_frame`].

pub mod action;
pub mod state;

pub use action::{Action, Bindings};
pub use state::{InputState, Key, MouseButton};
