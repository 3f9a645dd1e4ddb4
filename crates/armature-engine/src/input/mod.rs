//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! Runtime code translates platform events into `InputEvent`s and feeds them
//! to [`Input::handle`], which updates pointer/touch state and notifies the
//! registered [`InputListener`]s.

mod dispatch;
mod listener;
mod types;

pub mod platform {
    pub mod winit;
}

pub use dispatch::Input;
pub use listener::{InputListener, ListenerId};
pub use types::{InputEvent, Touch, TouchPoint};
