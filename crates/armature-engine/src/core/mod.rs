//! Application-facing contracts.
//!
//! [`CanvasApp`] is what an application implements; [`Canvas`] is the bundle
//! of context, renderer, input and timing it receives; [`CanvasHost`] drives
//! the lifecycle (load, initialize, update/render, dispose) independently of
//! the window system so it runs headless as well.

mod app;
mod canvas;

pub use app::CanvasApp;
pub use canvas::{Canvas, CanvasHost, CanvasState};
