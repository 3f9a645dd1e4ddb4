//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, wires them to the GPU layer and
//! drives a [`CanvasApp`](crate::core::CanvasApp) through a canvas host.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
