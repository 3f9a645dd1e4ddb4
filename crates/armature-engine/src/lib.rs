//! Armature engine crate.
//!
//! Rendering layer for 2D skeletal animation: a GL-like graphics context
//! abstraction with wgpu and headless backends, restorable GPU resources,
//! the polygon batcher and shape renderer, skeleton renderers, an
//! orthographic camera, input dispatch and the winit runtime.

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;
pub mod math;
pub mod render;
pub mod paint;
