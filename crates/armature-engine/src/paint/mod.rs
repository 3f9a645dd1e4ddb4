//! Paint model shared between renderers.
//!
//! Colors are stored straight-alpha; renderers premultiply when they write
//! vertex data and the batch is configured for premultiplied textures.

pub mod color;

pub use color::Color;
