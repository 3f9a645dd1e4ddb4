//! Camera and projection math.
//!
//! World space is y-up with the camera looking down -Z. Screen space is in
//! physical pixels with a top-left origin.

mod camera;

pub use camera::OrthoCamera;
