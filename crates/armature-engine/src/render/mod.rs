//! Rendering layer.
//!
//! Resources (`Shader`, `GlTexture`, `Mesh`) live on top of a
//! [`ManagedContext`](crate::device::ManagedContext) and rebuild themselves
//! after a context loss. Renderers batch geometry into meshes:
//! - `PolygonBatcher` for textured triangles, one draw per texture/blend run.
//! - `ShapeRenderer` for colored points, lines and filled shapes.
//! - `SkeletonRenderer` and `SkeletonDebugRenderer` feed skeleton attachments into those.
//! - `SceneRenderer` owns all of the above plus a camera.

mod batcher;
mod blend;
mod debug;
mod mesh;
mod scene;
mod shader;
mod shapes;
mod skeleton;
mod texture;

pub use batcher::{BatcherConfig, PolygonBatcher};
pub use blend::BlendMode;
pub use debug::{DebugBone, DebugMesh, DebugPolygon, SkeletonDebugRenderer, SkeletonDebugSource};
pub use mesh::{AttributeSemantic, DirtyRange, Mesh, VertexAttribute};
pub use scene::{ResizeMode, SceneConfig, SceneRenderer};
pub use shader::Shader;
pub use shapes::{ShapeRenderer, ShapeType};
pub use skeleton::{
    QUAD_TRIANGLES, SkeletonRenderer, SkeletonSource, SlotGeometry, SlotRange, VertexTransformer,
};
pub use texture::{GlTexture, TextureConfig, TextureRegion, premultiply};
