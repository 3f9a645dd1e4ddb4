//! Graphics device layer.
//!
//! - [`GraphicsContext`]: GL-like capability trait every renderer draws through
//! - [`ManagedContext`]: owns the active backend plus the restorable registry
//! - [`WgpuContext`] / [`HeadlessContext`]: windowed and in-memory backends
//! - [`Gpu`]: wgpu instance/device/surface bootstrap for a window

mod context;
mod error;
mod frame;
mod gpu;
mod headless;
mod init;
mod managed;
mod surface;
mod wgpu_context;

pub use context::{
    BlendFactor, BlendFactors, BufferId, BufferKind, DrawCall, GraphicsContext, Primitive,
    ProgramId, ProgramSource, TextureFilter, TextureId, TextureImage, TextureParams, TextureWrap,
    UniformValue, VertexBinding,
};
pub use error::{RenderError, RenderResult, SurfaceErrorAction};
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use headless::{DrawRecord, GlCommand, HeadlessContext};
pub use init::GpuInit;
pub use managed::{ManagedContext, Restorable, RestorableId};
pub use wgpu_context::WgpuContext;
