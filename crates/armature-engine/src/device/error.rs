use thiserror::Error;

/// Rendering error.
///
/// Every variant signals a caller-contract violation or a backend failure; the
/// current frame should stop rendering. Context loss is not an error (see
/// [`ManagedContext::restore_with`](super::ManagedContext::restore_with)).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("mesh can't store more than {capacity} {what} (requested {requested})")]
    CapacityExceeded {
        what: &'static str,
        requested: usize,
        capacity: usize,
    },
    #[error("index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: usize, vertices: usize },
    #[error("vertex data of {len} floats is not a multiple of the vertex size {stride}")]
    MisalignedVertices { len: usize, stride: usize },
    #[error("draw range {offset}..{end} exceeds the {len} available elements")]
    DrawRangeOutOfBounds { offset: usize, end: usize, len: usize },
    #[error("{0} is already drawing; call end() before begin()")]
    AlreadyDrawing(&'static str),
    #[error("{0} is not drawing; call begin() first")]
    NotDrawing(&'static str),
    #[error("no shader set")]
    NoShader,
    #[error("no texture set")]
    NoTexture,
    #[error("can't have more than {max} vertices per batch (requested {requested})")]
    BatchTooLarge { requested: usize, max: usize },
    #[error("shader attribute `{0}` not found")]
    UnknownAttribute(String),
    #[error("invalid shape: {0}")]
    InvalidShape(&'static str),
    #[error("invalid mesh layout: {0}")]
    InvalidLayout(&'static str),
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),
    #[error("failed to create {what}: {reason}")]
    ResourceCreation { what: &'static str, reason: String },
}

pub type RenderResult<T> = Result<T, RenderError>;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}
