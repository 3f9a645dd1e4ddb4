use std::any::Any;

use crate::paint::Color;

use super::error::RenderResult;

// ── handles ───────────────────────────────────────────────────────────────

/// Handle to a GPU buffer owned by a [`GraphicsContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u64);

/// Handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u64);

/// Handle to a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u64);

// ── enums ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    Triangles,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major.
    Mat2([f32; 4]),
    /// Column-major.
    Mat3([f32; 9]),
    /// Column-major.
    Mat4([f32; 16]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Separate-alpha blend function. The destination factor is shared by color and alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFactors {
    pub src_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFactors {
    /// Straight-alpha "normal" blending, the state batches start in.
    pub const DEFAULT: BlendFactors = BlendFactors {
        src_color: BlendFactor::SrcAlpha,
        src_alpha: BlendFactor::One,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
}

impl Default for BlendFactors {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
    MipMap,
    MipMapNearestNearest,
    MipMapLinearNearest,
    MipMapNearestLinear,
    MipMapLinearLinear,
}

impl TextureFilter {
    /// Whether this (minification) filter samples mipmaps.
    pub fn uses_mip_maps(self) -> bool {
        matches!(
            self,
            TextureFilter::MipMap
                | TextureFilter::MipMapNearestNearest
                | TextureFilter::MipMapLinearNearest
                | TextureFilter::MipMapNearestLinear
                | TextureFilter::MipMapLinearLinear
        )
    }

    /// Magnification never samples mipmaps; mipmap filters collapse to `Linear`.
    pub fn as_mag_filter(self) -> Self {
        if self.uses_mip_maps() { TextureFilter::Linear } else { self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    MirroredRepeat,
    ClampToEdge,
    Repeat,
}

/// Sampling parameters of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureParams {
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_u: TextureWrap,
    pub wrap_v: TextureWrap,
    pub use_mip_maps: bool,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            wrap_u: TextureWrap::ClampToEdge,
            wrap_v: TextureWrap::ClampToEdge,
            use_mip_maps: false,
        }
    }
}

// ── draw description ──────────────────────────────────────────────────────

/// One vertex attribute bound to a program location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    pub location: u32,
    /// Number of `f32` components.
    pub components: u32,
    /// Byte offset inside a vertex.
    pub offset: u64,
}

/// A single draw call over the currently bound texture and blend state.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    /// `None` issues a non-indexed draw.
    pub index_buffer: Option<BufferId>,
    pub bindings: &'a [VertexBinding],
    /// Vertex size in bytes.
    pub stride: u64,
    pub primitive: Primitive,
    /// First index (or vertex for non-indexed draws).
    pub first: u32,
    pub count: u32,
}

/// Vertex + fragment source pair handed to a backend for linking.
///
/// Sources are WGSL. The vertex source declares its inputs in a `VertexInput`
/// struct; each `@location(n) name: type` field defines an attribute location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub vertex: String,
    pub fragment: String,
}

impl ProgramSource {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Returns `(name, location)` pairs declared in the vertex `VertexInput` struct.
    pub fn vertex_inputs(&self) -> Vec<(String, u32)> {
        let Some(start) = self.vertex.find("struct VertexInput") else {
            return Vec::new();
        };
        let body = &self.vertex[start..];
        let (Some(open), Some(close)) = (body.find('{'), body.find('}')) else {
            return Vec::new();
        };
        if close < open {
            return Vec::new();
        }

        body[open + 1..close]
            .split(',')
            .filter_map(|field| {
                let field = field.trim();
                let rest = field.strip_prefix("@location(")?;
                let (loc, rest) = rest.split_once(')')?;
                let location = loc.trim().parse::<u32>().ok()?;
                let (name, _) = rest.split_once(':')?;
                Some((name.trim().to_string(), location))
            })
            .collect()
    }

    /// Whether the fragment stage samples the batch texture.
    pub fn is_textured(&self) -> bool {
        self.fragment.contains("u_texture")
    }
}

/// RGBA8 pixel data, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureImage {
    /// Returns `None` when `pixels` does not hold exactly `width * height` RGBA texels.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        (width > 0 && height > 0 && pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

// ── capability trait ──────────────────────────────────────────────────────

/// Graphics capability interface implemented once per target platform.
///
/// The surface mirrors an immediate-mode GL device: objects are addressed by
/// handles, binding state (program, texture units, blend) is global to the
/// context, and writes/draws are applied in call order.
///
/// Invalid or stale handles passed to infallible methods are ignored by the
/// backend (with a warning), the same way a GL driver ignores deleted names.
pub trait GraphicsContext: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Creates a buffer of `size` bytes with undefined contents.
    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> RenderResult<BufferId>;
    /// Writes `data` at byte `offset`. Ordered with respect to draws.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferId);

    fn create_program(&mut self, source: &ProgramSource) -> RenderResult<ProgramId>;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: Option<ProgramId>);
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32>;
    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue);

    fn create_texture(
        &mut self,
        image: &TextureImage,
        params: &TextureParams,
    ) -> RenderResult<TextureId>;
    fn set_texture_params(&mut self, texture: TextureId, params: &TextureParams);
    fn delete_texture(&mut self, texture: TextureId);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    /// `None` disables blending.
    fn set_blend(&mut self, blend: Option<BlendFactors>);
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn clear(&mut self, color: Color);

    fn draw(&mut self, call: &DrawCall<'_>);
}
