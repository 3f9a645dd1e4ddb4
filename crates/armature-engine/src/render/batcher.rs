use std::rc::Rc;

use crate::device::{
    BlendFactors, ManagedContext, Primitive, RenderError, RenderResult, Restorable, RestorableId,
};

use super::blend::BlendMode;
use super::mesh::{Mesh, VertexAttribute};
use super::shader::Shader;
use super::texture::GlTexture;

/// Batcher sizing and vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatcherConfig {
    /// Adds a second (dark) color per vertex.
    pub two_color_tint: bool,
    /// Vertex capacity per flush, at most [`PolygonBatcher::MAX_VERTICES`].
    pub max_vertices: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            two_color_tint: true,
            max_vertices: PolygonBatcher::MAX_VERTICES,
        }
    }
}

/// Greedy run-length batcher of textured triangles.
///
/// Consecutive draws sharing a texture and blend function are appended to one
/// mesh and submitted as a single draw call. Draw order is preserved; nothing
/// is reordered across a texture or blend change.
pub struct PolygonBatcher {
    mesh: Mesh,
    two_color_tint: bool,

    drawing: bool,
    shader: Option<Rc<Shader>>,
    last_texture: Option<RestorableId>,
    blend: BlendFactors,

    vertices_len: usize,
    indices_len: usize,
    scratch: Vec<u16>,

    draw_calls: usize,
    total_draw_calls: usize,
}

impl PolygonBatcher {
    /// Largest vertex capacity: `max * 3` indices must stay addressable by `u16`.
    pub const MAX_VERTICES: usize = 10920;

    pub fn new(ctx: &mut ManagedContext, config: BatcherConfig) -> RenderResult<Self> {
        if config.max_vertices > Self::MAX_VERTICES {
            return Err(RenderError::BatchTooLarge {
                requested: config.max_vertices,
                max: Self::MAX_VERTICES,
            });
        }

        let mut attributes = vec![
            VertexAttribute::position2(),
            VertexAttribute::color(),
            VertexAttribute::tex_coord(0),
        ];
        if config.two_color_tint {
            attributes.push(VertexAttribute::color2());
        }
        let mesh = Mesh::new(ctx, attributes, config.max_vertices, config.max_vertices * 3)?;

        Ok(Self {
            mesh,
            two_color_tint: config.two_color_tint,
            drawing: false,
            shader: None,
            last_texture: None,
            blend: BlendFactors::DEFAULT,
            vertices_len: 0,
            indices_len: 0,
            scratch: Vec::new(),
            draw_calls: 0,
            total_draw_calls: 0,
        })
    }

    pub fn begin(&mut self, ctx: &mut ManagedContext, shader: Rc<Shader>) -> RenderResult<()> {
        if self.drawing {
            return Err(RenderError::AlreadyDrawing("PolygonBatcher"));
        }
        self.draw_calls = 0;
        self.shader = Some(shader);
        self.last_texture = None;
        self.drawing = true;

        ctx.gl().set_blend(Some(self.blend));
        Ok(())
    }

    /// Switches the blend function, flushing pending geometry when it changes mid-session.
    pub fn set_blend_mode(
        &mut self,
        ctx: &mut ManagedContext,
        mode: BlendMode,
        premultiplied_alpha: bool,
    ) -> RenderResult<()> {
        let blend = mode.factors(premultiplied_alpha);
        if blend == self.blend {
            return Ok(());
        }
        self.blend = blend;
        if self.drawing {
            self.flush(ctx)?;
            ctx.gl().set_blend(Some(blend));
        }
        Ok(())
    }

    /// Appends one primitive. `vertices` is interleaved in this batcher's
    /// layout; `indices` are local to `vertices`.
    pub fn draw(
        &mut self,
        ctx: &mut ManagedContext,
        texture: &GlTexture,
        vertices: &[f32],
        indices: &[u16],
    ) -> RenderResult<()> {
        if !self.drawing {
            return Err(RenderError::NotDrawing("PolygonBatcher"));
        }

        let stride = self.mesh.stride();
        if vertices.len() % stride != 0 {
            return Err(RenderError::MisalignedVertices {
                len: vertices.len(),
                stride,
            });
        }
        let count = vertices.len() / stride;
        if count > self.mesh.max_vertices() {
            return Err(RenderError::CapacityExceeded {
                what: "vertices",
                requested: count,
                capacity: self.mesh.max_vertices(),
            });
        }
        if indices.len() > self.mesh.max_indices() {
            return Err(RenderError::CapacityExceeded {
                what: "indices",
                requested: indices.len(),
                capacity: self.mesh.max_indices(),
            });
        }
        if let Some(&i) = indices.iter().find(|&&i| i as usize >= count) {
            return Err(RenderError::IndexOutOfRange {
                index: i as usize,
                vertices: count,
            });
        }

        if self.last_texture != Some(texture.key()) {
            self.flush(ctx)?;
            texture.bind(ctx, 0)?;
            self.last_texture = Some(texture.key());
        } else if self.vertices_len + vertices.len() > self.mesh.max_vertices() * stride
            || self.indices_len + indices.len() > self.mesh.max_indices()
        {
            self.flush(ctx)?;
        }

        let index_start = (self.vertices_len / stride) as u16;
        self.mesh.write_vertices(self.vertices_len, vertices)?;
        self.vertices_len += vertices.len();

        self.scratch.clear();
        self.scratch.extend(indices.iter().map(|&i| i + index_start));
        self.mesh.write_indices(self.indices_len, &self.scratch)?;
        self.indices_len += indices.len();
        Ok(())
    }

    /// Submits pending geometry as one draw call.
    pub fn flush(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        if self.vertices_len == 0 {
            return Ok(());
        }
        if self.last_texture.is_none() {
            return Err(RenderError::NoTexture);
        }
        let Some(shader) = self.shader.as_ref() else {
            return Err(RenderError::NoShader);
        };

        self.mesh.draw(ctx, shader, Primitive::Triangles)?;
        log::trace!(
            "batch flush: {} vertices, {} indices",
            self.vertices_len / self.mesh.stride(),
            self.indices_len
        );

        self.vertices_len = 0;
        self.indices_len = 0;
        self.mesh.set_vertices_length(0)?;
        self.mesh.set_indices_length(0)?;
        self.draw_calls += 1;
        self.total_draw_calls += 1;
        Ok(())
    }

    /// Flushes and closes the session; blending is disabled afterwards.
    pub fn end(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        if !self.drawing {
            return Err(RenderError::NotDrawing("PolygonBatcher"));
        }
        let flushed = self.flush(ctx);
        if flushed.is_err() {
            // Drop what could not be drawn so the next session starts empty.
            self.vertices_len = 0;
            self.indices_len = 0;
            self.mesh.set_vertices_length(0)?;
            self.mesh.set_indices_length(0)?;
        }

        self.shader = None;
        self.last_texture = None;
        self.drawing = false;
        ctx.gl().set_blend(None);
        flushed
    }

    #[inline]
    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Draw calls issued in the current (or last) session.
    #[inline]
    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// Returns and resets the draw calls counted since the last call.
    pub fn take_total_draw_calls(&mut self) -> usize {
        std::mem::take(&mut self.total_draw_calls)
    }

    pub fn two_color_tint(&self) -> bool {
        self.two_color_tint
    }

    /// Floats per vertex expected by [`draw`](Self::draw).
    pub fn vertex_size(&self) -> usize {
        self.mesh.stride()
    }

    pub fn blend_factors(&self) -> BlendFactors {
        self.blend
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn dispose(&mut self, ctx: &mut ManagedContext) {
        self.mesh.dispose(ctx);
    }
}

impl Restorable for PolygonBatcher {
    fn restore(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        self.mesh.restore(ctx)
    }
}
