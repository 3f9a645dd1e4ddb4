use std::ops::Range;

use crate::device::{
    BufferId, BufferKind, DrawCall, ManagedContext, Primitive, RenderError, RenderResult,
    Restorable, RestorableId, VertexBinding,
};

use super::shader::Shader;

/// What a vertex attribute carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    Position,
    Color,
    TexCoord,
}

/// One named `f32` attribute in an interleaved vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub name: String,
    pub semantic: AttributeSemantic,
    pub components: usize,
}

impl VertexAttribute {
    pub fn new(name: impl Into<String>, semantic: AttributeSemantic, components: usize) -> Self {
        Self {
            name: name.into(),
            semantic,
            components,
        }
    }

    pub fn position2() -> Self {
        Self::new(Shader::POSITION, AttributeSemantic::Position, 2)
    }

    pub fn position3() -> Self {
        Self::new(Shader::POSITION, AttributeSemantic::Position, 3)
    }

    /// `a_texCoords` for unit 0, `a_texCoords{unit}` otherwise.
    pub fn tex_coord(unit: u32) -> Self {
        let name = if unit == 0 {
            Shader::TEXCOORDS.to_string()
        } else {
            format!("{}{unit}", Shader::TEXCOORDS)
        };
        Self::new(name, AttributeSemantic::TexCoord, 2)
    }

    pub fn color() -> Self {
        Self::new(Shader::COLOR, AttributeSemantic::Color, 4)
    }

    pub fn color2() -> Self {
        Self::new(Shader::COLOR2, AttributeSemantic::Color, 4)
    }
}

/// Half-open element range awaiting upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRange {
    pub start: usize,
    pub end: usize,
}

impl DirtyRange {
    fn mark(range: &mut Option<DirtyRange>, start: usize, end: usize) {
        if end <= start {
            return;
        }
        *range = Some(match *range {
            Some(r) => DirtyRange {
                start: r.start.min(start),
                end: r.end.max(end),
            },
            None => DirtyRange { start, end },
        });
    }

    pub fn as_range(self) -> Range<usize> {
        self.start..self.end
    }
}

/// Fixed-capacity interleaved vertex array plus optional `u16` index array.
///
/// CPU arrays are allocated once at full capacity. Writes mark dirty element
/// ranges; [`update`](Self::update) uploads exactly the dirty span of each
/// buffer, once, before the next draw.
pub struct Mesh {
    id: RestorableId,
    attributes: Vec<VertexAttribute>,
    stride: usize,
    max_vertices: usize,
    max_indices: usize,

    vertices: Vec<f32>,
    vertices_len: usize,
    indices: Vec<u16>,
    indices_len: usize,

    dirty_vertices: Option<DirtyRange>,
    dirty_indices: Option<DirtyRange>,

    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    epoch: u64,
}

impl Mesh {
    /// Largest vertex count addressable by `u16` indices.
    pub const MAX_ADDRESSABLE_VERTICES: usize = u16::MAX as usize + 1;

    pub fn new(
        ctx: &mut ManagedContext,
        attributes: Vec<VertexAttribute>,
        max_vertices: usize,
        max_indices: usize,
    ) -> RenderResult<Self> {
        if attributes.is_empty() {
            return Err(RenderError::InvalidLayout("mesh needs at least one attribute"));
        }
        if attributes.iter().any(|a| a.components == 0 || a.components > 4) {
            return Err(RenderError::InvalidLayout("attributes have 1 to 4 components"));
        }
        if max_vertices == 0 || max_vertices > Self::MAX_ADDRESSABLE_VERTICES {
            return Err(RenderError::InvalidLayout("max_vertices must be in 1..=65536"));
        }

        let stride = attributes.iter().map(|a| a.components).sum();
        let id = ctx.add_restorable("mesh");

        Ok(Self {
            id,
            attributes,
            stride,
            max_vertices,
            max_indices,
            vertices: vec![0.0; max_vertices * stride],
            vertices_len: 0,
            indices: vec![0; max_indices],
            indices_len: 0,
            dirty_vertices: None,
            dirty_indices: None,
            vertex_buffer: None,
            index_buffer: None,
            epoch: ctx.epoch(),
        })
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Floats per vertex.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn max_vertices(&self) -> usize {
        self.max_vertices
    }

    #[inline]
    pub fn max_indices(&self) -> usize {
        self.max_indices
    }

    /// Whole vertices currently stored.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices_len / self.stride
    }

    #[inline]
    pub fn num_indices(&self) -> usize {
        self.indices_len
    }

    /// Logical vertex floats.
    pub fn vertices(&self) -> &[f32] {
        &self.vertices[..self.vertices_len]
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices[..self.indices_len]
    }

    pub fn dirty_vertices(&self) -> Option<DirtyRange> {
        self.dirty_vertices
    }

    pub fn dirty_indices(&self) -> Option<DirtyRange> {
        self.dirty_indices
    }

    pub fn restorable_id(&self) -> RestorableId {
        self.id
    }

    fn check_vertex_capacity(&self, floats: usize) -> RenderResult<()> {
        if floats > self.vertices.len() {
            return Err(RenderError::CapacityExceeded {
                what: "vertex floats",
                requested: floats,
                capacity: self.vertices.len(),
            });
        }
        Ok(())
    }

    fn check_index_capacity(&self, count: usize) -> RenderResult<()> {
        if count > self.max_indices {
            return Err(RenderError::CapacityExceeded {
                what: "indices",
                requested: count,
                capacity: self.max_indices,
            });
        }
        Ok(())
    }

    fn check_index_values(&self, indices: &[u16]) -> RenderResult<()> {
        match indices.iter().find(|&&i| i as usize >= self.max_vertices) {
            Some(&i) => Err(RenderError::IndexOutOfRange {
                index: i as usize,
                vertices: self.max_vertices,
            }),
            None => Ok(()),
        }
    }

    /// Sets the logical vertex length in floats and marks `[0, len)` dirty.
    pub fn set_vertices_length(&mut self, len: usize) -> RenderResult<()> {
        self.check_vertex_capacity(len)?;
        self.vertices_len = len;
        DirtyRange::mark(&mut self.dirty_vertices, 0, len);
        Ok(())
    }

    pub fn set_indices_length(&mut self, len: usize) -> RenderResult<()> {
        self.check_index_capacity(len)?;
        self.indices_len = len;
        DirtyRange::mark(&mut self.dirty_indices, 0, len);
        Ok(())
    }

    /// Replaces the vertex contents from offset 0.
    pub fn set_vertices(&mut self, data: &[f32]) -> RenderResult<()> {
        self.check_vertex_capacity(data.len())?;
        self.vertices[..data.len()].copy_from_slice(data);
        self.vertices_len = data.len();
        DirtyRange::mark(&mut self.dirty_vertices, 0, data.len());
        Ok(())
    }

    pub fn set_indices(&mut self, data: &[u16]) -> RenderResult<()> {
        self.check_index_capacity(data.len())?;
        self.check_index_values(data)?;
        self.indices[..data.len()].copy_from_slice(data);
        self.indices_len = data.len();
        DirtyRange::mark(&mut self.dirty_indices, 0, data.len());
        Ok(())
    }

    /// Writes `data` at float `offset`, growing the logical length to cover it.
    /// Only `[offset, offset + len)` is marked dirty.
    pub fn write_vertices(&mut self, offset: usize, data: &[f32]) -> RenderResult<()> {
        let end = offset + data.len();
        self.check_vertex_capacity(end)?;
        self.vertices[offset..end].copy_from_slice(data);
        self.vertices_len = self.vertices_len.max(end);
        DirtyRange::mark(&mut self.dirty_vertices, offset, end);
        Ok(())
    }

    pub fn write_indices(&mut self, offset: usize, data: &[u16]) -> RenderResult<()> {
        let end = offset + data.len();
        self.check_index_capacity(end)?;
        self.check_index_values(data)?;
        self.indices[offset..end].copy_from_slice(data);
        self.indices_len = self.indices_len.max(end);
        DirtyRange::mark(&mut self.dirty_indices, offset, end);
        Ok(())
    }

    fn ensure_buffers(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        if self.epoch != ctx.epoch() {
            return self.restore(ctx);
        }
        if self.vertex_buffer.is_none() {
            let size = (self.vertices.len() * 4) as u64;
            self.vertex_buffer = Some(ctx.gl().create_buffer(BufferKind::Vertex, size)?);
        }
        if self.index_buffer.is_none() && self.max_indices > 0 {
            let size = (self.max_indices * 2) as u64;
            self.index_buffer = Some(ctx.gl().create_buffer(BufferKind::Index, size)?);
        }
        Ok(())
    }

    /// Uploads the dirty span of each buffer, creating GPU buffers on first use.
    pub fn update(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        self.ensure_buffers(ctx)?;

        if let (Some(range), Some(buffer)) = (self.dirty_vertices.take(), self.vertex_buffer) {
            let data: &[u8] = bytemuck::cast_slice(&self.vertices[range.as_range()]);
            ctx.gl().write_buffer(buffer, (range.start * 4) as u64, data);
        }
        if let (Some(range), Some(buffer)) = (self.dirty_indices.take(), self.index_buffer) {
            let data: &[u8] = bytemuck::cast_slice(&self.indices[range.as_range()]);
            ctx.gl().write_buffer(buffer, (range.start * 2) as u64, data);
        }
        Ok(())
    }

    /// Draws all indices (or all vertices when no indices are set).
    pub fn draw(
        &mut self,
        ctx: &mut ManagedContext,
        shader: &Shader,
        primitive: Primitive,
    ) -> RenderResult<()> {
        let count = if self.indices_len > 0 {
            self.indices_len
        } else {
            self.num_vertices()
        };
        self.draw_with_offset(ctx, shader, primitive, 0, count)
    }

    /// Draws `count` indices (or vertices) starting at `offset`.
    pub fn draw_with_offset(
        &mut self,
        ctx: &mut ManagedContext,
        shader: &Shader,
        primitive: Primitive,
        offset: usize,
        count: usize,
    ) -> RenderResult<()> {
        let indexed = self.indices_len > 0;
        let len = if indexed { self.indices_len } else { self.num_vertices() };
        let end = offset + count;
        if end > len {
            return Err(RenderError::DrawRangeOutOfBounds { offset, end, len });
        }
        if count == 0 {
            return Ok(());
        }
        if indexed {
            let vertices = self.num_vertices();
            if let Some(&i) = self.indices[offset..end].iter().find(|&&i| i as usize >= vertices) {
                return Err(RenderError::IndexOutOfRange {
                    index: i as usize,
                    vertices,
                });
            }
        }

        self.update(ctx)?;
        let bindings = self.bindings(ctx, shader)?;
        let program = shader.program(ctx)?;
        let Some(vertex_buffer) = self.vertex_buffer else {
            return Err(RenderError::ResourceCreation {
                what: "vertex buffer",
                reason: "not created".into(),
            });
        };

        ctx.gl().draw(&DrawCall {
            program,
            vertex_buffer,
            index_buffer: if indexed { self.index_buffer } else { None },
            bindings: &bindings,
            stride: (self.stride * 4) as u64,
            primitive,
            first: offset as u32,
            count: count as u32,
        });
        Ok(())
    }

    fn bindings(&self, ctx: &mut ManagedContext, shader: &Shader) -> RenderResult<Vec<VertexBinding>> {
        let mut offset = 0u64;
        let mut bindings = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let location = shader
                .attribute_location(ctx, &attribute.name)?
                .ok_or_else(|| RenderError::UnknownAttribute(attribute.name.clone()))?;
            bindings.push(VertexBinding {
                location,
                components: attribute.components as u32,
                offset,
            });
            offset += attribute.components as u64 * 4;
        }
        Ok(bindings)
    }

    /// Deletes the GPU buffers and unregisters the mesh.
    pub fn dispose(&mut self, ctx: &mut ManagedContext) {
        self.release_buffers(ctx);
        ctx.remove_restorable(self.id);
    }

    /// Drops both buffer handles. They are deleted only if they belong to
    /// the current context; handles from a lost context are already gone.
    fn release_buffers(&mut self, ctx: &mut ManagedContext) {
        let current = self.epoch == ctx.epoch();
        for buffer in [self.vertex_buffer.take(), self.index_buffer.take()]
            .into_iter()
            .flatten()
        {
            if current {
                ctx.gl().delete_buffer(buffer);
            }
        }
    }
}

impl Restorable for Mesh {
    /// Recreates both buffers and re-uploads the full logical contents.
    fn restore(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        self.release_buffers(ctx);
        self.epoch = ctx.epoch();
        self.dirty_vertices = None;
        self.dirty_indices = None;
        DirtyRange::mark(&mut self.dirty_vertices, 0, self.vertices_len);
        DirtyRange::mark(&mut self.dirty_indices, 0, self.indices_len);
        self.ensure_buffers(ctx)
    }
}
