use std::any::Any;
use std::collections::HashMap;

use crate::paint::Color;

use super::context::{
    BlendFactors, BufferId, BufferKind, DrawCall, GraphicsContext, Primitive, ProgramId,
    ProgramSource, TextureId, TextureImage, TextureParams, UniformValue,
};
use super::error::{RenderError, RenderResult};

/// A backend call as observed by [`HeadlessContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum GlCommand {
    CreateBuffer { buffer: BufferId, kind: BufferKind, size: u64 },
    WriteBuffer { buffer: BufferId, offset: u64, len: u64 },
    DeleteBuffer(BufferId),
    CreateProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    SetUniform { program: ProgramId, name: String, value: UniformValue },
    CreateTexture { texture: TextureId, width: u32, height: u32 },
    SetTextureParams { texture: TextureId, params: TextureParams },
    DeleteTexture(TextureId),
    BindTexture { unit: u32, texture: Option<TextureId> },
    SetBlend(Option<BlendFactors>),
    SetViewport { x: i32, y: i32, width: u32, height: u32 },
    Clear(Color),
    Draw(DrawRecord),
}

/// Snapshot of one draw call, resolved against buffer contents at draw time.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub primitive: Primitive,
    /// Texture bound to unit 0 when the draw was issued.
    pub texture: Option<TextureId>,
    pub blend: Option<BlendFactors>,
    pub first: u32,
    pub count: u32,
    /// Drawn index range (empty for non-indexed draws).
    pub indices: Vec<u16>,
    /// Vertex floats referenced by the draw: vertices `0..=max index` for indexed
    /// draws, `first..first + count` otherwise.
    pub vertices: Vec<f32>,
}

struct HeadlessProgram {
    inputs: Vec<(String, u32)>,
    uniforms: HashMap<String, UniformValue>,
}

struct HeadlessTexture {
    width: u32,
    height: u32,
    params: TextureParams,
    pixels: Vec<u8>,
}

/// In-memory [`GraphicsContext`] that executes nothing and records everything.
///
/// Buffers keep their bytes, so draws can be resolved to the exact geometry a
/// GPU would have consumed. Used for tests and offline tooling.
#[derive(Default)]
pub struct HeadlessContext {
    next_id: u64,
    commands: Vec<GlCommand>,
    buffers: HashMap<BufferId, (BufferKind, Vec<u8>)>,
    programs: HashMap<ProgramId, HeadlessProgram>,
    textures: HashMap<TextureId, HeadlessTexture>,
    bound_textures: HashMap<u32, TextureId>,
    current_program: Option<ProgramId>,
    blend: Option<BlendFactors>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn commands(&self) -> &[GlCommand] {
        &self.commands
    }

    /// Forgets recorded commands; object state is kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.commands.iter().filter_map(|c| match c {
            GlCommand::Draw(d) => Some(d),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    /// `(offset, len)` byte ranges written to `buffer`, in call order.
    pub fn buffer_writes(&self, buffer: BufferId) -> Vec<(u64, u64)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GlCommand::WriteBuffer { buffer: b, offset, len } if *b == buffer => {
                    Some((*offset, *len))
                }
                _ => None,
            })
            .collect()
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|(_, data)| data.as_slice())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.programs.get(&program)?.uniforms.get(name).copied()
    }

    pub fn texture_params(&self, texture: TextureId) -> Option<TextureParams> {
        self.textures.get(&texture).map(|t| t.params)
    }

    pub fn texture_pixels(&self, texture: TextureId) -> Option<&[u8]> {
        self.textures.get(&texture).map(|t| t.pixels.as_slice())
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    pub fn blend(&self) -> Option<BlendFactors> {
        self.blend
    }

    fn resolve_draw(&self, call: &DrawCall<'_>) -> Option<DrawRecord> {
        let Some((_, vertex_bytes)) = self.buffers.get(&call.vertex_buffer) else {
            log::warn!("headless draw with unknown vertex buffer {:?}", call.vertex_buffer);
            return None;
        };
        let floats: &[f32] = bytemuck::cast_slice(vertex_bytes);
        let stride = (call.stride / 4) as usize;
        let first = call.first as usize;
        let count = call.count as usize;

        let (indices, vertex_range) = match call.index_buffer {
            Some(ib) => {
                let Some((_, index_bytes)) = self.buffers.get(&ib) else {
                    log::warn!("headless draw with unknown index buffer {ib:?}");
                    return None;
                };
                let all: &[u16] = bytemuck::cast_slice(index_bytes);
                let drawn = all.get(first..first + count)?.to_vec();
                let vertex_count = drawn.iter().map(|&i| i as usize + 1).max().unwrap_or(0);
                (drawn, 0..vertex_count * stride)
            }
            None => (Vec::new(), first * stride..(first + count) * stride),
        };

        Some(DrawRecord {
            program: call.program,
            primitive: call.primitive,
            texture: self.bound_textures.get(&0).copied(),
            blend: self.blend,
            first: call.first,
            count: call.count,
            indices,
            vertices: floats.get(vertex_range)?.to_vec(),
        })
    }
}

impl GraphicsContext for HeadlessContext {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> RenderResult<BufferId> {
        let buffer = BufferId(self.next_id());
        // Rounded up so u16 index data can always be viewed as whole words.
        let len = size.div_ceil(4) * 4;
        self.buffers.insert(buffer, (kind, vec![0; len as usize]));
        self.commands.push(GlCommand::CreateBuffer { buffer, kind, size });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some((_, bytes)) = self.buffers.get_mut(&buffer) else {
            log::warn!("headless write to unknown buffer {buffer:?}");
            return;
        };
        let start = offset as usize;
        let Some(dst) = bytes.get_mut(start..start + data.len()) else {
            log::warn!("headless write past the end of buffer {buffer:?}");
            return;
        };
        dst.copy_from_slice(data);
        self.commands.push(GlCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len() as u64,
        });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.commands.push(GlCommand::DeleteBuffer(buffer));
    }

    fn create_program(&mut self, source: &ProgramSource) -> RenderResult<ProgramId> {
        if !source.vertex.contains("@vertex") {
            return Err(RenderError::ShaderCompile("missing @vertex entry point".into()));
        }
        if !source.fragment.contains("@fragment") {
            return Err(RenderError::ShaderCompile("missing @fragment entry point".into()));
        }

        let program = ProgramId(self.next_id());
        self.programs.insert(
            program,
            HeadlessProgram {
                inputs: source.vertex_inputs(),
                uniforms: HashMap::new(),
            },
        );
        self.commands.push(GlCommand::CreateProgram(program));
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.commands.push(GlCommand::DeleteProgram(program));
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
        self.commands.push(GlCommand::UseProgram(program));
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .inputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, loc)| *loc)
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        let Some(p) = self.programs.get_mut(&program) else {
            log::warn!("headless uniform `{name}` on unknown program {program:?}");
            return;
        };
        p.uniforms.insert(name.to_string(), value);
        self.commands.push(GlCommand::SetUniform {
            program,
            name: name.to_string(),
            value,
        });
    }

    fn create_texture(
        &mut self,
        image: &TextureImage,
        params: &TextureParams,
    ) -> RenderResult<TextureId> {
        let texture = TextureId(self.next_id());
        self.textures.insert(
            texture,
            HeadlessTexture {
                width: image.width(),
                height: image.height(),
                params: *params,
                pixels: image.pixels().to_vec(),
            },
        );
        self.commands.push(GlCommand::CreateTexture {
            texture,
            width: image.width(),
            height: image.height(),
        });
        Ok(texture)
    }

    fn set_texture_params(&mut self, texture: TextureId, params: &TextureParams) {
        let Some(t) = self.textures.get_mut(&texture) else {
            log::warn!("headless params on unknown texture {texture:?}");
            return;
        };
        t.params = *params;
        self.commands.push(GlCommand::SetTextureParams {
            texture,
            params: *params,
        });
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.bound_textures.retain(|_, t| *t != texture);
        self.commands.push(GlCommand::DeleteTexture(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(t) => self.bound_textures.insert(unit, t),
            None => self.bound_textures.remove(&unit),
        };
        self.commands.push(GlCommand::BindTexture { unit, texture });
    }

    fn set_blend(&mut self, blend: Option<BlendFactors>) {
        self.blend = blend;
        self.commands.push(GlCommand::SetBlend(blend));
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.commands.push(GlCommand::SetViewport { x, y, width, height });
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(GlCommand::Clear(color));
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        if !self.programs.contains_key(&call.program) {
            log::warn!("headless draw with unknown program {:?}", call.program);
            return;
        }
        match self.resolve_draw(call) {
            Some(record) => self.commands.push(GlCommand::Draw(record)),
            None => log::warn!("headless draw out of buffer bounds; skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::VertexBinding;

    #[test]
    fn indexed_draw_resolves_geometry() {
        let mut gl = HeadlessContext::new();
        let program = gl
            .create_program(&ProgramSource::new(
                "struct VertexInput { @location(0) a_position: vec2<f32>, }; @vertex fn vs_main() {}",
                "@fragment fn fs_main() {}",
            ))
            .unwrap();
        let vb = gl.create_buffer(BufferKind::Vertex, 4 * 6).unwrap();
        let ib = gl.create_buffer(BufferKind::Index, 2 * 3).unwrap();
        let verts: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0];
        gl.write_buffer(vb, 0, bytemuck::cast_slice(&verts));
        gl.write_buffer(ib, 0, bytemuck::cast_slice(&[0u16, 1, 2]));

        let bindings = [VertexBinding { location: 0, components: 2, offset: 0 }];
        gl.draw(&DrawCall {
            program,
            vertex_buffer: vb,
            index_buffer: Some(ib),
            bindings: &bindings,
            stride: 8,
            primitive: Primitive::Triangles,
            first: 0,
            count: 3,
        });

        let draw = gl.draws().next().unwrap();
        assert_eq!(draw.indices, vec![0, 1, 2]);
        assert_eq!(draw.vertices, verts.to_vec());
        assert_eq!(gl.attribute_location(program, "a_position"), Some(0));
    }

    #[test]
    fn program_without_entry_points_fails() {
        let mut gl = HeadlessContext::new();
        let err = gl.create_program(&ProgramSource::new("", "")).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile(_)));
    }

    #[test]
    fn writes_to_deleted_buffers_are_ignored() {
        let mut gl = HeadlessContext::new();
        let vb = gl.create_buffer(BufferKind::Vertex, 16).unwrap();
        gl.delete_buffer(vb);
        gl.write_buffer(vb, 0, &[0; 4]);
        assert!(gl.buffer_writes(vb).is_empty());
        assert_eq!(gl.live_buffers(), 0);
    }
}
