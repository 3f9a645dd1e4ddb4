use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::paint::Color;

use super::context::{
    BlendFactor, BlendFactors, BufferId, BufferKind, DrawCall, GraphicsContext, Primitive,
    ProgramId, ProgramSource, TextureFilter, TextureId, TextureImage, TextureParams, TextureWrap,
    UniformValue, VertexBinding,
};
use super::error::{RenderError, RenderResult};

const PROJ_TRANS: &str = "u_projTrans";
const MAT4_SIZE: u64 = 64;

struct GpuBuffer {
    buffer: wgpu::Buffer,
    /// CPU copy of the contents, used to widen writes to copy alignment.
    shadow: Vec<u8>,
}

struct GpuProgram {
    module: wgpu::ShaderModule,
    inputs: Vec<(String, u32)>,
    textured: bool,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    layout: wgpu::PipelineLayout,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

struct FrameTarget {
    /// Open pass shared by consecutive draws. It locks `encoder` until dropped.
    pass: Option<wgpu::RenderPass<'static>>,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    width: u32,
    height: u32,
    pending_clear: Option<Color>,
}

impl FrameTarget {
    /// The open render pass, starting one if needed. A pending clear always
    /// starts a new pass that loads with it.
    fn pass(&mut self) -> &mut wgpu::RenderPass<'static> {
        if self.pending_clear.is_some() {
            self.pass = None;
        }
        let clear = self.pending_clear.take();
        let (encoder, view) = (&mut self.encoder, &self.view);
        self.pass.get_or_insert_with(|| begin_pass(encoder, view, clear))
    }

    /// Closes the open pass so the encoder can record copies again.
    fn end_pass(&mut self) {
        self.pass = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    stride: u64,
    bindings: Vec<VertexBinding>,
    primitive: Primitive,
    blend: Option<BlendFactors>,
}

/// [`GraphicsContext`] backed by a wgpu device.
///
/// Commands are recorded between [`begin_frame`](Self::begin_frame) and
/// [`end_frame`](Self::end_frame) into one encoder. Buffer and uniform writes
/// made inside a frame are staged and copied in encoder order, so a write
/// issued between two draws is only seen by the second one. Each draw becomes
/// recorded into a shared render pass that is closed before each staged copy;
/// a pending clear starts a new pass.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,

    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,

    next_id: u64,
    buffers: HashMap<BufferId, GpuBuffer>,
    programs: HashMap<ProgramId, GpuProgram>,
    textures: HashMap<TextureId, GpuTexture>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    bound_textures: HashMap<u32, TextureId>,
    current_program: Option<ProgramId>,
    blend: Option<BlendFactors>,
    /// GL-style viewport (bottom-left origin).
    viewport: Option<(i32, i32, u32, u32)>,

    frame: Option<FrameTarget>,
}

impl WgpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("armature uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(MAT4_SIZE),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("armature texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Self {
            device,
            queue,
            format,
            uniform_layout,
            texture_layout,
            next_id: 0,
            buffers: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            pipelines: HashMap::new(),
            bound_textures: HashMap::new(),
            current_program: None,
            blend: None,
            viewport: None,
            frame: None,
        }
    }

    /// Starts recording a frame that renders into `view`.
    pub fn begin_frame(&mut self, view: wgpu::TextureView, width: u32, height: u32) {
        if self.frame.is_some() {
            log::warn!("begin_frame while a frame is open; submitting the previous one");
            self.end_frame();
        }

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("armature frame encoder"),
            });

        self.frame = Some(FrameTarget {
            pass: None,
            view,
            encoder,
            width,
            height,
            pending_clear: None,
        });
    }

    /// Submits the recorded frame. The caller presents the surface texture afterwards.
    pub fn end_frame(&mut self) {
        let Some(mut frame) = self.frame.take() else {
            return;
        };

        if frame.pending_clear.is_some() {
            // Nothing was drawn after the clear; an empty pass applies it.
            frame.pass();
        }
        frame.end_pass();

        self.queue.submit(std::iter::once(frame.encoder.finish()));
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.format
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Writes `shadow[start..end]` to `buffer`, widened to copy alignment.
    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: Option<&mut FrameTarget>,
        buffer: &wgpu::Buffer,
        shadow: &[u8],
        start: u64,
        end: u64,
    ) {
        let align = wgpu::COPY_BUFFER_ALIGNMENT;
        let start = start / align * align;
        let end = end.div_ceil(align).saturating_mul(align).min(shadow.len() as u64);
        if end <= start {
            return;
        }
        let bytes = &shadow[start as usize..end as usize];

        match frame {
            Some(frame) => {
                let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("armature staging"),
                    contents: bytes,
                    usage: wgpu::BufferUsages::COPY_SRC,
                });
                frame.end_pass();
                frame
                    .encoder
                    .copy_buffer_to_buffer(&staging, 0, buffer, start, end - start);
            }
            None => queue.write_buffer(buffer, start, bytes),
        }
    }

    fn create_sampler(&self, params: &TextureParams) -> wgpu::Sampler {
        let (min_filter, mipmap_filter) = map_min_filter(params.min_filter);
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("armature sampler"),
            address_mode_u: map_wrap(params.wrap_u),
            address_mode_v: map_wrap(params.wrap_v),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: map_min_filter(params.mag_filter.as_mag_filter()).0,
            min_filter,
            mipmap_filter,
            ..Default::default()
        })
    }

    fn create_texture_bind_group(
        &self,
        view: &wgpu::TextureView,
        params: &TextureParams,
    ) -> wgpu::BindGroup {
        let sampler = self.create_sampler(params);
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("armature texture bind group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        })
    }
}

impl GraphicsContext for WgpuContext {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> RenderResult<BufferId> {
        let size = size.max(4).div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT;
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(match kind {
                BufferKind::Vertex => "armature vertex buffer",
                BufferKind::Index => "armature index buffer",
            }),
            size,
            usage,
            mapped_at_creation: false,
        });

        let id = BufferId(self.next_id());
        self.buffers.insert(
            id,
            GpuBuffer {
                buffer,
                shadow: vec![0; size as usize],
            },
        );
        log::debug!("created {kind:?} buffer {id:?} ({size} bytes)");
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Self {
            device,
            queue,
            buffers,
            frame,
            ..
        } = self;

        let Some(entry) = buffers.get_mut(&buffer) else {
            log::warn!("write to unknown buffer {buffer:?}");
            return;
        };
        let start = offset as usize;
        let Some(dst) = entry.shadow.get_mut(start..start + data.len()) else {
            log::warn!("write past the end of buffer {buffer:?}");
            return;
        };
        dst.copy_from_slice(data);

        Self::upload(
            device,
            queue,
            frame.as_mut(),
            &entry.buffer,
            &entry.shadow,
            offset,
            offset + data.len() as u64,
        );
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(entry) = self.buffers.remove(&buffer) {
            entry.buffer.destroy();
        }
    }

    fn create_program(&mut self, source: &ProgramSource) -> RenderResult<ProgramId> {
        let code = format!("{}\n{}", source.vertex, source.fragment);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("armature program"),
            source: wgpu::ShaderSource::Wgsl(code.into()),
        });

        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| m.message.clone())
            .collect();
        if !errors.is_empty() {
            return Err(RenderError::ShaderCompile(errors.join("\n")));
        }

        let textured = source.is_textured();
        let layouts: &[&wgpu::BindGroupLayout] = if textured {
            &[&self.uniform_layout, &self.texture_layout]
        } else {
            &[&self.uniform_layout]
        };
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("armature pipeline layout"),
                bind_group_layouts: layouts,
                immediate_size: 0,
            });

        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("armature uniforms"),
                contents: bytemuck::cast_slice(&glam::Mat4::IDENTITY.to_cols_array()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("armature uniforms bind group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let id = ProgramId(self.next_id());
        self.programs.insert(
            id,
            GpuProgram {
                module,
                inputs: source.vertex_inputs(),
                textured,
                uniform_buffer,
                uniform_bind_group,
                layout,
            },
        );
        log::debug!("created program {id:?} (textured: {textured})");
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        self.pipelines.retain(|k, _| k.program != program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
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
        let Self {
            device,
            queue,
            programs,
            frame,
            ..
        } = self;

        let Some(p) = programs.get(&program) else {
            log::warn!("uniform `{name}` on unknown program {program:?}");
            return;
        };

        // Only the projection matrix lives in a uniform buffer; sampler units are fixed.
        if let (PROJ_TRANS, UniformValue::Mat4(m)) = (name, value) {
            Self::upload(
                device,
                queue,
                frame.as_mut(),
                &p.uniform_buffer,
                bytemuck::cast_slice(&m),
                0,
                MAT4_SIZE,
            );
        }
    }

    fn create_texture(
        &mut self,
        image: &TextureImage,
        params: &TextureParams,
    ) -> RenderResult<TextureId> {
        let levels = if params.use_mip_maps {
            mip_chain(image)
        } else {
            vec![(image.width(), image.height(), image.pixels().to_vec())]
        };

        let max_dim = self.device.limits().max_texture_dimension_2d;
        if image.width() > max_dim || image.height() > max_dim {
            return Err(RenderError::ResourceCreation {
                what: "texture",
                reason: format!(
                    "{}x{} exceeds the device limit of {max_dim}",
                    image.width(),
                    image.height()
                ),
            });
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("armature texture"),
            size: wgpu::Extent3d {
                width: image.width(),
                height: image.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, (width, height, pixels)) in levels.iter().enumerate() {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(*height),
                },
                wgpu::Extent3d {
                    width: *width,
                    height: *height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.create_texture_bind_group(&view, params);

        let id = TextureId(self.next_id());
        self.textures.insert(
            id,
            GpuTexture {
                texture,
                view,
                bind_group,
            },
        );
        log::debug!(
            "created texture {id:?} {}x{} ({} levels)",
            image.width(),
            image.height(),
            levels.len()
        );
        Ok(id)
    }

    fn set_texture_params(&mut self, texture: TextureId, params: &TextureParams) {
        let Some(entry) = self.textures.get(&texture) else {
            log::warn!("params on unknown texture {texture:?}");
            return;
        };
        let bind_group = self.create_texture_bind_group(&entry.view, params);
        if let Some(entry) = self.textures.get_mut(&texture) {
            entry.bind_group = bind_group;
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.remove(&texture) {
            entry.texture.destroy();
        }
        self.bound_textures.retain(|_, t| *t != texture);
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(t) => self.bound_textures.insert(unit, t),
            None => self.bound_textures.remove(&unit),
        };
    }

    fn set_blend(&mut self, blend: Option<BlendFactors>) {
        self.blend = blend;
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Some((x, y, width, height));
    }

    fn clear(&mut self, color: Color) {
        match self.frame.as_mut() {
            Some(frame) => frame.pending_clear = Some(color),
            None => log::warn!("clear outside of a frame ignored"),
        }
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let Self {
            device,
            format,
            buffers,
            programs,
            textures,
            pipelines,
            bound_textures,
            current_program,
            blend,
            viewport,
            frame,
            ..
        } = self;

        let Some(frame) = frame.as_mut() else {
            log::warn!("draw outside of a frame ignored");
            return;
        };
        if *current_program != Some(call.program) {
            log::warn!("draw with {:?} while {:?} is in use", call.program, current_program);
        }
        let Some(program) = programs.get(&call.program) else {
            log::warn!("draw with unknown program {:?}", call.program);
            return;
        };
        let Some(vertex_buffer) = buffers.get(&call.vertex_buffer) else {
            log::warn!("draw with unknown vertex buffer {:?}", call.vertex_buffer);
            return;
        };
        let index_buffer = match call.index_buffer {
            Some(id) => match buffers.get(&id) {
                Some(b) => Some(&b.buffer),
                None => {
                    log::warn!("draw with unknown index buffer {id:?}");
                    return;
                }
            },
            None => None,
        };
        let texture_bind_group = if program.textured {
            match bound_textures.get(&0).and_then(|t| textures.get(t)) {
                Some(t) => Some(&t.bind_group),
                None => {
                    log::warn!("textured draw without a bound texture ignored");
                    return;
                }
            }
        } else {
            None
        };

        let key = PipelineKey {
            program: call.program,
            stride: call.stride,
            bindings: call.bindings.to_vec(),
            primitive: call.primitive,
            blend: *blend,
        };
        let pipeline = pipelines
            .entry(key)
            .or_insert_with_key(|key| create_pipeline(device, *format, program, key));

        let Some((x, y, w, h)) = draw_viewport(*viewport, frame.width, frame.height) else {
            return;
        };
        let pass = frame.pass();
        pass.set_viewport(x, y, w, h, 0.0, 1.0);
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &program.uniform_bind_group, &[]);
        if let Some(bind_group) = texture_bind_group {
            pass.set_bind_group(1, bind_group, &[]);
        }
        pass.set_vertex_buffer(0, vertex_buffer.buffer.slice(..));

        let range = call.first..call.first + call.count;
        match index_buffer {
            Some(ib) => {
                pass.set_index_buffer(ib.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(range, 0, 0..1);
            }
            None => pass.draw(range, 0..1),
        }
    }
}

fn begin_pass(
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    clear: Option<Color>,
) -> wgpu::RenderPass<'static> {
    let load = match clear {
        Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: c.a as f64,
        }),
        None => wgpu::LoadOp::Load,
    };

    encoder
        .begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("armature pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
        .forget_lifetime()
}

/// Viewport for a draw into a `width` x `height` target. The whole target
/// when no viewport is set; `None` when the viewport lies outside it.
fn draw_viewport(
    viewport: Option<(i32, i32, u32, u32)>,
    width: u32,
    height: u32,
) -> Option<(f32, f32, f32, f32)> {
    match viewport {
        Some(_) => clip_viewport(viewport, width, height),
        None => Some((0.0, 0.0, width as f32, height as f32)),
    }
}

/// Converts a bottom-left origin viewport to wgpu's top-left origin, clipped to the target.
fn clip_viewport(
    viewport: Option<(i32, i32, u32, u32)>,
    width: u32,
    height: u32,
) -> Option<(f32, f32, f32, f32)> {
    let (x, y, w, h) = viewport?;
    let top = height as i64 - (y as i64 + h as i64);

    let x0 = (x as i64).clamp(0, width as i64);
    let y0 = top.clamp(0, height as i64);
    let x1 = (x as i64 + w as i64).clamp(0, width as i64);
    let y1 = (top + h as i64).clamp(0, height as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32))
}

fn create_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    program: &GpuProgram,
    key: &PipelineKey,
) -> wgpu::RenderPipeline {
    let attributes: Vec<wgpu::VertexAttribute> = key
        .bindings
        .iter()
        .map(|b| wgpu::VertexAttribute {
            format: match b.components {
                1 => wgpu::VertexFormat::Float32,
                2 => wgpu::VertexFormat::Float32x2,
                3 => wgpu::VertexFormat::Float32x3,
                _ => wgpu::VertexFormat::Float32x4,
            },
            offset: b.offset,
            shader_location: b.location,
        })
        .collect();

    let topology = match key.primitive {
        Primitive::Points => wgpu::PrimitiveTopology::PointList,
        Primitive::Lines => wgpu::PrimitiveTopology::LineList,
        Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
    };

    log::debug!(
        "building pipeline for {:?} ({:?}, stride {})",
        key.program,
        key.primitive,
        key.stride
    );

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("armature pipeline"),
        layout: Some(&program.layout),

        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: key.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
        },

        fragment: Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: key.blend.map(map_blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

fn map_blend(b: BlendFactors) -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: map_factor(b.src_color),
            dst_factor: map_factor(b.dst),
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: map_factor(b.src_alpha),
            dst_factor: map_factor(b.dst),
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn map_factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

fn map_wrap(w: TextureWrap) -> wgpu::AddressMode {
    match w {
        TextureWrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        TextureWrap::Repeat => wgpu::AddressMode::Repeat,
    }
}

/// Splits a GL-style filter into (texel filter, mipmap filter).
fn map_min_filter(f: TextureFilter) -> (wgpu::FilterMode, wgpu::MipmapFilterMode) {
    use wgpu::{FilterMode as F, MipmapFilterMode as M};
    match f {
        TextureFilter::Nearest => (F::Nearest, M::Nearest),
        TextureFilter::Linear => (F::Linear, M::Nearest),
        TextureFilter::MipMap | TextureFilter::MipMapLinearLinear => (F::Linear, M::Linear),
        TextureFilter::MipMapNearestNearest => (F::Nearest, M::Nearest),
        TextureFilter::MipMapLinearNearest => (F::Linear, M::Nearest),
        TextureFilter::MipMapNearestLinear => (F::Nearest, M::Linear),
    }
}

/// Box-filtered mip chain down to 1x1, level 0 first.
fn mip_chain(image: &TextureImage) -> Vec<(u32, u32, Vec<u8>)> {
    let mut levels = vec![(image.width(), image.height(), image.pixels().to_vec())];

    loop {
        let Some((w, h, src)) = levels.last() else { break };
        let (w, h) = (*w, *h);
        if w == 1 && h == 1 {
            break;
        }

        let (nw, nh) = ((w / 2).max(1), (h / 2).max(1));
        let mut dst = vec![0u8; (nw * nh * 4) as usize];
        for y in 0..nh {
            for x in 0..nw {
                let sx = [(2 * x).min(w - 1), (2 * x + 1).min(w - 1)];
                let sy = [(2 * y).min(h - 1), (2 * y + 1).min(h - 1)];
                for c in 0..4 {
                    let sum: u32 = sy
                        .iter()
                        .flat_map(|&yy| sx.iter().map(move |&xx| (yy * w + xx) as usize * 4 + c))
                        .map(|i| src[i] as u32)
                        .sum();
                    dst[(y * nw + x) as usize * 4 + c] = ((sum + 2) / 4) as u8;
                }
            }
        }
        levels.push((nw, nh, dst));
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_flipped_to_top_left_origin() {
        assert_eq!(
            clip_viewport(Some((0, 0, 100, 50)), 100, 200),
            Some((0.0, 150.0, 100.0, 50.0))
        );
    }

    #[test]
    fn viewport_is_clipped_to_target() {
        assert_eq!(
            clip_viewport(Some((-10, 0, 50, 300)), 100, 200),
            Some((0.0, 0.0, 40.0, 200.0))
        );
        assert_eq!(clip_viewport(Some((200, 0, 10, 10)), 100, 100), None);
        assert_eq!(clip_viewport(None, 100, 100), None);
    }

    #[test]
    fn draw_viewport_defaults_to_whole_target() {
        assert_eq!(draw_viewport(None, 100, 50), Some((0.0, 0.0, 100.0, 50.0)));
        assert_eq!(
            draw_viewport(Some((0, 0, 100, 50)), 100, 200),
            Some((0.0, 150.0, 100.0, 50.0))
        );
        assert_eq!(draw_viewport(Some((200, 0, 10, 10)), 100, 100), None);
        assert_eq!(draw_viewport(Some((0, 0, 0, 0)), 100, 100), None);
    }

    #[test]
    fn mip_chain_averages_down_to_one_texel() {
        let mut pixels = vec![0u8; 4 * 4 * 4];
        for (i, px) in pixels.chunks_mut(4).enumerate() {
            let v = if i % 2 == 0 { 0 } else { 200 };
            px.copy_from_slice(&[v, v, v, 255]);
        }
        let image = TextureImage::new(4, 4, pixels).unwrap();
        let levels = mip_chain(&image);

        assert_eq!(
            levels.iter().map(|(w, h, _)| (*w, *h)).collect::<Vec<_>>(),
            vec![(4, 4), (2, 2), (1, 1)]
        );
        assert_eq!(&levels[2].2, &[100, 100, 100, 255]);
    }

    #[test]
    fn mip_chain_handles_non_square() {
        let image = TextureImage::new(4, 1, vec![255; 16]).unwrap();
        let levels = mip_chain(&image);
        assert_eq!(
            levels.iter().map(|(w, h, _)| (*w, *h)).collect::<Vec<_>>(),
            vec![(4, 1), (2, 1), (1, 1)]
        );
    }

    #[test]
    fn min_filter_splits_mipmap_mode() {
        assert_eq!(
            map_min_filter(TextureFilter::MipMapNearestLinear),
            (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Linear)
        );
        assert_eq!(
            map_min_filter(TextureFilter::Linear),
            (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Nearest)
        );
    }
}
