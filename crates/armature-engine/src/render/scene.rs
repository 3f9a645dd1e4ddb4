use std::rc::Rc;

use glam::Vec2;

use crate::device::{ManagedContext, RenderResult, Restorable};
use crate::math::OrthoCamera;
use crate::paint::Color;

use super::batcher::{BatcherConfig, PolygonBatcher};
use super::debug::{SkeletonDebugRenderer, SkeletonDebugSource};
use super::shader::Shader;
use super::shapes::ShapeRenderer;
use super::skeleton::{QUAD_TRIANGLES, SkeletonRenderer, SkeletonSource, SlotRange, VertexTransformer};
use super::texture::{GlTexture, TextureRegion};

/// Scene renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneConfig {
    pub two_color_tint: bool,
    pub max_batch_vertices: usize,
    pub max_shape_vertices: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            two_color_tint: true,
            max_batch_vertices: PolygonBatcher::MAX_VERTICES,
            max_shape_vertices: ShapeRenderer::MAX_VERTICES,
        }
    }
}

/// How the camera viewport follows the drawable size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Keep the camera viewport; the image stretches.
    Stretch,
    /// Camera viewport equals the drawable size.
    #[default]
    Expand,
    /// Scale the camera viewport to keep its aspect ratio while covering the drawable.
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Active {
    Batcher,
    Shapes,
}

/// Draws skeletons, textures and shapes through one camera.
///
/// Textured draws go through the polygon batcher, shapes through the shape
/// renderer. Switching between the two ends the active one and begins the
/// other with the camera matrix uploaded.
pub struct SceneRenderer {
    pub camera: OrthoCamera,
    pub batcher: PolygonBatcher,
    pub skeleton_renderer: SkeletonRenderer,
    pub skeleton_debug_renderer: SkeletonDebugRenderer,

    batcher_shader: Rc<Shader>,
    shapes: ShapeRenderer,
    shapes_shader: Rc<Shader>,
    active: Option<Active>,
    two_color_tint: bool,
    quad: Vec<f32>,
}

impl SceneRenderer {
    pub fn new(
        ctx: &mut ManagedContext,
        width: u32,
        height: u32,
        config: SceneConfig,
    ) -> RenderResult<Self> {
        let batcher_shader = if config.two_color_tint {
            Shader::new_two_colored_textured(ctx)?
        } else {
            Shader::new_colored_textured(ctx)?
        };
        let batcher = PolygonBatcher::new(
            ctx,
            BatcherConfig {
                two_color_tint: config.two_color_tint,
                max_vertices: config.max_batch_vertices,
            },
        )?;
        let shapes_shader = Shader::new_colored(ctx)?;
        let shapes = ShapeRenderer::new(ctx, config.max_shape_vertices)?;

        log::debug!(
            "scene renderer created ({}x{}, two-color tint: {})",
            width,
            height,
            config.two_color_tint
        );

        Ok(Self {
            camera: OrthoCamera::new(width as f32, height as f32),
            batcher,
            skeleton_renderer: SkeletonRenderer::new(config.two_color_tint),
            skeleton_debug_renderer: SkeletonDebugRenderer::new(),
            batcher_shader: Rc::new(batcher_shader),
            shapes,
            shapes_shader: Rc::new(shapes_shader),
            active: None,
            two_color_tint: config.two_color_tint,
            quad: Vec::with_capacity(4 * 12),
        })
    }

    pub fn two_color_tint(&self) -> bool {
        self.two_color_tint
    }

    pub fn shapes(&mut self) -> &mut ShapeRenderer {
        &mut self.shapes
    }

    /// Updates the camera and opens a batcher session.
    pub fn begin(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        self.camera.update();
        self.enable(ctx, Active::Batcher)
    }

    /// Ends whichever renderer is active. A no-op when nothing is.
    pub fn end(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        match self.active.take() {
            Some(Active::Batcher) => self.batcher.end(ctx),
            Some(Active::Shapes) => self.shapes.end(ctx),
            None => Ok(()),
        }
    }

    fn enable(&mut self, ctx: &mut ManagedContext, renderer: Active) -> RenderResult<()> {
        if self.active == Some(renderer) {
            return Ok(());
        }
        self.end(ctx)?;

        let mvp = self.camera.projection_view().to_cols_array();
        match renderer {
            Active::Batcher => {
                self.batcher_shader.bind(ctx)?;
                self.batcher_shader.set_uniform4x4f(ctx, Shader::MVP_MATRIX, &mvp)?;
                self.batcher_shader.set_uniformi(ctx, Shader::SAMPLER, 0)?;
                self.batcher.begin(ctx, self.batcher_shader.clone())?;
            }
            Active::Shapes => {
                self.shapes_shader.bind(ctx)?;
                self.shapes_shader.set_uniform4x4f(ctx, Shader::MVP_MATRIX, &mvp)?;
                self.shapes.begin(ctx, self.shapes_shader.clone())?;
            }
        }
        self.active = Some(renderer);
        Ok(())
    }

    // ── skeletons ─────────────────────────────────────────────────────────

    pub fn draw_skeleton(
        &mut self,
        ctx: &mut ManagedContext,
        skeleton: &dyn SkeletonSource,
        premultiplied_alpha: bool,
        range: SlotRange,
        transformer: Option<&mut VertexTransformer<'_>>,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Batcher)?;
        self.skeleton_renderer.premultiplied_alpha = premultiplied_alpha;
        self.skeleton_renderer
            .draw(ctx, &mut self.batcher, skeleton, range, transformer)
    }

    pub fn draw_skeleton_debug(
        &mut self,
        ctx: &mut ManagedContext,
        skeleton: &dyn SkeletonDebugSource,
        premultiplied_alpha: bool,
        ignored_bones: &[&str],
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Shapes)?;
        self.skeleton_debug_renderer.premultiplied_alpha = premultiplied_alpha;
        self.skeleton_debug_renderer
            .draw(ctx, &mut self.shapes, skeleton, ignored_bones)
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn push_vertex(&mut self, p: Vec2, color: Color, uv: Vec2) {
        self.quad.extend_from_slice(&[p.x, p.y, color.r, color.g, color.b, color.a, uv.x, uv.y]);
        if self.two_color_tint {
            self.quad.extend_from_slice(&[0.0; 4]);
        }
    }

    /// Draws four corners (counter-clockwise from bottom-left) with their UVs.
    fn draw_quad(
        &mut self,
        ctx: &mut ManagedContext,
        texture: &GlTexture,
        corners: [Vec2; 4],
        uvs: [Vec2; 4],
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Batcher)?;
        let color = color.unwrap_or(Color::WHITE);
        self.quad.clear();
        for (p, uv) in corners.into_iter().zip(uvs) {
            self.push_vertex(p, color, uv);
        }
        self.batcher.draw(ctx, texture, &self.quad, &QUAD_TRIANGLES)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_texture(
        &mut self,
        ctx: &mut ManagedContext,
        texture: &GlTexture,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.draw_texture_uv(ctx, texture, x, y, width, height, [0.0, 0.0, 1.0, 1.0], color)
    }

    /// `uv` is `[u, v, u2, v2]`; `v` maps to the top edge.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_texture_uv(
        &mut self,
        ctx: &mut ManagedContext,
        texture: &GlTexture,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        uv: [f32; 4],
        color: Option<Color>,
    ) -> RenderResult<()> {
        let [u, v, u2, v2] = uv;
        self.draw_quad(
            ctx,
            texture,
            rect_corners(x, y, width, height),
            [
                Vec2::new(u, v2),
                Vec2::new(u2, v2),
                Vec2::new(u2, v),
                Vec2::new(u, v),
            ],
            color,
        )
    }

    /// Draws a texture rotated by `angle` degrees around `pivot` (relative to `(x, y)`).
    #[allow(clippy::too_many_arguments)]
    pub fn draw_texture_rotated(
        &mut self,
        ctx: &mut ManagedContext,
        texture: &GlTexture,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        pivot: Vec2,
        angle: f32,
        color: Option<Color>,
    ) -> RenderResult<()> {
        let origin = Vec2::new(x, y) + pivot;
        let local = [
            Vec2::new(-pivot.x, -pivot.y),
            Vec2::new(width - pivot.x, -pivot.y),
            Vec2::new(width - pivot.x, height - pivot.y),
            Vec2::new(-pivot.x, height - pivot.y),
        ];
        let rotation = Vec2::from_angle(angle.to_radians());
        let corners = local.map(|p| origin + rotation.rotate(p));
        self.draw_quad(
            ctx,
            texture,
            corners,
            [Vec2::Y, Vec2::ONE, Vec2::X, Vec2::ZERO],
            color,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_region(
        &mut self,
        ctx: &mut ManagedContext,
        region: &TextureRegion<'_>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Option<Color>,
    ) -> RenderResult<()> {
        let uv = [region.u, region.v, region.u2, region.v2];
        self.draw_texture_uv(ctx, region.texture, x, y, width, height, uv, color)
    }

    // ── shapes ────────────────────────────────────────────────────────────

    pub fn line(
        &mut self,
        ctx: &mut ManagedContext,
        a: Vec2,
        b: Vec2,
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Shapes)?;
        self.shapes.line(ctx, a, b, color)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn triangle(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        a: Vec2,
        b: Vec2,
        c: Vec2,
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Shapes)?;
        self.shapes.triangle(ctx, filled, a, b, c, color)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn quad(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        a: Vec2,
        b: Vec2,
        c: Vec2,
        d: Vec2,
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Shapes)?;
        self.shapes.quad(ctx, filled, a, b, c, d, color)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rect(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Shapes)?;
        self.shapes.rect(ctx, filled, x, y, width, height, color)
    }

    pub fn rect_line(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        a: Vec2,
        b: Vec2,
        width: f32,
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Shapes)?;
        self.shapes.rect_line(ctx, filled, a, b, width, color)
    }

    pub fn polygon(
        &mut self,
        ctx: &mut ManagedContext,
        vertices: &[f32],
        offset: usize,
        count: usize,
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Shapes)?;
        self.shapes.polygon(ctx, vertices, offset, count, color)
    }

    pub fn circle(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        center: Vec2,
        radius: f32,
        color: Option<Color>,
        segments: usize,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Shapes)?;
        self.shapes.circle(ctx, filled, center, radius, color, segments)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn curve(
        &mut self,
        ctx: &mut ManagedContext,
        p1: Vec2,
        c1: Vec2,
        c2: Vec2,
        p2: Vec2,
        segments: usize,
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.enable(ctx, Active::Shapes)?;
        self.shapes.curve(ctx, p1, c1, c2, p2, segments, color)
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Applies a new drawable size to the GL viewport and the camera.
    ///
    /// An empty size (a minimized window) leaves the camera untouched.
    pub fn resize(&mut self, ctx: &mut ManagedContext, mode: ResizeMode, width: u32, height: u32) {
        ctx.gl().set_viewport(0, 0, width, height);
        if width == 0 || height == 0 {
            return;
        }
        let (w, h) = (width as f32, height as f32);

        match mode {
            ResizeMode::Stretch => {}
            ResizeMode::Expand => self.camera.set_viewport(w, h),
            ResizeMode::Fit => {
                let target = Vec2::new(self.camera.viewport_width, self.camera.viewport_height);
                let target_ratio = target.y / target.x;
                let source_ratio = h / w;
                let scale = if target_ratio < source_ratio {
                    target.x / w
                } else {
                    target.y / h
                };
                self.camera.set_viewport(w * scale, h * scale);
            }
        }
        self.camera.update();
    }

    pub fn dispose(&mut self, ctx: &mut ManagedContext) {
        self.active = None;
        self.batcher.dispose(ctx);
        self.batcher_shader.dispose(ctx);
        self.shapes.dispose(ctx);
        self.shapes_shader.dispose(ctx);
    }
}

impl Restorable for SceneRenderer {
    fn restore(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        self.batcher_shader.program(ctx)?;
        self.shapes_shader.program(ctx)?;
        self.batcher.restore(ctx)?;
        self.shapes.restore(ctx)
    }
}

fn rect_corners(x: f32, y: f32, width: f32, height: f32) -> [Vec2; 4] {
    [
        Vec2::new(x, y),
        Vec2::new(x + width, y),
        Vec2::new(x + width, y + height),
        Vec2::new(x, y + height),
    ]
}
