use std::f32::consts::TAU;
use std::rc::Rc;

use glam::Vec2;

use crate::device::{
    BlendFactors, ManagedContext, Primitive, RenderError, RenderResult, Restorable,
};
use crate::paint::Color;

use super::mesh::{Mesh, VertexAttribute};
use super::shader::Shader;

/// Topology of the pending shape vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Point,
    Line,
    Filled,
}

impl ShapeType {
    fn primitive(self) -> Primitive {
        match self {
            ShapeType::Point => Primitive::Points,
            ShapeType::Line => Primitive::Lines,
            ShapeType::Filled => Primitive::Triangles,
        }
    }
}

const VERTEX_SIZE: usize = 6;

/// Immediate-mode renderer for debug shapes (points, lines, filled triangles).
///
/// Shapes of the same [`ShapeType`] accumulate into one draw; switching type
/// or running out of room flushes. Colors are straight alpha. Methods taking
/// `Option<Color>` fall back to the current color set by [`set_color`](Self::set_color).
pub struct ShapeRenderer {
    mesh: Mesh,
    pending: Vec<f32>,
    shape_type: ShapeType,
    color: Color,
    shader: Option<Rc<Shader>>,
    drawing: bool,
    blend: BlendFactors,
}

impl ShapeRenderer {
    pub const MAX_VERTICES: usize = 10920;

    pub fn new(ctx: &mut ManagedContext, max_vertices: usize) -> RenderResult<Self> {
        if max_vertices > Self::MAX_VERTICES {
            return Err(RenderError::BatchTooLarge {
                requested: max_vertices,
                max: Self::MAX_VERTICES,
            });
        }
        let mesh = Mesh::new(
            ctx,
            vec![VertexAttribute::position2(), VertexAttribute::color()],
            max_vertices,
            0,
        )?;

        Ok(Self {
            mesh,
            pending: Vec::with_capacity(max_vertices * VERTEX_SIZE),
            shape_type: ShapeType::Filled,
            color: Color::WHITE,
            shader: None,
            drawing: false,
            blend: BlendFactors::DEFAULT,
        })
    }

    pub fn begin(&mut self, ctx: &mut ManagedContext, shader: Rc<Shader>) -> RenderResult<()> {
        if self.drawing {
            return Err(RenderError::AlreadyDrawing("ShapeRenderer"));
        }
        self.shader = Some(shader);
        self.pending.clear();
        self.drawing = true;
        ctx.gl().set_blend(Some(self.blend));
        Ok(())
    }

    pub fn set_blend_mode(
        &mut self,
        ctx: &mut ManagedContext,
        blend: BlendFactors,
    ) -> RenderResult<()> {
        self.blend = blend;
        if self.drawing {
            self.flush(ctx)?;
            ctx.gl().set_blend(Some(blend));
        }
        Ok(())
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn point(&mut self, ctx: &mut ManagedContext, p: Vec2, color: Option<Color>) -> RenderResult<()> {
        self.check(ctx, ShapeType::Point, 1)?;
        let c = color.unwrap_or(self.color);
        self.vertex(p, c);
        Ok(())
    }

    pub fn line(
        &mut self,
        ctx: &mut ManagedContext,
        a: Vec2,
        b: Vec2,
        color: Option<Color>,
    ) -> RenderResult<()> {
        self.check(ctx, ShapeType::Line, 2)?;
        let c = color.unwrap_or(self.color);
        self.vertex(a, c);
        self.vertex(b, c);
        Ok(())
    }

    pub fn triangle(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        a: Vec2,
        b: Vec2,
        c: Vec2,
        color: Option<Color>,
    ) -> RenderResult<()> {
        let col = color.unwrap_or(self.color);
        self.triangle_colored(ctx, filled, [a, b, c], [col; 3])
    }

    /// Triangle with one color per corner.
    pub fn triangle_colored(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        p: [Vec2; 3],
        c: [Color; 3],
    ) -> RenderResult<()> {
        if filled {
            self.check(ctx, ShapeType::Filled, 3)?;
            for i in 0..3 {
                self.vertex(p[i], c[i]);
            }
        } else {
            self.check(ctx, ShapeType::Line, 6)?;
            for i in 0..3 {
                let j = (i + 1) % 3;
                self.vertex(p[i], c[i]);
                self.vertex(p[j], c[j]);
            }
        }
        Ok(())
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
        let col = color.unwrap_or(self.color);
        self.quad_colored(ctx, filled, [a, b, c, d], [col; 4])
    }

    /// Quad with one color per corner, corners in winding order.
    pub fn quad_colored(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        p: [Vec2; 4],
        c: [Color; 4],
    ) -> RenderResult<()> {
        if filled {
            self.check(ctx, ShapeType::Filled, 6)?;
            for i in [0, 1, 2, 2, 3, 0] {
                self.vertex(p[i], c[i]);
            }
        } else {
            self.check(ctx, ShapeType::Line, 8)?;
            for i in 0..4 {
                let j = (i + 1) % 4;
                self.vertex(p[i], c[i]);
                self.vertex(p[j], c[j]);
            }
        }
        Ok(())
    }

    /// Axis-aligned rectangle with its bottom-left corner at `(x, y)`.
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
        self.quad(
            ctx,
            filled,
            Vec2::new(x, y),
            Vec2::new(x + width, y),
            Vec2::new(x + width, y + height),
            Vec2::new(x, y + height),
            color,
        )
    }

    /// A line from `a` to `b` drawn as a rectangle `width` wide.
    pub fn rect_line(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        a: Vec2,
        b: Vec2,
        width: f32,
        color: Option<Color>,
    ) -> RenderResult<()> {
        let c = color.unwrap_or(self.color);
        let t = Vec2::new(b.y - a.y, a.x - b.x).normalize_or_zero() * (width * 0.5);

        if filled {
            self.check(ctx, ShapeType::Filled, 6)?;
            for p in [a + t, a - t, b + t, b - t, b + t, a - t] {
                self.vertex(p, c);
            }
        } else {
            self.check(ctx, ShapeType::Line, 8)?;
            for p in [a + t, a - t, b + t, b - t, b + t, a + t, b - t, a - t] {
                self.vertex(p, c);
            }
        }
        Ok(())
    }

    /// An "x" cross of half-extent `size` around `p`, in the current color.
    pub fn x(&mut self, ctx: &mut ManagedContext, p: Vec2, size: f32) -> RenderResult<()> {
        self.line(ctx, p - Vec2::splat(size), p + Vec2::splat(size), None)?;
        self.line(
            ctx,
            Vec2::new(p.x - size, p.y + size),
            Vec2::new(p.x + size, p.y - size),
            None,
        )
    }

    /// Closed outline through `count` points of `vertices` (x, y pairs) starting at point `offset`.
    pub fn polygon(
        &mut self,
        ctx: &mut ManagedContext,
        vertices: &[f32],
        offset: usize,
        count: usize,
        color: Option<Color>,
    ) -> RenderResult<()> {
        if count < 3 {
            return Err(RenderError::InvalidShape("polygon must contain at least 3 vertices"));
        }
        let start = offset * 2;
        let end = start + count * 2;
        let Some(points) = vertices.get(start..end) else {
            return Err(RenderError::InvalidShape("polygon range exceeds the vertex data"));
        };

        self.check(ctx, ShapeType::Line, count * 2)?;
        let c = color.unwrap_or(self.color);
        let first = Vec2::new(points[0], points[1]);
        let mut prev = first;
        for xy in points[2..].chunks_exact(2) {
            let p = Vec2::new(xy[0], xy[1]);
            self.vertex(prev, c);
            self.vertex(p, c);
            prev = p;
        }
        self.vertex(prev, c);
        self.vertex(first, c);
        Ok(())
    }

    /// Circle approximated by `segments` edges; `0` picks `max(1, 6 * cbrt(radius))`.
    pub fn circle(
        &mut self,
        ctx: &mut ManagedContext,
        filled: bool,
        center: Vec2,
        radius: f32,
        color: Option<Color>,
        segments: usize,
    ) -> RenderResult<()> {
        let segments = if segments == 0 {
            ((6.0 * radius.cbrt()) as usize).max(1)
        } else {
            segments
        };
        let c = color.unwrap_or(self.color);
        let (sin, cos) = (TAU / segments as f32).sin_cos();

        // Rotate incrementally; the last edge closes on the exact first point.
        let first = Vec2::new(radius, 0.0);
        let mut cur = first;
        let next = |p: Vec2| Vec2::new(cos * p.x - sin * p.y, sin * p.x + cos * p.y);

        if filled {
            self.check(ctx, ShapeType::Filled, segments * 3)?;
            for i in 0..segments {
                let n = if i + 1 == segments { first } else { next(cur) };
                self.vertex(center, c);
                self.vertex(center + cur, c);
                self.vertex(center + n, c);
                cur = n;
            }
        } else {
            self.check(ctx, ShapeType::Line, segments * 2)?;
            for i in 0..segments {
                let n = if i + 1 == segments { first } else { next(cur) };
                self.vertex(center + cur, c);
                self.vertex(center + n, c);
                cur = n;
            }
        }
        Ok(())
    }

    /// Cubic Bézier from `p1` to `p2` with control points `c1`, `c2`, using
    /// forward differencing over `segments` steps.
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
        if segments == 0 {
            return Err(RenderError::InvalidShape("curve needs at least one segment"));
        }
        self.check(ctx, ShapeType::Line, segments * 2 + 2)?;
        let c = color.unwrap_or(self.color);

        let step = 1.0 / segments as f32;
        let step2 = step * step;
        let step3 = step2 * step;
        let pre1 = 3.0 * step;
        let pre2 = 3.0 * step2;
        let pre4 = 6.0 * step2;
        let pre5 = 6.0 * step3;

        let tmp1 = p1 - c1 * 2.0 + c2;
        let tmp2 = (c1 - c2) * 3.0 - p1 + p2;

        let mut f = p1;
        let mut df = (c1 - p1) * pre1 + tmp1 * pre2 + tmp2 * step3;
        let mut ddf = tmp1 * pre4 + tmp2 * pre5;
        let dddf = tmp2 * pre5;

        for _ in 0..segments {
            self.vertex(f, c);
            f += df;
            df += ddf;
            ddf += dddf;
            self.vertex(f, c);
        }
        self.vertex(f, c);
        self.vertex(p2, c);
        Ok(())
    }

    pub fn end(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        if !self.drawing {
            return Err(RenderError::NotDrawing("ShapeRenderer"));
        }
        let flushed = self.flush(ctx);
        self.pending.clear();
        self.drawing = false;
        self.shader = None;
        ctx.gl().set_blend(None);
        flushed
    }

    fn flush(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let Some(shader) = self.shader.as_ref() else {
            return Err(RenderError::NoShader);
        };
        self.mesh.set_vertices(&self.pending)?;
        let drawn = self.mesh.draw(ctx, shader, self.shape_type.primitive());
        log::trace!(
            "shape flush: {} {:?} vertices",
            self.pending.len() / VERTEX_SIZE,
            self.shape_type
        );
        self.pending.clear();
        drawn
    }

    fn check(&mut self, ctx: &mut ManagedContext, shape_type: ShapeType, vertices: usize) -> RenderResult<()> {
        if !self.drawing {
            return Err(RenderError::NotDrawing("ShapeRenderer"));
        }
        let max = self.mesh.max_vertices();
        if vertices > max {
            return Err(RenderError::CapacityExceeded {
                what: "shape vertices",
                requested: vertices,
                capacity: max,
            });
        }
        if self.shape_type != shape_type {
            self.flush(ctx)?;
            self.shape_type = shape_type;
        } else if self.pending.len() / VERTEX_SIZE + vertices > max {
            self.flush(ctx)?;
        }
        Ok(())
    }

    #[inline]
    fn vertex(&mut self, p: Vec2, c: Color) {
        self.pending.extend_from_slice(&[p.x, p.y, c.r, c.g, c.b, c.a]);
    }

    pub fn dispose(&mut self, ctx: &mut ManagedContext) {
        self.mesh.dispose(ctx);
    }
}

impl Restorable for ShapeRenderer {
    fn restore(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        self.mesh.restore(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DrawRecord, GlCommand, HeadlessContext};

    fn setup(max_vertices: usize) -> (ManagedContext, ShapeRenderer, Rc<Shader>) {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let shader = Rc::new(Shader::new_colored(&mut ctx).unwrap());
        let shapes = ShapeRenderer::new(&mut ctx, max_vertices).unwrap();
        (ctx, shapes, shader)
    }

    fn draws(ctx: &ManagedContext) -> Vec<DrawRecord> {
        ctx.backend::<HeadlessContext>().unwrap().draws().cloned().collect()
    }

    fn positions(draw: &DrawRecord) -> Vec<Vec2> {
        draw.vertices
            .chunks(VERTEX_SIZE)
            .map(|v| Vec2::new(v[0], v[1]))
            .collect()
    }

    #[test]
    fn shape_type_change_flushes() {
        let (mut ctx, mut shapes, shader) = setup(64);
        shapes.begin(&mut ctx, shader).unwrap();
        shapes.line(&mut ctx, Vec2::ZERO, Vec2::X, None).unwrap();
        shapes.line(&mut ctx, Vec2::ZERO, Vec2::Y, None).unwrap();
        assert!(draws(&ctx).is_empty());

        shapes
            .triangle(&mut ctx, true, Vec2::ZERO, Vec2::X, Vec2::Y, Some(Color::RED))
            .unwrap();
        shapes.point(&mut ctx, Vec2::ONE, None).unwrap();
        shapes.end(&mut ctx).unwrap();

        let draws = draws(&ctx);
        let summary: Vec<_> = draws.iter().map(|d| (d.primitive, d.count)).collect();
        assert_eq!(
            summary,
            vec![
                (Primitive::Lines, 4),
                (Primitive::Triangles, 3),
                (Primitive::Points, 1),
            ]
        );
        assert_eq!(&draws[1].vertices[2..6], &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn full_mesh_flushes_before_appending() {
        let (mut ctx, mut shapes, shader) = setup(4);
        shapes.begin(&mut ctx, shader).unwrap();
        for _ in 0..3 {
            shapes.line(&mut ctx, Vec2::ZERO, Vec2::X, None).unwrap();
        }
        assert_eq!(draws(&ctx).len(), 1);
        shapes.end(&mut ctx).unwrap();
        let counts: Vec<_> = draws(&ctx).iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![4, 2]);
    }

    #[test]
    fn circle_default_segments_and_closure() {
        let (mut ctx, mut shapes, shader) = setup(256);
        shapes.begin(&mut ctx, shader).unwrap();
        // 6 * cbrt(9) = 12.48, truncated to 12 segments.
        shapes.circle(&mut ctx, true, Vec2::ZERO, 9.0, None, 0).unwrap();
        shapes.circle(&mut ctx, false, Vec2::new(5.0, 5.0), 1.0, None, 4).unwrap();
        shapes.end(&mut ctx).unwrap();

        let draws = draws(&ctx);
        assert_eq!(draws[0].count, 36);
        let outline = positions(&draws[1]);
        assert_eq!(outline.len(), 8);
        assert_eq!(outline[0], Vec2::new(6.0, 5.0));
        assert_eq!(outline[7], outline[0]);
        assert!((outline[1] - Vec2::new(5.0, 6.0)).length() < 1e-5);
    }

    #[test]
    fn polygon_is_closed_and_validated() {
        let (mut ctx, mut shapes, shader) = setup(64);
        shapes.begin(&mut ctx, shader).unwrap();
        assert_eq!(
            shapes.polygon(&mut ctx, &[0.0, 0.0, 1.0, 0.0], 0, 2, None).err(),
            Some(RenderError::InvalidShape("polygon must contain at least 3 vertices"))
        );

        let square = [9.0, 9.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        shapes.polygon(&mut ctx, &square, 1, 4, None).unwrap();
        shapes.end(&mut ctx).unwrap();

        let p = positions(&draws(&ctx)[0]);
        assert_eq!(p.len(), 8);
        assert_eq!(p[0], Vec2::ZERO);
        assert_eq!(p[6], Vec2::new(0.0, 1.0));
        assert_eq!(p[7], Vec2::ZERO);
    }

    #[test]
    fn rect_line_is_offset_perpendicular() {
        let (mut ctx, mut shapes, shader) = setup(64);
        shapes.begin(&mut ctx, shader).unwrap();
        shapes
            .rect_line(&mut ctx, true, Vec2::ZERO, Vec2::new(10.0, 0.0), 2.0, None)
            .unwrap();
        shapes.end(&mut ctx).unwrap();

        let p = positions(&draws(&ctx)[0]);
        assert_eq!(p[0], Vec2::new(0.0, -1.0));
        assert_eq!(p[1], Vec2::new(0.0, 1.0));
        assert_eq!(p[2], Vec2::new(10.0, -1.0));
    }

    #[test]
    fn curve_spans_its_endpoints() {
        let (mut ctx, mut shapes, shader) = setup(64);
        shapes.begin(&mut ctx, shader).unwrap();
        let (p1, p2) = (Vec2::ZERO, Vec2::new(3.0, 0.0));
        assert!(shapes.curve(&mut ctx, p1, Vec2::Y, Vec2::Y, p2, 0, None).is_err());
        shapes.curve(&mut ctx, p1, Vec2::new(1.0, 2.0), Vec2::new(2.0, 2.0), p2, 8, None).unwrap();
        shapes.end(&mut ctx).unwrap();

        let p = positions(&draws(&ctx)[0]);
        assert_eq!(p.len(), 18);
        assert_eq!(p[0], p1);
        assert!((p[16] - p2).length() < 1e-4);
        assert_eq!(p[17], p2);
    }

    #[test]
    fn shapes_require_a_session() {
        let (mut ctx, mut shapes, shader) = setup(8);
        assert_eq!(
            shapes.point(&mut ctx, Vec2::ZERO, None).err(),
            Some(RenderError::NotDrawing("ShapeRenderer"))
        );
        shapes.begin(&mut ctx, shader.clone()).unwrap();
        assert!(shapes.begin(&mut ctx, shader).is_err());
        assert!(matches!(
            shapes.circle(&mut ctx, true, Vec2::ZERO, 1.0, None, 3),
            Err(RenderError::CapacityExceeded { requested: 9, capacity: 8, .. })
        ));
        shapes.end(&mut ctx).unwrap();

        let gl = ctx.backend::<HeadlessContext>().unwrap();
        assert!(matches!(gl.commands().last(), Some(GlCommand::SetBlend(None))));
    }
}
