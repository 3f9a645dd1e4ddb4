use crate::device::{ManagedContext, RenderError, RenderResult};
use crate::paint::Color;

use super::batcher::PolygonBatcher;
use super::blend::BlendMode;
use super::texture::GlTexture;

/// Triangulation of a four-corner region attachment.
pub const QUAD_TRIANGLES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Renderable geometry of one slot, already posed in world space by the animation core.
#[derive(Clone, Copy)]
pub struct SlotGeometry<'a> {
    pub texture: &'a GlTexture,
    /// World positions, `x, y` per vertex.
    pub positions: &'a [f32],
    /// Texture coordinates, `u, v` per vertex.
    pub uvs: &'a [f32],
    pub triangles: &'a [u16],
    pub slot_color: Color,
    pub attachment_color: Color,
    /// Dark tint of the slot, for two-color tinting.
    pub dark_color: Option<Color>,
    pub blend_mode: BlendMode,
}

/// What the renderer needs from a posed skeleton.
///
/// Slots are addressed by draw-order position `0..slot_count()`.
pub trait SkeletonSource {
    fn color(&self) -> Color;

    fn slot_count(&self) -> usize;

    /// Setup-pose index of the slot at draw-order position `i`.
    fn slot_index(&self, i: usize) -> usize;

    /// Whether the slot's bone is active. Inactive slots are skipped entirely.
    fn is_active(&self, _i: usize) -> bool {
        true
    }

    /// `None` when the slot has nothing to draw.
    fn geometry(&self, i: usize) -> Option<SlotGeometry<'_>>;
}

/// Inclusive range of slots to draw, by setup-pose slot index.
///
/// Drawing starts at the slot whose index is `start` and stops after the slot
/// whose index is `end`, following draw order. `None` leaves a side open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl SlotRange {
    pub const ALL: SlotRange = SlotRange { start: None, end: None };

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Callback over the interleaved vertices of one slot: `(vertices, vertex_count, vertex_size)`.
pub type VertexTransformer<'t> = dyn FnMut(&mut [f32], usize, usize) + 't;

/// Converts slot geometry into batcher draws.
pub struct SkeletonRenderer {
    /// Write premultiplied vertex colors and use premultiplied blend functions.
    pub premultiplied_alpha: bool,
    two_color_tint: bool,
    vertices: Vec<f32>,
}

impl SkeletonRenderer {
    pub fn new(two_color_tint: bool) -> Self {
        Self {
            premultiplied_alpha: false,
            two_color_tint,
            vertices: Vec::new(),
        }
    }

    pub fn two_color_tint(&self) -> bool {
        self.two_color_tint
    }

    /// Floats per vertex this renderer writes.
    pub fn vertex_size(&self) -> usize {
        if self.two_color_tint { 12 } else { 8 }
    }

    /// Draws the slots of `skeleton` within `range` into an open batcher session.
    pub fn draw(
        &mut self,
        ctx: &mut ManagedContext,
        batcher: &mut PolygonBatcher,
        skeleton: &dyn SkeletonSource,
        range: SlotRange,
        mut transformer: Option<&mut VertexTransformer<'_>>,
    ) -> RenderResult<()> {
        let vertex_size = self.vertex_size();
        if batcher.vertex_size() != vertex_size {
            return Err(RenderError::InvalidLayout(
                "batcher and skeleton renderer disagree on two-color tint",
            ));
        }

        let pma = self.premultiplied_alpha;
        let skeleton_color = skeleton.color();
        let mut blend_mode = None;
        let mut in_range = range.start.is_none();

        for i in 0..skeleton.slot_count() {
            if !skeleton.is_active(i) {
                continue;
            }
            let index = skeleton.slot_index(i);
            if range.start == Some(index) {
                in_range = true;
            }
            if !in_range {
                continue;
            }
            if range.end == Some(index) {
                in_range = false;
            }

            let Some(geometry) = skeleton.geometry(i) else {
                continue;
            };
            let count = geometry.positions.len() / 2;
            if geometry.uvs.len() != geometry.positions.len() {
                return Err(RenderError::InvalidShape("slot uvs and positions differ in length"));
            }

            let mut color = skeleton_color
                .mul(geometry.slot_color)
                .mul(geometry.attachment_color);
            if pma {
                color = color.premultiplied();
            }
            let dark = match geometry.dark_color {
                None => Color::BLACK,
                Some(d) if pma => Color::new(d.r * color.a, d.g * color.a, d.b * color.a, 1.0),
                Some(d) => d.with_alpha(0.0),
            };

            if blend_mode != Some(geometry.blend_mode) {
                blend_mode = Some(geometry.blend_mode);
                batcher.set_blend_mode(ctx, geometry.blend_mode, pma)?;
            }

            self.vertices.clear();
            for (xy, uv) in geometry
                .positions
                .chunks_exact(2)
                .zip(geometry.uvs.chunks_exact(2))
            {
                self.vertices.extend_from_slice(xy);
                self.vertices.extend_from_slice(&color.to_array());
                self.vertices.extend_from_slice(uv);
                if self.two_color_tint {
                    self.vertices.extend_from_slice(&dark.to_array());
                }
            }

            if let Some(transform) = transformer.as_deref_mut() {
                transform(self.vertices.as_mut_slice(), count, vertex_size);
            }
            batcher.draw(ctx, geometry.texture, &self.vertices, geometry.triangles)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::device::{DrawRecord, HeadlessContext, TextureImage};
    use crate::render::batcher::BatcherConfig;
    use crate::render::shader::Shader;
    use crate::render::texture::TextureConfig;

    pub(crate) struct TestSlot {
        pub index: usize,
        pub active: bool,
        pub positions: Vec<f32>,
        pub color: Color,
        pub dark: Option<Color>,
        pub blend: BlendMode,
    }

    pub(crate) struct TestSkeleton<'t> {
        pub texture: &'t GlTexture,
        pub color: Color,
        pub slots: Vec<TestSlot>,
    }

    const UVS: [f32; 8] = [0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];

    impl SkeletonSource for TestSkeleton<'_> {
        fn color(&self) -> Color {
            self.color
        }

        fn slot_count(&self) -> usize {
            self.slots.len()
        }

        fn slot_index(&self, i: usize) -> usize {
            self.slots[i].index
        }

        fn is_active(&self, i: usize) -> bool {
            self.slots[i].active
        }

        fn geometry(&self, i: usize) -> Option<SlotGeometry<'_>> {
            let slot = &self.slots[i];
            Some(SlotGeometry {
                texture: self.texture,
                positions: &slot.positions,
                uvs: &UVS,
                triangles: &QUAD_TRIANGLES,
                slot_color: slot.color,
                attachment_color: Color::WHITE,
                dark_color: slot.dark,
                blend_mode: slot.blend,
            })
        }
    }

    /// Unit quad at `(x, 0)`.
    pub(crate) fn slot(index: usize, x: f32) -> TestSlot {
        TestSlot {
            index,
            active: true,
            positions: vec![x, 0.0, x + 1.0, 0.0, x + 1.0, 1.0, x, 1.0],
            color: Color::WHITE,
            dark: None,
            blend: BlendMode::Normal,
        }
    }

    struct Fixture {
        ctx: ManagedContext,
        batcher: PolygonBatcher,
        shader: Rc<Shader>,
    }

    /// The texture is returned separately so skeletons can borrow it while
    /// the fixture is borrowed mutably.
    fn fixture(two_color_tint: bool) -> (Fixture, GlTexture) {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let shader = if two_color_tint {
            Shader::new_two_colored_textured(&mut ctx)
        } else {
            Shader::new_colored_textured(&mut ctx)
        };
        let shader = Rc::new(shader.unwrap());
        let config = BatcherConfig {
            two_color_tint,
            max_vertices: 64,
        };
        let batcher = PolygonBatcher::new(&mut ctx, config).unwrap();
        let image = TextureImage::new(1, 1, vec![255; 4]).unwrap();
        let texture = GlTexture::new(&mut ctx, image, TextureConfig::default()).unwrap();
        let fixture = Fixture {
            ctx,
            batcher,
            shader,
        };
        (fixture, texture)
    }

    fn render(
        f: &mut Fixture,
        renderer: &mut SkeletonRenderer,
        skeleton: &TestSkeleton<'_>,
        range: SlotRange,
    ) -> Vec<DrawRecord> {
        f.batcher.begin(&mut f.ctx, f.shader.clone()).unwrap();
        renderer
            .draw(&mut f.ctx, &mut f.batcher, skeleton, range, None)
            .unwrap();
        f.batcher.end(&mut f.ctx).unwrap();
        f.ctx.backend::<HeadlessContext>().unwrap().draws().cloned().collect()
    }

    #[test]
    fn premultiplied_colors_and_dark_tint() {
        let (mut f, texture) = fixture(true);
        let mut renderer = SkeletonRenderer::new(true);
        renderer.premultiplied_alpha = true;

        let mut tinted = slot(0, 0.0);
        tinted.color = Color::new(1.0, 0.5, 1.0, 0.5);
        tinted.dark = Some(Color::new(0.2, 0.4, 0.6, 0.9));
        let skeleton = TestSkeleton {
            texture: &texture,
            color: Color::WHITE,
            slots: vec![tinted, slot(1, 2.0)],
        };
        let draws = render(&mut f, &mut renderer, &skeleton, SlotRange::ALL);

        let v = &draws[0].vertices;
        assert_eq!(&v[2..6], &[0.5, 0.25, 0.5, 0.5]);
        assert_eq!(&v[6..8], &[0.0, 1.0]);
        assert_eq!(&v[8..12], &[0.1, 0.2, 0.3, 1.0]);
        // Second slot has no dark color.
        assert_eq!(&v[4 * 12 + 8..4 * 12 + 12], &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn straight_alpha_dark_tint_has_zero_alpha() {
        let (mut f, texture) = fixture(true);
        let mut renderer = SkeletonRenderer::new(true);
        let mut tinted = slot(0, 0.0);
        tinted.color = Color::new(1.0, 0.5, 1.0, 0.5);
        tinted.dark = Some(Color::new(0.2, 0.4, 0.6, 0.9));
        let skeleton = TestSkeleton {
            texture: &texture,
            color: Color::new(1.0, 1.0, 0.5, 1.0),
            slots: vec![tinted],
        };
        let draws = render(&mut f, &mut renderer, &skeleton, SlotRange::ALL);

        let v = &draws[0].vertices;
        assert_eq!(&v[2..6], &[1.0, 0.5, 0.5, 0.5]);
        assert_eq!(&v[8..12], &[0.2, 0.4, 0.6, 0.0]);
    }

    #[test]
    fn slot_range_is_inclusive_by_slot_index() {
        let (mut f, texture) = fixture(false);
        let mut renderer = SkeletonRenderer::new(false);
        // Draw order differs from slot index order.
        let skeleton = TestSkeleton {
            texture: &texture,
            color: Color::WHITE,
            slots: vec![slot(3, 0.0), slot(1, 10.0), slot(0, 20.0), slot(2, 30.0)],
        };
        let draws = render(&mut f, &mut renderer, &skeleton, SlotRange::new(1, 0));

        assert_eq!(draws.len(), 1);
        let xs: Vec<f32> = draws[0].vertices.chunks(8 * 4).map(|quad| quad[0]).collect();
        assert_eq!(xs, vec![10.0, 20.0]);
        assert_eq!(draws[0].indices, vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
    }

    #[test]
    fn inactive_slots_are_skipped_even_as_range_start() {
        let (mut f, texture) = fixture(false);
        let mut renderer = SkeletonRenderer::new(false);
        let mut inactive = slot(1, 10.0);
        inactive.active = false;
        let skeleton = TestSkeleton {
            texture: &texture,
            color: Color::WHITE,
            slots: vec![slot(0, 0.0), inactive, slot(2, 20.0)],
        };
        let draws = render(&mut f, &mut renderer, &skeleton, SlotRange::new(1, 2));
        assert!(draws.is_empty());
    }

    #[test]
    fn blend_mode_change_splits_batches() {
        let (mut f, texture) = fixture(false);
        let mut renderer = SkeletonRenderer::new(false);
        let mut additive = slot(1, 10.0);
        additive.blend = BlendMode::Additive;
        let skeleton = TestSkeleton {
            texture: &texture,
            color: Color::WHITE,
            slots: vec![slot(0, 0.0), additive, slot(2, 20.0)],
        };
        let draws = render(&mut f, &mut renderer, &skeleton, SlotRange::ALL);
        assert_eq!(draws.len(), 3);
    }

    #[test]
    fn transformer_sees_each_slot() {
        let (mut f, texture) = fixture(false);
        let mut renderer = SkeletonRenderer::new(false);
        let skeleton = TestSkeleton {
            texture: &texture,
            color: Color::WHITE,
            slots: vec![slot(0, 0.0), slot(1, 5.0)],
        };

        let mut calls = Vec::new();
        let mut shift = |v: &mut [f32], count: usize, stride: usize| {
            calls.push((count, stride));
            for vertex in v.chunks_mut(stride) {
                vertex[0] += 100.0;
            }
        };
        f.batcher.begin(&mut f.ctx, f.shader.clone()).unwrap();
        renderer
            .draw(&mut f.ctx, &mut f.batcher, &skeleton, SlotRange::ALL, Some(&mut shift))
            .unwrap();
        f.batcher.end(&mut f.ctx).unwrap();

        assert_eq!(calls, vec![(4, 8), (4, 8)]);
        let gl = f.ctx.backend::<HeadlessContext>().unwrap();
        let draw = gl.draws().next().unwrap();
        assert_eq!(draw.vertices[0], 100.0);
        assert_eq!(draw.vertices[4 * 8], 105.0);
    }

    #[test]
    fn layout_mismatch_is_rejected() {
        let (mut f, texture) = fixture(false);
        let mut renderer = SkeletonRenderer::new(true);
        let skeleton = TestSkeleton {
            texture: &texture,
            color: Color::WHITE,
            slots: vec![slot(0, 0.0)],
        };
        f.batcher.begin(&mut f.ctx, f.shader.clone()).unwrap();
        assert!(matches!(
            renderer.draw(&mut f.ctx, &mut f.batcher, &skeleton, SlotRange::ALL, None),
            Err(RenderError::InvalidLayout(_))
        ));
    }
}
