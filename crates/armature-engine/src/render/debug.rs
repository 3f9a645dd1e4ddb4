use glam::Vec2;

use crate::device::{BlendFactor, BlendFactors, ManagedContext, RenderResult};
use crate::paint::Color;

use super::shapes::ShapeRenderer;

/// A bone in world space.
#[derive(Debug, Clone, Copy)]
pub struct DebugBone<'a> {
    pub name: &'a str,
    pub world: Vec2,
    pub length: f32,
    /// First column of the world transform (`a`, `c`).
    pub a: f32,
    pub c: f32,
    pub has_parent: bool,
}

/// A mesh attachment in world space.
#[derive(Debug, Clone, Copy)]
pub struct DebugMesh<'a> {
    pub positions: &'a [f32],
    pub triangles: &'a [u16],
    /// Number of hull floats at the start of `positions`.
    pub hull_length: usize,
}

/// A bounding-box attachment polygon and its editor color.
#[derive(Debug, Clone, Copy)]
pub struct DebugPolygon<'a> {
    pub vertices: &'a [f32],
    pub color: Color,
}

/// World-space skeleton data for debug drawing. Empty by default.
pub trait SkeletonDebugSource {
    fn position(&self) -> Vec2;

    fn bones(&self) -> Vec<DebugBone<'_>>;

    /// Corner positions (`x, y` × 4) of every visible region attachment.
    fn region_outlines(&self) -> Vec<[f32; 8]> {
        Vec::new()
    }

    fn meshes(&self) -> Vec<DebugMesh<'_>> {
        Vec::new()
    }

    fn bounding_boxes(&self) -> Vec<DebugPolygon<'_>> {
        Vec::new()
    }

    fn clipping_polygons(&self) -> Vec<&[f32]> {
        Vec::new()
    }
}

/// Draws bones, attachment outlines, mesh triangles/hulls, bounds and
/// clipping polygons through a [`ShapeRenderer`].
#[derive(Debug, Clone)]
pub struct SkeletonDebugRenderer {
    pub bone_line_color: Color,
    pub bone_origin_color: Color,
    pub attachment_line_color: Color,
    pub triangle_line_color: Color,
    pub clip_color: Color,
    pub aabb_color: Color,

    pub draw_bones: bool,
    pub draw_region_attachments: bool,
    pub draw_bounding_boxes: bool,
    pub draw_mesh_hull: bool,
    pub draw_mesh_triangles: bool,
    pub draw_skeleton_xy: bool,
    pub draw_clipping: bool,

    pub premultiplied_alpha: bool,
    pub scale: f32,
    pub bone_width: f32,
}

impl Default for SkeletonDebugRenderer {
    fn default() -> Self {
        Self {
            bone_line_color: Color::new(1.0, 0.0, 0.0, 1.0),
            bone_origin_color: Color::new(0.0, 1.0, 0.0, 1.0),
            attachment_line_color: Color::new(0.0, 0.0, 1.0, 0.5),
            triangle_line_color: Color::new(1.0, 0.64, 0.0, 0.5),
            clip_color: Color::new(0.8, 0.0, 0.0, 2.0),
            aabb_color: Color::new(0.0, 1.0, 0.0, 0.5),
            draw_bones: true,
            draw_region_attachments: true,
            draw_bounding_boxes: true,
            draw_mesh_hull: true,
            draw_mesh_triangles: true,
            draw_skeleton_xy: false,
            draw_clipping: true,
            premultiplied_alpha: false,
            scale: 1.0,
            bone_width: 2.0,
        }
    }
}

impl SkeletonDebugRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws into an open shape session. Bones named in `ignored_bones` are skipped.
    pub fn draw(
        &self,
        ctx: &mut ManagedContext,
        shapes: &mut ShapeRenderer,
        skeleton: &dyn SkeletonDebugSource,
        ignored_bones: &[&str],
    ) -> RenderResult<()> {
        let src_color = if self.premultiplied_alpha {
            BlendFactor::One
        } else {
            BlendFactor::SrcAlpha
        };
        shapes.set_blend_mode(
            ctx,
            BlendFactors {
                src_color,
                src_alpha: BlendFactor::One,
                dst: BlendFactor::OneMinusSrcAlpha,
            },
        )?;

        let bones: Vec<_> = skeleton
            .bones()
            .into_iter()
            .filter(|b| !ignored_bones.contains(&b.name))
            .collect();

        if self.draw_bones {
            shapes.set_color(self.bone_line_color);
            for bone in bones.iter().filter(|b| b.has_parent) {
                let tip = bone.world + Vec2::new(bone.a, bone.c) * bone.length;
                shapes.rect_line(ctx, true, bone.world, tip, self.bone_width * self.scale, None)?;
            }
            if self.draw_skeleton_xy {
                shapes.x(ctx, skeleton.position(), 4.0 * self.scale)?;
            }
        }

        if self.draw_region_attachments {
            shapes.set_color(self.attachment_line_color);
            for v in skeleton.region_outlines() {
                let corner = |i: usize| Vec2::new(v[i * 2], v[i * 2 + 1]);
                for i in 0..4 {
                    shapes.line(ctx, corner(i), corner((i + 1) % 4), None)?;
                }
            }
        }

        if self.draw_mesh_hull || self.draw_mesh_triangles {
            for mesh in skeleton.meshes() {
                self.draw_mesh(ctx, shapes, &mesh)?;
            }
        }

        if self.draw_bounding_boxes {
            let boxes = skeleton.bounding_boxes();
            if let Some((min, max)) = bounds(&boxes) {
                shapes.set_color(self.aabb_color);
                let size = max - min;
                shapes.rect(ctx, false, min.x, min.y, size.x, size.y, None)?;
            }
            for polygon in &boxes {
                shapes.set_color(polygon.color);
                shapes.polygon(ctx, polygon.vertices, 0, polygon.vertices.len() / 2, None)?;
            }
        }

        if self.draw_bones {
            shapes.set_color(self.bone_origin_color);
            for bone in &bones {
                shapes.circle(ctx, true, bone.world, 3.0 * self.scale, None, 8)?;
            }
        }

        if self.draw_clipping {
            shapes.set_color(self.clip_color);
            for polygon in skeleton.clipping_polygons() {
                let n = polygon.len() / 2;
                let point = |i: usize| Vec2::new(polygon[i * 2], polygon[i * 2 + 1]);
                for i in 0..n {
                    shapes.line(ctx, point(i), point((i + 1) % n), None)?;
                }
            }
        }
        Ok(())
    }

    fn draw_mesh(
        &self,
        ctx: &mut ManagedContext,
        shapes: &mut ShapeRenderer,
        mesh: &DebugMesh<'_>,
    ) -> RenderResult<()> {
        let v = mesh.positions;
        let point = |i: usize| Vec2::new(v[i * 2], v[i * 2 + 1]);

        if self.draw_mesh_triangles {
            shapes.set_color(self.triangle_line_color);
            for tri in mesh.triangles.chunks_exact(3) {
                let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| point(i as usize));
                shapes.triangle(ctx, false, a, b, c, None)?;
            }
        }

        let hull = (mesh.hull_length / 2).min(v.len() / 2);
        if self.draw_mesh_hull && hull > 0 {
            shapes.set_color(self.attachment_line_color);
            let mut last = point(hull - 1);
            for i in 0..hull {
                let p = point(i);
                shapes.line(ctx, p, last, None)?;
                last = p;
            }
        }
        Ok(())
    }
}

/// Axis-aligned bounds of all polygon vertices.
fn bounds(polygons: &[DebugPolygon<'_>]) -> Option<(Vec2, Vec2)> {
    polygons
        .iter()
        .flat_map(|p| p.vertices.chunks_exact(2))
        .map(|xy| Vec2::new(xy[0], xy[1]))
        .fold(None, |acc, p| match acc {
            None => Some((p, p)),
            Some((min, max)) => Some((min.min(p), max.max(p))),
        })
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::device::{DrawRecord, HeadlessContext, Primitive};
    use crate::render::shader::Shader;

    #[derive(Default)]
    struct Rig {
        bones: Vec<(&'static str, Vec2, f32, bool)>,
        regions: Vec<[f32; 8]>,
        mesh: Option<(Vec<f32>, Vec<u16>, usize)>,
        boxes: Vec<Vec<f32>>,
        clips: Vec<Vec<f32>>,
    }

    impl SkeletonDebugSource for Rig {
        fn position(&self) -> Vec2 {
            Vec2::ZERO
        }

        fn bones(&self) -> Vec<DebugBone<'_>> {
            self.bones
                .iter()
                .map(|&(name, world, length, has_parent)| DebugBone {
                    name,
                    world,
                    length,
                    a: 1.0,
                    c: 0.0,
                    has_parent,
                })
                .collect()
        }

        fn region_outlines(&self) -> Vec<[f32; 8]> {
            self.regions.clone()
        }

        fn meshes(&self) -> Vec<DebugMesh<'_>> {
            self.mesh
                .iter()
                .map(|(positions, triangles, hull_length)| DebugMesh {
                    positions,
                    triangles,
                    hull_length: *hull_length,
                })
                .collect()
        }

        fn bounding_boxes(&self) -> Vec<DebugPolygon<'_>> {
            self.boxes
                .iter()
                .map(|vertices| DebugPolygon {
                    vertices,
                    color: Color::MAGENTA,
                })
                .collect()
        }

        fn clipping_polygons(&self) -> Vec<&[f32]> {
            self.clips.iter().map(Vec::as_slice).collect()
        }
    }

    fn render(rig: &Rig, debug: &SkeletonDebugRenderer, ignored: &[&str]) -> Vec<DrawRecord> {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let shader = Rc::new(Shader::new_colored(&mut ctx).unwrap());
        let mut shapes = ShapeRenderer::new(&mut ctx, 1024).unwrap();
        shapes.begin(&mut ctx, shader).unwrap();
        debug.draw(&mut ctx, &mut shapes, rig, ignored).unwrap();
        shapes.end(&mut ctx).unwrap();
        ctx.backend::<HeadlessContext>().unwrap().draws().cloned().collect()
    }

    fn summary(draws: &[DrawRecord]) -> Vec<(Primitive, u32)> {
        draws.iter().map(|d| (d.primitive, d.count)).collect()
    }

    fn two_bones() -> Rig {
        Rig {
            bones: vec![
                ("root", Vec2::ZERO, 0.0, false),
                ("arm", Vec2::new(1.0, 1.0), 10.0, true),
            ],
            ..Rig::default()
        }
    }

    #[test]
    fn bones_draw_lines_for_children_and_origins_for_all() {
        let draws = render(&two_bones(), &SkeletonDebugRenderer::new(), &[]);
        // One bone rectangle plus two 8-segment origin circles, all filled.
        assert_eq!(summary(&draws), vec![(Primitive::Triangles, 6 + 2 * 24)]);

        let v = &draws[0].vertices;
        assert_eq!(&v[2..6], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(&v[6 * 6 + 2..6 * 6 + 6], &[0.0, 1.0, 0.0, 1.0]);
        // Bone runs along +x from (1, 1) to (11, 1), width 2.
        assert_eq!(&v[0..2], &[1.0, 0.0]);
        assert_eq!(&v[12..14], &[11.0, 0.0]);
    }

    #[test]
    fn ignored_bones_are_skipped() {
        let draws = render(&two_bones(), &SkeletonDebugRenderer::new(), &["arm"]);
        assert_eq!(summary(&draws), vec![(Primitive::Triangles, 24)]);
    }

    #[test]
    fn region_outline_and_mesh() {
        let rig = Rig {
            regions: vec![[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]],
            mesh: Some((vec![0.0, 0.0, 2.0, 0.0, 2.0, 2.0, 0.0, 2.0], vec![0, 1, 2, 2, 3, 0], 8)),
            ..Rig::default()
        };
        let draws = render(&rig, &SkeletonDebugRenderer::new(), &[]);
        // 4 region edges + 2 outlined triangles + 4 hull edges.
        assert_eq!(summary(&draws), vec![(Primitive::Lines, 8 + 12 + 8)]);

        let v = &draws[0].vertices;
        assert_eq!(&v[2..6], &[0.0, 0.0, 1.0, 0.5]);
        assert_eq!(&v[8 * 6 + 2..8 * 6 + 6], &[1.0, 0.64, 0.0, 0.5]);
        // Hull starts from the last hull vertex back to the first.
        assert_eq!(&v[20 * 6..20 * 6 + 2], &[0.0, 0.0]);
        assert_eq!(&v[21 * 6..21 * 6 + 2], &[0.0, 2.0]);
    }

    #[test]
    fn bounding_boxes_draw_aabb_then_polygons() {
        let rig = Rig {
            boxes: vec![vec![0.0, 0.0, 4.0, 0.0, 4.0, 3.0], vec![-1.0, 1.0, 0.0, 5.0, 1.0, 1.0]],
            ..Rig::default()
        };
        let draws = render(&rig, &SkeletonDebugRenderer::new(), &[]);
        assert_eq!(summary(&draws), vec![(Primitive::Lines, 8 + 6 + 6)]);

        let v = &draws[0].vertices;
        assert_eq!(&v[0..6], &[-1.0, 0.0, 0.0, 1.0, 0.0, 0.5]);
        assert_eq!(&v[2 * 6..2 * 6 + 2], &[4.0, 0.0]);
        assert_eq!(&v[4 * 6..4 * 6 + 2], &[4.0, 5.0]);
        assert_eq!(&v[8 * 6 + 2..8 * 6 + 6], &[1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn clipping_polygons_are_closed() {
        let rig = Rig {
            clips: vec![vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]],
            ..Rig::default()
        };
        let draws = render(&rig, &SkeletonDebugRenderer::new(), &[]);
        assert_eq!(summary(&draws), vec![(Primitive::Lines, 6)]);
        let v = &draws[0].vertices;
        assert_eq!(&v[5 * 6..5 * 6 + 6], &[0.0, 0.0, 0.8, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn toggles_and_premultiplied_blend() {
        let debug = SkeletonDebugRenderer {
            draw_bones: false,
            premultiplied_alpha: true,
            ..SkeletonDebugRenderer::default()
        };
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let shader = Rc::new(Shader::new_colored(&mut ctx).unwrap());
        let mut shapes = ShapeRenderer::new(&mut ctx, 64).unwrap();
        shapes.begin(&mut ctx, shader).unwrap();
        debug.draw(&mut ctx, &mut shapes, &two_bones(), &[]).unwrap();

        let gl = ctx.backend::<HeadlessContext>().unwrap();
        assert_eq!(gl.blend().map(|b| b.src_color), Some(BlendFactor::One));
        shapes.end(&mut ctx).unwrap();
        assert_eq!(ctx.backend::<HeadlessContext>().unwrap().draw_count(), 0);
    }
}
