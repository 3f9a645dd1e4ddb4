use anyhow::{Context, Result};
use glam::Vec2;

use armature_engine::device::{ManagedContext, TextureImage};
use armature_engine::paint::Color;
use armature_engine::render::{
    BlendMode, DebugBone, DebugPolygon, GlTexture, QUAD_TRIANGLES, SkeletonDebugSource,
    SkeletonSource, SlotGeometry, TextureConfig,
};

const UVS: [f32; 8] = [0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];

struct Bone {
    name: &'static str,
    length: f32,
    /// Rest rotation relative to the parent, in degrees.
    rest: f32,
    world: Vec2,
    /// World direction (`a`, `c`).
    dir: Vec2,
}

struct Slot {
    bone: usize,
    width: f32,
    color: Color,
    dark: Option<Color>,
    blend: BlendMode,
    positions: [f32; 8],
}

/// A swaying chain of bones with one textured quad per bone.
///
/// Stands in for a posed skeleton from an animation runtime.
pub struct Rig {
    texture: GlTexture,
    position: Vec2,
    bones: Vec<Bone>,
    slots: Vec<Slot>,
    bounds: [f32; 8],
}

impl Rig {
    pub fn new(ctx: &mut ManagedContext, position: Vec2) -> Result<Self> {
        let texture = GlTexture::new(ctx, checkerboard(64, 8)?, TextureConfig::default())
            .context("failed to upload rig texture")?;

        let bones = [("root", 120.0, 90.0), ("spine", 100.0, 0.0), ("neck", 70.0, 0.0), ("head", 50.0, 0.0)]
            .into_iter()
            .map(|(name, length, rest)| Bone {
                name,
                length,
                rest,
                world: Vec2::ZERO,
                dir: Vec2::X,
            })
            .collect::<Vec<_>>();

        let slots = bones
            .iter()
            .enumerate()
            .map(|(i, _)| Slot {
                bone: i,
                width: 60.0 - i as f32 * 10.0,
                color: Color::new(1.0, 1.0 - i as f32 * 0.2, 0.6 + i as f32 * 0.1, 1.0),
                dark: (i % 2 == 1).then_some(Color::new(0.2, 0.0, 0.3, 1.0)),
                blend: if i == 3 { BlendMode::Additive } else { BlendMode::Normal },
                positions: [0.0; 8],
            })
            .collect();

        let mut rig = Self {
            texture,
            position,
            bones,
            slots,
            bounds: [0.0; 8],
        };
        rig.pose(0.0);
        Ok(rig)
    }

    /// Poses the chain at `time` seconds.
    pub fn pose(&mut self, time: f32) {
        let mut origin = self.position;
        let mut angle = 0.0f32;
        for (i, bone) in self.bones.iter_mut().enumerate() {
            let sway = if i == 0 { 0.0 } else { (time * 1.7 + i as f32).sin() * 18.0 };
            angle += bone.rest + sway;
            bone.world = origin;
            bone.dir = Vec2::from_angle(angle.to_radians());
            origin += bone.dir * bone.length;
        }

        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for slot in &mut self.slots {
            let bone = &self.bones[slot.bone];
            let normal = bone.dir.perp() * (slot.width / 2.0);
            let tip = bone.world + bone.dir * bone.length;
            let corners = [bone.world - normal, bone.world + normal, tip + normal, tip - normal];
            for (k, c) in corners.iter().enumerate() {
                slot.positions[k * 2] = c.x;
                slot.positions[k * 2 + 1] = c.y;
                min = min.min(*c);
                max = max.max(*c);
            }
        }
        self.bounds = [min.x, min.y, max.x, min.y, max.x, max.y, min.x, max.y];
    }

    pub fn texture(&self) -> &GlTexture {
        &self.texture
    }

    pub fn dispose(&self, ctx: &mut ManagedContext) {
        self.texture.dispose(ctx);
    }
}

impl SkeletonSource for Rig {
    fn color(&self) -> Color {
        Color::WHITE
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot_index(&self, i: usize) -> usize {
        i
    }

    fn geometry(&self, i: usize) -> Option<SlotGeometry<'_>> {
        let slot = self.slots.get(i)?;
        Some(SlotGeometry {
            texture: &self.texture,
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

impl SkeletonDebugSource for Rig {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn bones(&self) -> Vec<DebugBone<'_>> {
        self.bones
            .iter()
            .enumerate()
            .map(|(i, b)| DebugBone {
                name: b.name,
                world: b.world,
                length: b.length,
                a: b.dir.x,
                c: b.dir.y,
                has_parent: i > 0,
            })
            .collect()
    }

    fn region_outlines(&self) -> Vec<[f32; 8]> {
        self.slots.iter().map(|s| s.positions).collect()
    }

    fn bounding_boxes(&self) -> Vec<DebugPolygon<'_>> {
        vec![DebugPolygon {
            vertices: &self.bounds,
            color: Color::GREEN,
        }]
    }
}

/// Two-tone RGBA checkerboard of `size`² texels with `cell`-sized squares.
pub fn checkerboard(size: u32, cell: u32) -> Result<TextureImage> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            let v = if light { 230 } else { 90 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    TextureImage::new(size, size, pixels).context("checkerboard has an invalid size")
}
