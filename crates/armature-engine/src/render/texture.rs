use std::cell::Cell;

use crate::device::{
    ManagedContext, RenderError, RenderResult, Restorable, RestorableId, TextureFilter, TextureId,
    TextureImage, TextureParams, TextureWrap,
};

/// Upload options for [`GlTexture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureConfig {
    /// Multiply RGB by alpha before upload. Use with premultiplied-alpha batching.
    pub premultiply_alpha: bool,
    /// Build a mip chain and sample it with `MipMapLinearLinear`.
    pub use_mip_maps: bool,
}

/// An RGBA8 texture with a CPU copy of its pixels for restoration.
///
/// Identity for batching is [`key`](Self::key), which is stable across
/// context restorations even though the backend handle is not.
pub struct GlTexture {
    id: RestorableId,
    image: TextureImage,
    params: TextureParams,
    handle: Cell<Option<TextureId>>,
    epoch: Cell<u64>,
    disposed: Cell<bool>,
}

impl GlTexture {
    pub fn new(
        ctx: &mut ManagedContext,
        mut image: TextureImage,
        config: TextureConfig,
    ) -> RenderResult<Self> {
        if config.premultiply_alpha {
            premultiply(image.pixels_mut());
        }

        let params = TextureParams {
            min_filter: if config.use_mip_maps {
                TextureFilter::MipMapLinearLinear
            } else {
                TextureFilter::Linear
            },
            use_mip_maps: config.use_mip_maps,
            ..TextureParams::default()
        };

        let handle = ctx.gl().create_texture(&image, &params)?;
        let id = ctx.add_restorable("texture");

        Ok(Self {
            id,
            image,
            params,
            handle: Cell::new(Some(handle)),
            epoch: Cell::new(ctx.epoch()),
            disposed: Cell::new(false),
        })
    }

    #[inline]
    pub fn key(&self) -> RestorableId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixels as uploaded (premultiplied when configured).
    pub fn image(&self) -> &TextureImage {
        &self.image
    }

    pub fn params(&self) -> TextureParams {
        self.params
    }

    /// Returns the live backend handle, re-uploading first if the context was restored.
    pub fn handle(&self, ctx: &mut ManagedContext) -> RenderResult<TextureId> {
        if self.disposed.get() {
            return Err(RenderError::ResourceCreation {
                what: "texture",
                reason: "used after dispose".into(),
            });
        }
        match self.handle.get() {
            Some(h) if self.epoch.get() == ctx.epoch() => Ok(h),
            _ => self.upload(ctx),
        }
    }

    fn upload(&self, ctx: &mut ManagedContext) -> RenderResult<TextureId> {
        let handle = ctx.gl().create_texture(&self.image, &self.params)?;
        self.handle.set(Some(handle));
        self.epoch.set(ctx.epoch());
        log::debug!(
            "texture {:?} uploaded ({}x{}) for epoch {}",
            self.id,
            self.width(),
            self.height(),
            ctx.epoch()
        );
        Ok(handle)
    }

    /// Sets min/mag filters. Mipmap min filters enable the mip chain; mag
    /// filters never sample mipmaps and fall back to `Linear`.
    pub fn set_filters(
        &mut self,
        ctx: &mut ManagedContext,
        min: TextureFilter,
        mag: TextureFilter,
    ) -> RenderResult<()> {
        let needs_mips = min.uses_mip_maps() && !self.params.use_mip_maps;
        self.params.min_filter = min;
        self.params.mag_filter = mag.as_mag_filter();
        self.params.use_mip_maps = min.uses_mip_maps();

        let handle = self.handle(ctx)?;
        if needs_mips {
            // Mip levels are fixed at creation; rebuild with a full chain.
            ctx.gl().delete_texture(handle);
            self.upload(ctx)?;
        } else {
            ctx.gl().set_texture_params(handle, &self.params);
        }
        Ok(())
    }

    pub fn set_wraps(
        &mut self,
        ctx: &mut ManagedContext,
        u: TextureWrap,
        v: TextureWrap,
    ) -> RenderResult<()> {
        self.params.wrap_u = u;
        self.params.wrap_v = v;
        let handle = self.handle(ctx)?;
        ctx.gl().set_texture_params(handle, &self.params);
        Ok(())
    }

    pub fn bind(&self, ctx: &mut ManagedContext, unit: u32) -> RenderResult<()> {
        let handle = self.handle(ctx)?;
        ctx.gl().bind_texture(unit, Some(handle));
        Ok(())
    }

    pub fn unbind(&self, ctx: &mut ManagedContext, unit: u32) {
        ctx.gl().bind_texture(unit, None);
    }

    pub fn dispose(&self, ctx: &mut ManagedContext) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            if self.epoch.get() == ctx.epoch() {
                ctx.gl().delete_texture(handle);
            }
        }
        ctx.remove_restorable(self.id);
    }
}

impl Restorable for GlTexture {
    fn restore(&mut self, ctx: &mut ManagedContext) -> RenderResult<()> {
        if let Some(handle) = self.handle.take() {
            if self.epoch.get() == ctx.epoch() {
                ctx.gl().delete_texture(handle);
            }
        }
        self.upload(ctx).map(|_| ())
    }
}

/// Multiplies RGB by alpha in place (RGBA8, rounding to nearest).
pub fn premultiply(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let a = px[3] as u32;
        for c in &mut px[..3] {
            *c = ((*c as u32 * a + 127) / 255) as u8;
        }
    }
}

/// A sub-rectangle of a texture in UV space.
#[derive(Clone, Copy)]
pub struct TextureRegion<'a> {
    pub texture: &'a GlTexture,
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
}

impl<'a> TextureRegion<'a> {
    /// The whole texture.
    pub fn full(texture: &'a GlTexture) -> Self {
        Self {
            texture,
            u: 0.0,
            v: 0.0,
            u2: 1.0,
            v2: 1.0,
        }
    }

    /// Region from pixel coordinates (top-left origin).
    pub fn from_pixels(texture: &'a GlTexture, x: u32, y: u32, width: u32, height: u32) -> Self {
        let (tw, th) = (texture.width() as f32, texture.height() as f32);
        Self {
            texture,
            u: x as f32 / tw,
            v: y as f32 / th,
            u2: (x + width) as f32 / tw,
            v2: (y + height) as f32 / th,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{GlCommand, HeadlessContext};

    fn image() -> TextureImage {
        TextureImage::new(2, 1, vec![255, 128, 0, 128, 10, 20, 30, 255]).unwrap()
    }

    fn headless(ctx: &ManagedContext) -> &HeadlessContext {
        ctx.backend::<HeadlessContext>().unwrap()
    }

    #[test]
    fn premultiply_scales_rgb_by_alpha() {
        let mut px = [255, 128, 0, 128, 10, 20, 30, 255, 200, 200, 200, 0];
        premultiply(&mut px);
        assert_eq!(px, [128, 64, 0, 128, 10, 20, 30, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn config_controls_upload() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let config = TextureConfig {
            premultiply_alpha: true,
            use_mip_maps: true,
        };
        let texture = GlTexture::new(&mut ctx, image(), config).unwrap();
        let handle = texture.handle(&mut ctx).unwrap();

        let gl = headless(&ctx);
        assert_eq!(gl.texture_pixels(handle).unwrap()[..4], [128, 64, 0, 128]);
        let params = gl.texture_params(handle).unwrap();
        assert!(params.use_mip_maps);
        assert_eq!(params.min_filter, TextureFilter::MipMapLinearLinear);
        assert_eq!(params.mag_filter, TextureFilter::Linear);
    }

    #[test]
    fn mipmap_mag_filter_collapses_to_linear() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let mut texture = GlTexture::new(&mut ctx, image(), TextureConfig::default()).unwrap();
        texture
            .set_filters(&mut ctx, TextureFilter::Nearest, TextureFilter::MipMapNearestNearest)
            .unwrap();

        let handle = texture.handle(&mut ctx).unwrap();
        let params = headless(&ctx).texture_params(handle).unwrap();
        assert_eq!(params.min_filter, TextureFilter::Nearest);
        assert_eq!(params.mag_filter, TextureFilter::Linear);
        assert!(!params.use_mip_maps);
    }

    #[test]
    fn enabling_mipmaps_rebuilds_the_texture() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let mut texture = GlTexture::new(&mut ctx, image(), TextureConfig::default()).unwrap();
        let before = texture.handle(&mut ctx).unwrap();
        texture
            .set_filters(&mut ctx, TextureFilter::MipMapLinearNearest, TextureFilter::Linear)
            .unwrap();
        let after = texture.handle(&mut ctx).unwrap();

        assert_ne!(before, after);
        assert_eq!(headless(&ctx).live_textures(), 1);
        assert!(headless(&ctx).texture_params(after).unwrap().use_mip_maps);
    }

    #[test]
    fn bind_after_restoration_uploads_again() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let texture = GlTexture::new(&mut ctx, image(), TextureConfig::default()).unwrap();
        let key = texture.key();

        ctx.restore_with(HeadlessContext::new());
        texture.bind(&mut ctx, 0).unwrap();

        let cmds = headless(&ctx).commands();
        assert!(matches!(cmds[0], GlCommand::CreateTexture { width: 2, height: 1, .. }));
        assert!(matches!(cmds[1], GlCommand::BindTexture { unit: 0, texture: Some(_) }));
        assert_eq!(texture.key(), key);
    }

    #[test]
    fn restore_in_same_context_replaces_texture() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let mut texture = GlTexture::new(&mut ctx, image(), TextureConfig::default()).unwrap();
        let before = texture.handle(&mut ctx).unwrap();

        texture.restore(&mut ctx).unwrap();
        texture.restore(&mut ctx).unwrap();
        assert_eq!(headless(&ctx).live_textures(), 1);
        assert_ne!(texture.handle(&mut ctx).unwrap(), before);

        texture.dispose(&mut ctx);
        assert_eq!(headless(&ctx).live_textures(), 0);
    }

    #[test]
    fn region_from_pixels_normalizes() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let texture = GlTexture::new(&mut ctx, image(), TextureConfig::default()).unwrap();
        let region = TextureRegion::from_pixels(&texture, 1, 0, 1, 1);
        assert_eq!((region.u, region.v, region.u2, region.v2), (0.5, 0.0, 1.0, 1.0));
    }
}
