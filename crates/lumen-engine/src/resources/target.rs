use crate::gfx::{
    Backend, Filter, FramebufferId, GfxError, PixelFormat, TextureDesc, TextureId, Viewport, Wrap,
};

/// Offscreen framebuffer rendering into its own colour texture.
#[derive(Debug)]
pub struct RenderTarget {
    framebuffer: FramebufferId,
    texture: TextureId,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// RGBA8 target sampled with linear filtering and clamped edges.
    pub fn create<B: Backend>(gfx: &mut B, width: u32, height: u32) -> Result<Self, GfxError> {
        Self::with_desc(
            gfx,
            TextureDesc {
                width,
                height,
                format: PixelFormat::Rgba8Unorm,
                filter: Filter::Linear,
                wrap: Wrap::ClampToEdge,
            },
        )
    }

    /// Fails with [`GfxError::UnsupportedRenderTargetFormat`] when the backend cannot
    /// render into `desc.format`; the colour texture is released again in that case.
    pub fn with_desc<B: Backend>(gfx: &mut B, desc: TextureDesc) -> Result<Self, GfxError> {
        let texture = gfx.create_texture(&desc, None)?;
        let framebuffer = match gfx.create_framebuffer(texture) {
            Ok(id) => id,
            Err(err) => {
                gfx.release_texture(texture)?;
                return Err(err);
            }
        };
        log::debug!("render target {}x{} {:?}", desc.width, desc.height, desc.format);
        Ok(Self {
            framebuffer,
            texture,
            width: desc.width,
            height: desc.height,
        })
    }

    /// Redirects draws and clears here and resets the viewport to the whole target.
    pub fn bind<B: Backend>(&self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.bind_framebuffer(Some(self.framebuffer))?;
        gfx.set_viewport(Viewport::full(self.width, self.height));
        Ok(())
    }

    /// Restores the presented surface and resets the viewport to its size.
    pub fn bind_default<B: Backend>(gfx: &mut B) -> Result<(), GfxError> {
        gfx.bind_framebuffer(None)?;
        let (width, height) = gfx.surface_size();
        gfx.set_viewport(Viewport::full(width, height));
        Ok(())
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    #[inline]
    pub fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Releases the framebuffer, then its colour texture.
    pub fn release<B: Backend>(self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.release_framebuffer(self.framebuffer)?;
        gfx.release_texture(self.texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::SoftwareBackend;
    use crate::gfx::software::Op;

    #[test]
    fn bind_resets_viewport_both_ways() {
        let mut gfx = SoftwareBackend::new(800, 600);
        let target = RenderTarget::create(&mut gfx, 64, 32).unwrap();

        target.bind(&mut gfx).unwrap();
        assert_eq!(gfx.viewport(), Viewport::full(64, 32));
        assert_eq!(gfx.bound_framebuffer(), Some(target.framebuffer()));

        RenderTarget::bind_default(&mut gfx).unwrap();
        assert_eq!(gfx.viewport(), Viewport::full(800, 600));
        assert_eq!(gfx.bound_framebuffer(), None);
    }

    #[test]
    fn unrenderable_format_leaves_nothing_behind() {
        let mut gfx = SoftwareBackend::new(8, 8);
        let desc = TextureDesc {
            format: PixelFormat::Rgb8Unorm,
            ..TextureDesc::rgba8(4, 4)
        };
        let err = RenderTarget::with_desc(&mut gfx, desc).unwrap_err();
        assert!(matches!(
            err,
            GfxError::UnsupportedRenderTargetFormat(PixelFormat::Rgb8Unorm)
        ));
        assert_eq!(gfx.live_resources(), 0);
    }

    #[test]
    fn release_frees_framebuffer_first() {
        let mut gfx = SoftwareBackend::new(8, 8);
        let target = RenderTarget::create(&mut gfx, 4, 4).unwrap();
        let (fb, tex) = (target.framebuffer(), target.texture());
        gfx.take_journal();
        target.release(&mut gfx).unwrap();
        assert_eq!(
            gfx.take_journal(),
            vec![Op::ReleaseFramebuffer(fb), Op::ReleaseTexture(tex)]
        );
    }
}
