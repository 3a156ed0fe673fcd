use crate::gfx::{Backend, GfxError, TextureDesc, TextureId};

/// A sampled texture uploaded from already-decoded pixels.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    desc: TextureDesc,
}

impl Texture {
    pub fn create<B: Backend>(
        gfx: &mut B,
        desc: TextureDesc,
        pixels: &[u8],
    ) -> Result<Self, GfxError> {
        let id = gfx.create_texture(&desc, Some(pixels))?;
        log::debug!("texture {}x{} {:?}", desc.width, desc.height, desc.format);
        Ok(Self { id, desc })
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn bind<B: Backend>(&self, gfx: &mut B, unit: u32) -> Result<(), GfxError> {
        gfx.bind_texture(unit, Some(self.id))
    }

    pub fn release<B: Backend>(self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.release_texture(self.id)
    }
}
