use glam::{Mat4, Vec3};

use crate::gfx::uniform_names;
use crate::gfx::{Backend, Color, GfxError, TextureId, Viewport};
use crate::resources::{GeometryBuffer, ShaderProgram, VertexLayout};
use crate::shaders;
use crate::transform::pixel_ortho;

/// Unit square, position (xy) + uv, top-left first. Pixel space has +Y down, so uv and
/// position agree.
const QUAD_VERTICES: [f32; 16] = [
    0.0, 0.0, 0.0, 0.0, //
    1.0, 0.0, 1.0, 0.0, //
    1.0, 1.0, 1.0, 1.0, //
    0.0, 1.0, 0.0, 1.0, //
];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Draws a texture as a screen-aligned quad in pixel coordinates.
#[derive(Debug)]
pub struct Compositor {
    program: ShaderProgram,
    quad: GeometryBuffer,
}

impl Compositor {
    pub fn create<B: Backend>(gfx: &mut B) -> Result<Self, GfxError> {
        let program = ShaderProgram::from_module(gfx, shaders::COMPOSITE)?;
        let quad = match GeometryBuffer::create_indexed(
            gfx,
            VertexLayout::interleaved(&[2, 2]),
            &QUAD_VERTICES,
            &QUAD_INDICES,
        ) {
            Ok(quad) => quad,
            Err(err) => {
                program.release(gfx)?;
                return Err(err);
            }
        };
        Ok(Self { program, quad })
    }

    /// Draws `texture` into `rect`, given in pixels of the presented surface. The default
    /// target must be bound.
    pub fn draw<B: Backend>(
        &self,
        gfx: &mut B,
        texture: TextureId,
        rect: Viewport,
    ) -> Result<(), GfxError> {
        let (width, height) = gfx.surface_size();
        let world = Mat4::from_translation(Vec3::new(rect.x as f32, rect.y as f32, 0.0))
            * Mat4::from_scale(Vec3::new(rect.width as f32, rect.height as f32, 1.0));

        gfx.set_depth_test(false);
        gfx.set_stencil_test(false);
        gfx.bind_texture(0, Some(texture))?;
        self.program.activate(gfx)?;
        self.program.set(gfx, uniform_names::WORLD_MATRIX, world)?;
        self.program.set(
            gfx,
            uniform_names::PROJECTION_MATRIX,
            pixel_ortho(width as f32, height as f32),
        )?;
        self.program.set(gfx, uniform_names::COLOR, Color::WHITE)?;
        self.program.set(gfx, uniform_names::COLOR_TEXTURE, 0i32)?;
        self.quad.draw(gfx)
    }

    /// Releases the quad, then the program.
    pub fn release<B: Backend>(self, gfx: &mut B) -> Result<(), GfxError> {
        self.quad.release(gfx)?;
        self.program.release(gfx)
    }
}
