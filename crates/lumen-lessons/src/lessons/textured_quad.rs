use lumen_engine::core::Lesson;
use lumen_engine::gfx::uniform_names;
use lumen_engine::gfx::{Backend, ClearMask, GfxError};
use lumen_engine::resources::{GeometryBuffer, ShaderProgram, Texture, VertexLayout};
use lumen_engine::sequencer::{DrawCommand, SceneView};
use lumen_engine::shaders;

use super::create_checker_texture;

/// Position (xy) + uv, 16-byte stride. The image is mirrored horizontally.
#[rustfmt::skip]
const VERTICES: [f32; 16] = [
    -0.5,  0.5,   1.0, 0.0,
     0.5,  0.5,   0.0, 0.0,
     0.5, -0.5,   0.0, 1.0,
    -0.5, -0.5,   1.0, 1.0,
];
const INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

struct State {
    texture: Texture,
    program: ShaderProgram,
    quad: GeometryBuffer,
}

/// Indexed quad sampling an RGBA image bound to texture unit 0.
#[derive(Default)]
pub struct TexturedQuadLesson {
    state: Option<State>,
}

impl Lesson for TexturedQuadLesson {
    fn name(&self) -> &'static str {
        "textured-quad"
    }

    fn on_create<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        let texture = create_checker_texture(gfx)?;
        let program = ShaderProgram::from_module(gfx, shaders::TEXTURED)?;
        let quad = GeometryBuffer::create_indexed(
            gfx,
            VertexLayout::interleaved(&[2, 2]),
            &VERTICES,
            &INDICES,
        )?;
        self.state = Some(State {
            texture,
            program,
            quad,
        });
        Ok(())
    }

    fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.clear(ClearMask::ALL)?;
        let Some(state) = &self.state else {
            return Ok(());
        };
        state.texture.bind(gfx, 0)?;
        state.program.activate(gfx)?;
        state.program.set(gfx, uniform_names::COLOR_TEXTURE, 0i32)?;
        DrawCommand::new(&state.program, &state.quad).submit(gfx, &SceneView::IDENTITY)
    }

    fn on_close<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        if let Some(state) = self.state.take() {
            state.quad.release(gfx)?;
            state.program.release(gfx)?;
            state.texture.release(gfx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lessons::testing::{corner, run_headless};

    #[test]
    fn quad_shows_the_checkerboard() {
        let gfx = run_headless(TexturedQuadLesson::default(), 1);
        // uv (1/16, 1/16): middle of the first, light cell. u runs right to left.
        assert_eq!(gfx.pixel(574, 168).unwrap(), [255, 255, 255, 255]);
        // uv (3/16, 1/16): middle of the second, dark cell.
        assert_eq!(gfx.pixel(524, 168).unwrap(), [64, 128, 255, 255]);
        assert_eq!(corner(&gfx), [0, 0, 0, 255]);
    }
}
