use glam::Mat4;
use lumen_engine::core::Lesson;
use lumen_engine::gfx::{Backend, ClearMask, Color, GfxError};
use lumen_engine::resources::{GeometryBuffer, ShaderProgram, VertexLayout};
use lumen_engine::sequencer::{DrawCommand, SceneView};
use lumen_engine::shaders;

/// Position (xy) + colour (rgba) for the four corners.
#[rustfmt::skip]
const VERTICES: [f32; 24] = [
    -0.5,  0.5,   1.0, 0.0, 0.0, 1.0,
     0.5,  0.5,   0.0, 1.0, 0.0, 1.0,
     0.5, -0.5,   0.0, 0.0, 1.0, 1.0,
    -0.5, -0.5,   1.0, 1.0, 1.0, 1.0,
];
const INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

const ROTATION: f32 = 1.234;

struct State {
    program: ShaderProgram,
    quad: GeometryBuffer,
}

/// Four coloured vertices drawn as two indexed triangles, rotated and tinted through
/// uniforms.
#[derive(Default)]
pub struct IndexedQuadLesson {
    state: Option<State>,
}

impl IndexedQuadLesson {
    pub const OVERLAY: Color = Color::new(0.5, 0.25, 1.0, 1.0);
}

impl Lesson for IndexedQuadLesson {
    fn name(&self) -> &'static str {
        "indexed-quad"
    }

    fn on_create<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        let program = ShaderProgram::from_module(gfx, shaders::VERTEX_COLOR)?;
        let quad = GeometryBuffer::create_indexed(
            gfx,
            VertexLayout::interleaved(&[2, 4]),
            &VERTICES,
            &INDICES,
        )?;
        self.state = Some(State { program, quad });
        Ok(())
    }

    fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.clear(ClearMask::ALL)?;
        let Some(state) = &self.state else {
            return Ok(());
        };
        DrawCommand::new(&state.program, &state.quad)
            .world(Mat4::from_rotation_z(ROTATION))
            .color(Self::OVERLAY)
            .submit(gfx, &SceneView::IDENTITY)
    }

    fn on_close<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        if let Some(state) = self.state.take() {
            state.quad.release(gfx)?;
            state.program.release(gfx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lessons::testing::{centre, corner, run_headless};

    #[test]
    fn tinted_quad_covers_centre() {
        let gfx = run_headless(IndexedQuadLesson::default(), 1);
        let c = centre(&gfx);
        assert_ne!(c, [0, 0, 0, 255]);
        // The overlay halves red and quarters green.
        assert!(c[0] <= 128 && c[1] <= 64, "{c:?}");
        assert_eq!(corner(&gfx), [0, 0, 0, 255]);
    }
}
