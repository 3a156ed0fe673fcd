use lumen_engine::core::Lesson;
use lumen_engine::gfx::{Backend, ClearMask, GfxError};
use lumen_engine::resources::{GeometryBuffer, ShaderProgram, VertexLayout};
use lumen_engine::sequencer::{DrawCommand, SceneView};
use lumen_engine::shaders;

/// Position (xy) + colour (rgba), 24-byte stride.
#[rustfmt::skip]
const VERTICES: [f32; 18] = [
     0.0,  0.5,   1.0, 0.0, 0.0, 1.0,
     0.5, -0.5,   0.0, 1.0, 0.0, 1.0,
    -0.5, -0.5,   0.0, 0.0, 1.0, 1.0,
];

struct State {
    program: ShaderProgram,
    triangle: GeometryBuffer,
}

/// Triangle with per-vertex colours interpolated across it.
#[derive(Default)]
pub struct VertexColorLesson {
    state: Option<State>,
}

impl Lesson for VertexColorLesson {
    fn name(&self) -> &'static str {
        "vertex-color"
    }

    fn on_create<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        let program = ShaderProgram::from_module(gfx, shaders::VERTEX_COLOR)?;
        let triangle =
            GeometryBuffer::create(gfx, VertexLayout::interleaved(&[2, 4]), &VERTICES)?;
        self.state = Some(State { program, triangle });
        Ok(())
    }

    fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.clear(ClearMask::ALL)?;
        let Some(state) = &self.state else {
            return Ok(());
        };
        DrawCommand::new(&state.program, &state.triangle).submit(gfx, &SceneView::IDENTITY)
    }

    fn on_close<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        if let Some(state) = self.state.take() {
            state.triangle.release(gfx)?;
            state.program.release(gfx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lessons::testing::run_headless;

    #[test]
    fn corners_of_triangle_take_their_vertex_colour() {
        let gfx = run_headless(VertexColorLesson::default(), 1);
        // Just inside the top vertex: mostly red.
        let top = gfx.pixel(400, 153).unwrap();
        assert!(top[0] > 200 && top[1] < 40 && top[2] < 40, "{top:?}");
        // Near the bottom-left vertex: mostly blue.
        let left = gfx.pixel(203, 448).unwrap();
        assert!(left[2] > 200 && left[0] < 40, "{left:?}");
    }
}
