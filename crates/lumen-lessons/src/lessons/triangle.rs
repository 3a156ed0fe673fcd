use lumen_engine::core::Lesson;
use lumen_engine::gfx::{Backend, ClearMask, Color, GfxError};
use lumen_engine::resources::{GeometryBuffer, ShaderProgram, VertexLayout};
use lumen_engine::sequencer::{DrawCommand, SceneView};
use lumen_engine::shaders;

#[rustfmt::skip]
const VERTICES: [f32; 6] = [
     0.0,  0.5,
     0.5, -0.5,
    -0.5, -0.5,
];

struct State {
    program: ShaderProgram,
    triangle: GeometryBuffer,
}

/// One solid triangle in clip space.
#[derive(Default)]
pub struct TriangleLesson {
    state: Option<State>,
}

impl TriangleLesson {
    pub const COLOR: Color = Color::rgb(1.0, 0.0, 1.0);
}

impl Lesson for TriangleLesson {
    fn name(&self) -> &'static str {
        "triangle"
    }

    fn on_create<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        let program = ShaderProgram::from_module(gfx, shaders::SCENE)?;
        let triangle = GeometryBuffer::create(gfx, VertexLayout::interleaved(&[2]), &VERTICES)?;
        self.state = Some(State { program, triangle });
        Ok(())
    }

    fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.clear(ClearMask::ALL)?;
        let Some(state) = &self.state else {
            return Ok(());
        };
        DrawCommand::new(&state.program, &state.triangle)
            .color(Self::COLOR)
            .submit(gfx, &SceneView::IDENTITY)
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
    use crate::lessons::testing::{centre, corner, run_headless};

    #[test]
    fn triangle_covers_centre_only() {
        let gfx = run_headless(TriangleLesson::default(), 1);
        assert_eq!(centre(&gfx), [255, 0, 255, 255]);
        assert_eq!(corner(&gfx), [0, 0, 0, 255]);
    }
}
