use glam::{Mat4, Vec3};
use lumen_engine::core::{AppControl, Lesson};
use lumen_engine::gfx::uniform_names;
use lumen_engine::gfx::{Backend, ClearMask, GfxError};
use lumen_engine::resources::{GeometryBuffer, ShaderProgram, Texture, VertexLayout};
use lumen_engine::sequencer::DrawCommand;
use lumen_engine::shaders;
use lumen_engine::time::FrameTime;

use super::{create_checker_texture, orbit_view};

/// Position (xyz) + uv, 20-byte stride, six faces of two triangles.
#[rustfmt::skip]
const VERTICES: [f32; 180] = [
    -0.5, -0.5, -0.5,  0.0, 0.0,
     0.5, -0.5, -0.5,  1.0, 0.0,
     0.5,  0.5, -0.5,  1.0, 1.0,
     0.5,  0.5, -0.5,  1.0, 1.0,
    -0.5,  0.5, -0.5,  0.0, 1.0,
    -0.5, -0.5, -0.5,  0.0, 0.0,

    -0.5, -0.5,  0.5,  0.0, 0.0,
     0.5, -0.5,  0.5,  1.0, 0.0,
     0.5,  0.5,  0.5,  1.0, 1.0,
     0.5,  0.5,  0.5,  1.0, 1.0,
    -0.5,  0.5,  0.5,  0.0, 1.0,
    -0.5, -0.5,  0.5,  0.0, 0.0,

    -0.5,  0.5,  0.5,  1.0, 0.0,
    -0.5,  0.5, -0.5,  1.0, 1.0,
    -0.5, -0.5, -0.5,  0.0, 1.0,
    -0.5, -0.5, -0.5,  0.0, 1.0,
    -0.5, -0.5,  0.5,  0.0, 0.0,
    -0.5,  0.5,  0.5,  1.0, 0.0,

     0.5,  0.5,  0.5,  1.0, 0.0,
     0.5,  0.5, -0.5,  1.0, 1.0,
     0.5, -0.5, -0.5,  0.0, 1.0,
     0.5, -0.5, -0.5,  0.0, 1.0,
     0.5, -0.5,  0.5,  0.0, 0.0,
     0.5,  0.5,  0.5,  1.0, 0.0,

    -0.5, -0.5, -0.5,  0.0, 1.0,
     0.5, -0.5, -0.5,  1.0, 1.0,
     0.5, -0.5,  0.5,  1.0, 0.0,
     0.5, -0.5,  0.5,  1.0, 0.0,
    -0.5, -0.5,  0.5,  0.0, 0.0,
    -0.5, -0.5, -0.5,  0.0, 1.0,

    -0.5,  0.5, -0.5,  0.0, 1.0,
     0.5,  0.5, -0.5,  1.0, 1.0,
     0.5,  0.5,  0.5,  1.0, 0.0,
     0.5,  0.5,  0.5,  1.0, 0.0,
    -0.5,  0.5,  0.5,  0.0, 0.0,
    -0.5,  0.5, -0.5,  0.0, 1.0,
];

struct State {
    texture: Texture,
    program: ShaderProgram,
    cube: GeometryBuffer,
}

/// Depth-tested textured cube spinning about Y under a perspective camera.
#[derive(Default)]
pub struct TexturedCubeLesson {
    state: Option<State>,
    angle: f32,
}

impl Lesson for TexturedCubeLesson {
    fn name(&self) -> &'static str {
        "textured-cube"
    }

    fn on_create<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        let texture = create_checker_texture(gfx)?;
        let program = ShaderProgram::from_module(gfx, shaders::TEXTURED)?;
        let cube = GeometryBuffer::create(gfx, VertexLayout::interleaved(&[3, 2]), &VERTICES)?;
        self.state = Some(State {
            texture,
            program,
            cube,
        });
        Ok(())
    }

    fn on_update(&mut self, time: FrameTime) -> AppControl {
        self.angle += time.dt;
        AppControl::Continue
    }

    fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.set_depth_mask(true);
        gfx.clear(ClearMask::ALL)?;
        let Some(state) = &self.state else {
            return Ok(());
        };
        gfx.set_depth_test(true);
        state.texture.bind(gfx, 0)?;
        state.program.activate(gfx)?;
        state.program.set(gfx, uniform_names::COLOR_TEXTURE, 0i32)?;
        DrawCommand::new(&state.program, &state.cube)
            .world(Mat4::from_rotation_y(self.angle))
            .submit(gfx, &orbit_view(Vec3::new(2.0, 2.0, 2.0)))
    }

    fn on_close<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        if let Some(state) = self.state.take() {
            state.cube.release(gfx)?;
            state.program.release(gfx)?;
            state.texture.release(gfx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lessons::testing::{centre, corner, run_headless};

    #[test]
    fn cube_is_visible_and_depth_tested() {
        let gfx = run_headless(TexturedCubeLesson::default(), 3);
        assert_ne!(centre(&gfx), [0, 0, 0, 255]);
        assert_eq!(corner(&gfx), [0, 0, 0, 255]);
        let depth = gfx.depth_value(400, 300).unwrap();
        assert!(depth > 0.0 && depth < 1.0, "{depth}");
    }
}
