use glam::Vec3;
use lumen_engine::core::{AppControl, Lesson};
use lumen_engine::gfx::{Backend, GfxError};
use lumen_engine::resources::{GeometryBuffer, ShaderProgram};
use lumen_engine::sequencer::{DrawCommand, FramePlan, FrameSequencer};
use lumen_engine::shaders;
use lumen_engine::time::FrameTime;

use super::{WINDOW_HEIGHT, WINDOW_WIDTH, create_box, offscreen_boxes, orbit_view};

struct State {
    program: ShaderProgram,
    cube: GeometryBuffer,
    sequencer: FrameSequencer,
}

/// Two boxes rendered into an offscreen target, then composited over the whole window.
#[derive(Default)]
pub struct PostProcessLesson {
    state: Option<State>,
    angle: f32,
}

impl Lesson for PostProcessLesson {
    fn name(&self) -> &'static str {
        "post-process"
    }

    fn on_create<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        let program = ShaderProgram::from_module(gfx, shaders::SCENE)?;
        let cube = create_box(gfx)?;
        let sequencer = FrameSequencer::with_offscreen(gfx, WINDOW_WIDTH, WINDOW_HEIGHT)?;
        self.state = Some(State {
            program,
            cube,
            sequencer,
        });
        Ok(())
    }

    fn on_update(&mut self, time: FrameTime) -> AppControl {
        self.angle += time.dt;
        AppControl::Continue
    }

    fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        let mut plan = FramePlan::new(orbit_view(Vec3::new(3.0, 2.0, 3.0)));
        for world in offscreen_boxes(self.angle) {
            plan.offscreen
                .push(DrawCommand::new(&state.program, &state.cube).world(world));
        }
        state.sequencer.render(gfx, &plan)
    }

    fn on_close<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        if let Some(state) = self.state.take() {
            state.sequencer.release(gfx)?;
            state.cube.release(gfx)?;
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
    fn offscreen_boxes_reach_the_screen() {
        let gfx = run_headless(PostProcessLesson::default(), 2);
        assert_eq!(centre(&gfx), [255, 255, 255, 255]);
        assert_eq!(corner(&gfx), [0, 0, 0, 255]);
    }
}
