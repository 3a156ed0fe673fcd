use lumen_engine::core::{AppControl, Lesson};
use lumen_engine::gfx::{Backend, GfxError, Viewport};
use lumen_engine::sequencer::{DrawCommand, FramePlan, FrameSequencer};
use lumen_engine::time::FrameTime;

use super::mirror::{MIRROR_EYE, MirrorScene};
use super::{WINDOW_HEIGHT, WINDOW_WIDTH, offscreen_boxes, orbit_view};

/// Picture-in-picture rectangle the offscreen image is composited into.
pub const INSET: Viewport = Viewport::new(560, 20, 220, 165);

struct State {
    scene: MirrorScene,
    sequencer: FrameSequencer,
}

/// The whole pipeline: boxes rendered offscreen, the mirror scene on the window, and the
/// offscreen image composited as an inset.
#[derive(Default)]
pub struct MirrorPostLesson {
    state: Option<State>,
    angle: f32,
}

impl Lesson for MirrorPostLesson {
    fn name(&self) -> &'static str {
        "mirror-post"
    }

    fn on_create<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        let scene = MirrorScene::create(gfx)?;
        let sequencer = match FrameSequencer::with_offscreen(gfx, WINDOW_WIDTH, WINDOW_HEIGHT) {
            Ok(sequencer) => sequencer,
            Err(err) => {
                scene.release(gfx)?;
                return Err(err);
            }
        };
        self.state = Some(State { scene, sequencer });
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
        let view = orbit_view(MIRROR_EYE);
        let mut plan = FramePlan::new(view);
        for world in offscreen_boxes(self.angle) {
            plan.offscreen.push(
                DrawCommand::new(state.scene.program(), state.scene.cube()).world(world),
            );
        }
        state.scene.fill(&mut plan, self.angle);
        plan.composite = Some(INSET);
        state.sequencer.render(gfx, &plan)
    }

    fn on_close<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        if let Some(state) = self.state.take() {
            state.sequencer.release(gfx)?;
            state.scene.release(gfx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lessons::testing::{corner, run_headless};

    #[test]
    fn inset_holds_the_offscreen_image() {
        let gfx = run_headless(MirrorPostLesson::default(), 2);
        // Centre of the inset samples the centre of the offscreen image, where the first
        // box always is.
        let x = INSET.x as u32 + INSET.width / 2;
        let y = INSET.y as u32 + INSET.height / 2;
        assert_eq!(gfx.pixel(x, y).unwrap(), [255, 255, 255, 255]);
        assert_eq!(corner(&gfx), [0, 0, 0, 255]);
    }
}
