use glam::{Mat4, Vec3};
use lumen_engine::core::{AppControl, Lesson};
use lumen_engine::gfx::{Backend, Color, GfxError};
use lumen_engine::resources::{GeometryBuffer, ShaderProgram, VertexLayout};
use lumen_engine::sequencer::{DrawCommand, FramePlan, FrameSequencer};
use lumen_engine::shaders;
use lumen_engine::time::FrameTime;
use lumen_engine::transform::reflect_y;

use super::{MIRROR_HEIGHT, MIRROR_PLANE, create_box, orbit_view};

pub(super) const MIRROR_COLOR: Color = Color::new(1.0, 0.0, 1.0, 0.5);
pub(super) const REFLECTION_COLOR: Color = Color::rgb(0.9, 0.9, 0.9);

/// Geometry and program of the box-over-mirror scene.
pub(super) struct MirrorScene {
    program: ShaderProgram,
    cube: GeometryBuffer,
    plane: GeometryBuffer,
}

impl MirrorScene {
    pub(super) fn create<B: Backend>(gfx: &mut B) -> Result<Self, GfxError> {
        let program = ShaderProgram::from_module(gfx, shaders::SCENE)?;
        let cube = match create_box(gfx) {
            Ok(cube) => cube,
            Err(err) => {
                program.release(gfx)?;
                return Err(err);
            }
        };
        let plane =
            match GeometryBuffer::create(gfx, VertexLayout::interleaved(&[3]), &MIRROR_PLANE) {
                Ok(plane) => plane,
                Err(err) => {
                    cube.release(gfx)?;
                    program.release(gfx)?;
                    return Err(err);
                }
            };
        Ok(Self {
            program,
            cube,
            plane,
        })
    }

    pub(super) fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub(super) fn cube(&self) -> &GeometryBuffer {
        &self.cube
    }

    /// Adds the box, the mirror and the reflected box to `plan`.
    pub(super) fn fill<'a>(&'a self, plan: &mut FramePlan<'a>, angle: f32) {
        let spin = Mat4::from_rotation_y(angle);
        plan.opaque
            .push(DrawCommand::new(&self.program, &self.cube).world(spin));
        plan.mirror.push(
            DrawCommand::new(&self.program, &self.plane)
                .world(spin)
                .color(MIRROR_COLOR),
        );
        plan.reflected.push(
            DrawCommand::new(&self.program, &self.cube)
                .world(reflect_y(MIRROR_HEIGHT) * spin)
                .color(REFLECTION_COLOR),
        );
    }

    pub(super) fn release<B: Backend>(self, gfx: &mut B) -> Result<(), GfxError> {
        self.plane.release(gfx)?;
        self.cube.release(gfx)?;
        self.program.release(gfx)
    }
}

pub(super) const MIRROR_EYE: Vec3 = Vec3::new(3.0, 2.0, 3.0);

/// A spinning box above a mirror; the reflection shows only inside the mirror.
#[derive(Default)]
pub struct MirrorLesson {
    scene: Option<MirrorScene>,
    sequencer: FrameSequencer,
    angle: f32,
}

impl Lesson for MirrorLesson {
    fn name(&self) -> &'static str {
        "mirror"
    }

    fn on_create<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        self.scene = Some(MirrorScene::create(gfx)?);
        Ok(())
    }

    fn on_update(&mut self, time: FrameTime) -> AppControl {
        self.angle += time.dt;
        AppControl::Continue
    }

    fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        let Some(scene) = &self.scene else {
            return Ok(());
        };
        let mut plan = FramePlan::new(orbit_view(MIRROR_EYE));
        scene.fill(&mut plan, self.angle);
        self.sequencer.render(gfx, &plan)
    }

    fn on_close<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        if let Some(scene) = self.scene.take() {
            scene.release(gfx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lessons::testing::{corner, run_headless};

    #[test]
    fn reflection_shows_only_inside_the_mirror() {
        let gfx = run_headless(MirrorLesson::default(), 2);
        let reflection = REFLECTION_COLOR.to_rgba8();
        let mirror = MIRROR_COLOR.to_rgba8();
        let mut reflected = 0;
        for y in 0..600 {
            for x in 0..800 {
                let px = gfx.pixel(x, y).unwrap();
                if px == reflection {
                    reflected += 1;
                    assert_eq!(gfx.stencil_value(x, y), Some(1), "reflection at ({x}, {y})");
                }
            }
        }
        assert!(reflected > 0);
        assert!(gfx.color_plane().iter().any(|px| *px == mirror));
        assert_eq!(corner(&gfx), [0, 0, 0, 255]);
    }
}
