//! Per-frame orchestration of the multi-pass pipeline.
//!
//! A frame runs up to three passes:
//! 1. offscreen: the bound [`RenderTarget`] is cleared and the offscreen draws land in its
//!    colour texture
//! 2. default target: the surface is cleared and the scene drawn through the
//!    [`MirrorPass`] state machine
//! 3. composite: the offscreen texture is drawn onto the surface as a screen-space quad
//!
//! The sequencer only sequences. Geometry and programs belong to the lesson and are
//! referenced by [`DrawCommand`]s, which own no GPU state.

mod composite;
mod mirror;

pub use composite::Compositor;
pub use mirror::{MirrorPass, MirrorPhase};

use glam::Mat4;

use crate::gfx::uniform_names;
use crate::gfx::{Backend, ClearMask, ClearValues, Color, GfxError, Viewport};
use crate::resources::{GeometryBuffer, RenderTarget, ShaderProgram};

/// View and projection shared by every draw of a pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SceneView {
    pub view: Mat4,
    pub projection: Mat4,
}

impl SceneView {
    pub const IDENTITY: Self = Self {
        view: Mat4::IDENTITY,
        projection: Mat4::IDENTITY,
    };
}

/// One object draw: which program and geometry, where, and in which colour.
#[derive(Debug, Copy, Clone)]
pub struct DrawCommand<'a> {
    pub program: &'a ShaderProgram,
    pub geometry: &'a GeometryBuffer,
    pub world: Mat4,
    pub color: Color,
}

impl<'a> DrawCommand<'a> {
    pub fn new(program: &'a ShaderProgram, geometry: &'a GeometryBuffer) -> Self {
        Self {
            program,
            geometry,
            world: Mat4::IDENTITY,
            color: Color::WHITE,
        }
    }

    pub fn world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Activates the program, writes the transform and colour uniforms and draws.
    pub fn submit<B: Backend>(&self, gfx: &mut B, view: &SceneView) -> Result<(), GfxError> {
        self.program.activate(gfx)?;
        self.program
            .set_matrices(gfx, self.world, view.view, view.projection)?;
        self.program.set(gfx, uniform_names::COLOR, self.color)?;
        self.geometry.draw(gfx)
    }
}

/// Everything drawn in one frame.
#[derive(Debug, Clone)]
pub struct FramePlan<'a> {
    pub view: SceneView,
    pub clear: ClearValues,

    /// Drawn into the offscreen target, if the sequencer has one.
    pub offscreen: Vec<DrawCommand<'a>>,
    pub offscreen_view: SceneView,
    pub offscreen_clear: ClearValues,

    pub opaque: Vec<DrawCommand<'a>>,
    /// Mirror surfaces. When empty the stencil steps are skipped.
    pub mirror: Vec<DrawCommand<'a>>,
    /// Geometry already transformed into its mirrored position.
    pub reflected: Vec<DrawCommand<'a>>,

    /// Where the offscreen image is composited, in surface pixels. `None` covers the
    /// whole surface.
    pub composite: Option<Viewport>,
}

impl<'a> FramePlan<'a> {
    pub fn new(view: SceneView) -> Self {
        Self {
            view,
            clear: ClearValues::default(),
            offscreen: Vec::new(),
            offscreen_view: view,
            offscreen_clear: ClearValues::default(),
            opaque: Vec::new(),
            mirror: Vec::new(),
            reflected: Vec::new(),
            composite: None,
        }
    }
}

struct Offscreen {
    target: RenderTarget,
    compositor: Compositor,
}

/// Runs the passes of a [`FramePlan`] in their fixed order.
pub struct FrameSequencer {
    mirror: MirrorPass,
    offscreen: Option<Offscreen>,
}

impl FrameSequencer {
    /// Sequencer drawing straight to the surface.
    pub fn new() -> Self {
        Self {
            mirror: MirrorPass::new(),
            offscreen: None,
        }
    }

    /// Sequencer with a `width` x `height` offscreen target composited every frame.
    pub fn with_offscreen<B: Backend>(
        gfx: &mut B,
        width: u32,
        height: u32,
    ) -> Result<Self, GfxError> {
        let target = RenderTarget::create(gfx, width, height)?;
        let compositor = match Compositor::create(gfx) {
            Ok(c) => c,
            Err(err) => {
                target.release(gfx)?;
                return Err(err);
            }
        };
        Ok(Self {
            mirror: MirrorPass::new(),
            offscreen: Some(Offscreen { target, compositor }),
        })
    }

    pub fn target(&self) -> Option<&RenderTarget> {
        self.offscreen.as_ref().map(|o| &o.target)
    }

    pub fn mirror_phase(&self) -> MirrorPhase {
        self.mirror.phase()
    }

    pub fn render<B: Backend>(&mut self, gfx: &mut B, plan: &FramePlan<'_>) -> Result<(), GfxError> {
        let result = self.run(gfx, plan);
        if result.is_err() {
            self.mirror.reset();
        }
        result
    }

    fn run<B: Backend>(&mut self, gfx: &mut B, plan: &FramePlan<'_>) -> Result<(), GfxError> {
        if let Some(off) = &self.offscreen {
            off.target.bind(gfx)?;
            gfx.set_depth_mask(true);
            gfx.set_stencil_mask(0xff);
            gfx.set_clear_values(plan.offscreen_clear);
            gfx.clear(ClearMask::ALL)?;
            gfx.set_depth_test(true);
            gfx.set_stencil_test(false);
            for draw in &plan.offscreen {
                draw.submit(gfx, &plan.offscreen_view)?;
            }
        }

        RenderTarget::bind_default(gfx)?;
        self.mirror.clear(gfx, plan.clear)?;
        self.mirror.draw_opaque(gfx, &plan.view, &plan.opaque)?;
        if plan.mirror.is_empty() {
            self.mirror.reset();
        } else {
            self.mirror.stamp_mirror(gfx, &plan.view, &plan.mirror)?;
            self.mirror.draw_reflection(gfx, &plan.view, &plan.reflected)?;
            self.mirror.disable(gfx)?;
        }

        if let Some(off) = &self.offscreen {
            let (width, height) = gfx.surface_size();
            let rect = plan.composite.unwrap_or(Viewport::full(width, height));
            off.compositor.draw(gfx, off.target.texture(), rect)?;
        }
        Ok(())
    }

    /// Releases the compositor, then the offscreen target.
    pub fn release<B: Backend>(self, gfx: &mut B) -> Result<(), GfxError> {
        if let Some(off) = self.offscreen {
            off.compositor.release(gfx)?;
            off.target.release(gfx)?;
        }
        Ok(())
    }
}

impl Default for FrameSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::SoftwareBackend;
    use crate::gfx::software::Op;
    use crate::resources::VertexLayout;
    use crate::shaders;

    #[test]
    fn offscreen_pass_precedes_default_and_composite() {
        let mut gfx = SoftwareBackend::new(16, 16);
        let mut seq = FrameSequencer::with_offscreen(&mut gfx, 8, 8).unwrap();
        let program = ShaderProgram::from_module(&mut gfx, shaders::SCENE).unwrap();
        let tri = GeometryBuffer::create(
            &mut gfx,
            VertexLayout::interleaved(&[2]),
            &[0.0f32, 0.5, 0.5, -0.5, -0.5, -0.5],
        )
        .unwrap();
        let fb = seq.target().unwrap().framebuffer();
        gfx.take_journal();

        let mut plan = FramePlan::new(SceneView::IDENTITY);
        plan.offscreen.push(DrawCommand::new(&program, &tri));
        plan.opaque.push(DrawCommand::new(&program, &tri));
        seq.render(&mut gfx, &plan).unwrap();

        let journal = gfx.take_journal();
        let binds: Vec<&Op> = journal
            .iter()
            .filter(|op| matches!(op, Op::BindFramebuffer(_)))
            .collect();
        assert_eq!(binds, [&Op::BindFramebuffer(Some(fb)), &Op::BindFramebuffer(None)]);
        assert_eq!(journal.iter().filter(|op| op.is_draw()).count(), 3);
        assert_eq!(seq.mirror_phase(), MirrorPhase::Idle);

        tri.release(&mut gfx).unwrap();
        program.release(&mut gfx).unwrap();
        seq.release(&mut gfx).unwrap();
        assert_eq!(gfx.live_resources(), 0);
    }
}
