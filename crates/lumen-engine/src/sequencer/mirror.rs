use crate::gfx::{
    Backend, ClearMask, ClearValues, CompareFunc, GfxError, StencilFunc, StencilOps,
};

use super::{DrawCommand, SceneView};

/// Stencil value stamped where the mirror is visible.
const MIRROR_REF: u8 = 1;

/// Progress through one frame of the stencil mirror technique.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MirrorPhase {
    /// No frame started, or the previous one finished.
    Idle,
    Cleared,
    Opaque,
    Stamped,
    Reflected,
}

impl MirrorPhase {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Cleared => "clear",
            Self::Opaque => "draw-opaque",
            Self::Stamped => "stamp-mirror",
            Self::Reflected => "draw-reflection",
        }
    }
}

/// Stencil-masked planar mirror, one frame at a time.
///
/// Steps run in a fixed order: clear, opaque draws, mirror stamp, reflection, disable.
/// Opaque draws may be skipped or repeated and the reflection may be issued more than
/// once. A step called out of order fails with [`GfxError::OutOfOrder`] before touching
/// any backend state.
#[derive(Debug)]
pub struct MirrorPass {
    phase: MirrorPhase,
}

impl Default for MirrorPass {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorPass {
    pub fn new() -> Self {
        Self {
            phase: MirrorPhase::Idle,
        }
    }

    #[inline]
    pub fn phase(&self) -> MirrorPhase {
        self.phase
    }

    fn expect(&self, step: MirrorPhase, allowed: &[MirrorPhase]) -> Result<(), GfxError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(GfxError::OutOfOrder {
                step: step.name(),
                after: self.phase.name(),
            })
        }
    }

    /// Clears colour, depth and stencil of the bound target with full write masks.
    pub fn clear<B: Backend>(&mut self, gfx: &mut B, values: ClearValues) -> Result<(), GfxError> {
        self.expect(MirrorPhase::Cleared, &[MirrorPhase::Idle])?;
        gfx.set_depth_mask(true);
        gfx.set_stencil_mask(0xff);
        gfx.set_clear_values(values);
        gfx.clear(ClearMask::ALL)?;
        self.phase = MirrorPhase::Cleared;
        Ok(())
    }

    /// Depth-tested scene geometry, stencil off.
    pub fn draw_opaque<B: Backend>(
        &mut self,
        gfx: &mut B,
        view: &SceneView,
        draws: &[DrawCommand<'_>],
    ) -> Result<(), GfxError> {
        self.expect(
            MirrorPhase::Opaque,
            &[MirrorPhase::Cleared, MirrorPhase::Opaque],
        )?;
        gfx.set_depth_test(true);
        gfx.set_depth_mask(true);
        gfx.set_stencil_test(false);
        self.phase = MirrorPhase::Opaque;
        draws.iter().try_for_each(|d| d.submit(gfx, view))
    }

    /// Draws the mirror surface, writing the stencil reference wherever it lands. Depth is
    /// not written, so the reflection can show through.
    pub fn stamp_mirror<B: Backend>(
        &mut self,
        gfx: &mut B,
        view: &SceneView,
        mirror: &[DrawCommand<'_>],
    ) -> Result<(), GfxError> {
        self.expect(
            MirrorPhase::Stamped,
            &[MirrorPhase::Cleared, MirrorPhase::Opaque],
        )?;
        gfx.set_stencil_test(true);
        gfx.set_stencil_op(StencilOps::REPLACE_ON_PASS);
        gfx.set_stencil_func(StencilFunc {
            compare: CompareFunc::Always,
            reference: MIRROR_REF,
            read_mask: 0xff,
        });
        gfx.set_stencil_mask(0xff);
        gfx.set_depth_mask(false);
        self.phase = MirrorPhase::Stamped;
        mirror.iter().try_for_each(|d| d.submit(gfx, view))
    }

    /// Draws reflected geometry only where the mirror was stamped.
    pub fn draw_reflection<B: Backend>(
        &mut self,
        gfx: &mut B,
        view: &SceneView,
        reflected: &[DrawCommand<'_>],
    ) -> Result<(), GfxError> {
        self.expect(
            MirrorPhase::Reflected,
            &[MirrorPhase::Stamped, MirrorPhase::Reflected],
        )?;
        gfx.set_stencil_func(StencilFunc {
            compare: CompareFunc::Equal,
            reference: MIRROR_REF,
            read_mask: 0xff,
        });
        gfx.set_stencil_mask(0x00);
        gfx.set_depth_mask(true);
        self.phase = MirrorPhase::Reflected;
        reflected.iter().try_for_each(|d| d.submit(gfx, view))
    }

    /// Turns the stencil test off and ends the frame.
    pub fn disable<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        self.expect(MirrorPhase::Idle, &[MirrorPhase::Reflected])?;
        gfx.set_stencil_test(false);
        self.phase = MirrorPhase::Idle;
        Ok(())
    }

    /// Forgets a frame that was abandoned half way, e.g. after a draw error.
    pub fn reset(&mut self) {
        self.phase = MirrorPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::SoftwareBackend;
    use crate::gfx::software::Op;

    fn view() -> SceneView {
        SceneView::IDENTITY
    }

    #[test]
    fn reflection_before_stamp_is_rejected_without_state() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let mut pass = MirrorPass::new();
        pass.clear(&mut gfx, ClearValues::default()).unwrap();
        gfx.take_journal();

        let err = pass.draw_reflection(&mut gfx, &view(), &[]).unwrap_err();
        assert_eq!(
            err,
            GfxError::OutOfOrder {
                step: "draw-reflection",
                after: "clear"
            }
        );
        assert!(gfx.journal().is_empty());
        assert_eq!(pass.phase(), MirrorPhase::Cleared);
    }

    #[test]
    fn disable_requires_reflection() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let mut pass = MirrorPass::new();
        pass.clear(&mut gfx, ClearValues::default()).unwrap();
        pass.stamp_mirror(&mut gfx, &view(), &[]).unwrap();
        gfx.take_journal();
        assert!(matches!(pass.disable(&mut gfx), Err(GfxError::OutOfOrder { .. })));
        assert!(gfx.journal().is_empty());
    }

    #[test]
    fn second_clear_needs_finished_frame() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let mut pass = MirrorPass::new();
        pass.clear(&mut gfx, ClearValues::default()).unwrap();
        assert!(pass.clear(&mut gfx, ClearValues::default()).is_err());
        pass.reset();
        assert!(pass.clear(&mut gfx, ClearValues::default()).is_ok());
    }

    #[test]
    fn full_frame_issues_state_in_order() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let mut pass = MirrorPass::new();
        pass.clear(&mut gfx, ClearValues::default()).unwrap();
        pass.draw_opaque(&mut gfx, &view(), &[]).unwrap();
        gfx.take_journal();

        pass.stamp_mirror(&mut gfx, &view(), &[]).unwrap();
        pass.draw_reflection(&mut gfx, &view(), &[]).unwrap();
        pass.disable(&mut gfx).unwrap();

        let stencil: Vec<Op> = gfx
            .take_journal()
            .into_iter()
            .filter(Op::is_stencil_or_depth_state)
            .collect();
        assert_eq!(
            stencil,
            vec![
                Op::StencilTest(true),
                Op::StencilOp(StencilOps::REPLACE_ON_PASS),
                Op::StencilFunc(StencilFunc {
                    compare: CompareFunc::Always,
                    reference: 1,
                    read_mask: 0xff
                }),
                Op::StencilMask(0xff),
                Op::DepthMask(false),
                Op::StencilFunc(StencilFunc {
                    compare: CompareFunc::Equal,
                    reference: 1,
                    read_mask: 0xff
                }),
                Op::StencilMask(0),
                Op::DepthMask(true),
                Op::StencilTest(false),
            ]
        );
        assert_eq!(pass.phase(), MirrorPhase::Idle);
    }
}
