use lumen_engine::core::Lesson;
use lumen_engine::gfx::{Backend, ClearMask, ClearValues, Color, GfxError};

/// Clears the surface to a fixed colour every frame.
#[derive(Debug, Default)]
pub struct ClearLesson;

impl ClearLesson {
    pub const COLOR: Color = Color::rgb(0.2, 0.3, 0.4);
}

impl Lesson for ClearLesson {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn on_create<B: Backend>(&mut self, _gfx: &mut B) -> Result<(), GfxError> {
        Ok(())
    }

    fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.set_clear_values(ClearValues {
            color: Self::COLOR,
            ..ClearValues::default()
        });
        gfx.clear(ClearMask::ALL)
    }

    fn on_close<B: Backend>(&mut self, _gfx: &mut B) -> Result<(), GfxError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lessons::testing::{centre, corner, run_headless};

    #[test]
    fn whole_surface_takes_the_clear_colour() {
        let gfx = run_headless(ClearLesson, 2);
        assert_eq!(corner(&gfx), ClearLesson::COLOR.to_rgba8());
        assert_eq!(centre(&gfx), ClearLesson::COLOR.to_rgba8());
    }
}
