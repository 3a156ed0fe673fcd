use crate::gfx::{Backend, GfxError};
use crate::time::FrameTime;

/// Control directive returned by lesson callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Callback set a lesson implements.
///
/// The host calls `on_create` once, then `on_update` and `on_render` once per frame (in
/// that order, never overlapping), then `on_close` once. Resources made in `on_create`
/// are owned by the lesson and released in `on_close`.
pub trait Lesson {
    fn name(&self) -> &'static str;

    fn on_create<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError>;

    /// Advances animation state. Runs before `on_render` of the same frame.
    fn on_update(&mut self, time: FrameTime) -> AppControl {
        let _ = time;
        AppControl::Continue
    }

    /// Issues the frame's draws. The host presents afterwards.
    fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError>;

    fn on_close<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError>;
}
