use anyhow::{Context, Result, bail};

use crate::gfx::{Backend, GfxError};
use crate::time::FrameTime;

use super::app::{AppControl, Lesson};

/// Runs `on_create`.
pub fn create<B: Backend, L: Lesson>(gfx: &mut B, lesson: &mut L) -> Result<(), GfxError> {
    log::info!("creating lesson `{}`", lesson.name());
    lesson.on_create(gfx)
}

/// One frame: update, render, then exactly one present.
///
/// A render error skips the present; the caller is expected to tear down.
pub fn frame<B: Backend, L: Lesson>(
    gfx: &mut B,
    lesson: &mut L,
    time: FrameTime,
) -> Result<AppControl, GfxError> {
    frame_with(gfx, lesson, time, |_| {})
}

/// [`frame`] with a hook that runs after rendering, right before the present.
pub fn frame_with<B: Backend, L: Lesson>(
    gfx: &mut B,
    lesson: &mut L,
    time: FrameTime,
    before_present: impl FnOnce(&B),
) -> Result<AppControl, GfxError> {
    let control = lesson.on_update(time);
    lesson.on_render(gfx)?;
    before_present(gfx);
    gfx.present()?;
    Ok(control)
}

/// Runs `on_close`.
pub fn close<B: Backend, L: Lesson>(gfx: &mut B, lesson: &mut L) -> Result<(), GfxError> {
    log::info!("closing lesson `{}`", lesson.name());
    lesson.on_close(gfx)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    New,
    Running,
    Closed,
}

/// Drives a lesson without a window, enforcing the create → frames → close order.
pub struct HeadlessHost<B: Backend, L: Lesson> {
    gfx: B,
    lesson: L,
    phase: Phase,
    frame_index: u64,
}

impl<B: Backend, L: Lesson> HeadlessHost<B, L> {
    pub fn new(gfx: B, lesson: L) -> Self {
        Self {
            gfx,
            lesson,
            phase: Phase::New,
            frame_index: 0,
        }
    }

    pub fn create(&mut self) -> Result<()> {
        if self.phase != Phase::New {
            bail!("lesson `{}` was already created", self.lesson.name());
        }
        create(&mut self.gfx, &mut self.lesson)
            .with_context(|| format!("creating lesson `{}`", self.lesson.name()))?;
        self.phase = Phase::Running;
        Ok(())
    }

    /// Runs one frame with a fixed time step.
    pub fn frame(&mut self, dt: f32) -> Result<AppControl> {
        if self.phase != Phase::Running {
            bail!(
                "frame requested for lesson `{}` while {:?}",
                self.lesson.name(),
                self.phase
            );
        }
        let time = FrameTime::fixed(dt, self.frame_index);
        self.frame_index += 1;
        frame(&mut self.gfx, &mut self.lesson, time)
            .with_context(|| format!("frame {} of `{}`", time.frame_index, self.lesson.name()))
    }

    /// Runs up to `count` frames, stopping early when the lesson asks to exit.
    pub fn run_frames(&mut self, count: u32, dt: f32) -> Result<AppControl> {
        for _ in 0..count {
            if self.frame(dt)? == AppControl::Exit {
                return Ok(AppControl::Exit);
            }
        }
        Ok(AppControl::Continue)
    }

    pub fn close(&mut self) -> Result<()> {
        if self.phase != Phase::Running {
            bail!("lesson `{}` is not running", self.lesson.name());
        }
        self.phase = Phase::Closed;
        close(&mut self.gfx, &mut self.lesson)
            .with_context(|| format!("closing lesson `{}`", self.lesson.name()))
    }

    pub fn gfx(&self) -> &B {
        &self.gfx
    }

    pub fn gfx_mut(&mut self) -> &mut B {
        &mut self.gfx
    }

    pub fn lesson(&self) -> &L {
        &self.lesson
    }

    pub fn frames_run(&self) -> u64 {
        self.frame_index
    }

    pub fn into_parts(self) -> (B, L) {
        (self.gfx, self.lesson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::software::Op;
    use crate::gfx::{ClearMask, SoftwareBackend};

    #[derive(Default)]
    struct Counting {
        updates: u32,
        exit_after: Option<u32>,
    }

    impl Lesson for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn on_create<B: Backend>(&mut self, _gfx: &mut B) -> Result<(), GfxError> {
            Ok(())
        }

        fn on_update(&mut self, _time: FrameTime) -> AppControl {
            self.updates += 1;
            match self.exit_after {
                Some(n) if self.updates >= n => AppControl::Exit,
                _ => AppControl::Continue,
            }
        }

        fn on_render<B: Backend>(&mut self, gfx: &mut B) -> Result<(), GfxError> {
            gfx.clear(ClearMask::ALL)
        }

        fn on_close<B: Backend>(&mut self, _gfx: &mut B) -> Result<(), GfxError> {
            Ok(())
        }
    }

    #[test]
    fn presents_once_per_frame() {
        let mut host = HeadlessHost::new(SoftwareBackend::new(4, 4), Counting::default());
        host.create().unwrap();
        host.run_frames(3, 1.0 / 60.0).unwrap();
        assert_eq!(host.gfx().frames_presented(), 3);
        let presents = host
            .gfx()
            .journal()
            .iter()
            .filter(|op| **op == Op::Present)
            .count();
        assert_eq!(presents, 3);
        assert_eq!(host.lesson().updates, 3);
    }

    #[test]
    fn hook_runs_between_render_and_present() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let mut lesson = Counting::default();
        let mut seen = None;
        frame_with(&mut gfx, &mut lesson, FrameTime::fixed(0.016, 0), |gfx| {
            seen = Some((gfx.frames_presented(), gfx.journal().last().cloned()));
        })
        .unwrap();
        assert_eq!(seen, Some((0, Some(Op::Clear(ClearMask::ALL)))));
        assert_eq!(gfx.frames_presented(), 1);
    }

    #[test]
    fn frame_before_create_is_rejected() {
        let mut host = HeadlessHost::new(SoftwareBackend::new(4, 4), Counting::default());
        assert!(host.frame(0.016).is_err());
        assert!(host.close().is_err());
    }

    #[test]
    fn exit_request_stops_frames() {
        let lesson = Counting {
            exit_after: Some(2),
            ..Counting::default()
        };
        let mut host = HeadlessHost::new(SoftwareBackend::new(4, 4), lesson);
        host.create().unwrap();
        assert_eq!(host.run_frames(10, 0.016).unwrap(), AppControl::Exit);
        assert_eq!(host.frames_run(), 2);
        host.close().unwrap();
        assert!(host.create().is_err());
    }
}
