use anyhow::{Context, Result, anyhow};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::core::{AppControl, Lesson, host};
use crate::device::{Gpu, GpuInit};
use crate::gfx::WgpuBackend;
use crate::time::FrameClock;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window and runs `lesson` until the window closes, Escape is pressed, the
    /// lesson asks to exit, or a callback fails. A failure is returned after `on_close`
    /// had its chance to release resources.
    pub fn run<L>(config: RuntimeConfig, gpu_init: GpuInit, lesson: L) -> Result<()>
    where
        L: Lesson + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, lesson);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gfx: WgpuBackend<'this>,
}

struct AppState<L: Lesson + 'static> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    lesson: L,

    entry: Option<WindowEntry>,
    window_id: Option<WindowId>,
    failure: Option<anyhow::Error>,
    exit_requested: bool,
}

impl<L: Lesson + 'static> AppState<L> {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, lesson: L) -> Self {
        Self {
            config,
            gpu_init,
            lesson,
            entry: None,
            window_id: None,
            failure: None,
            exit_requested: false,
        }
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        let id = window.id();
        let gpu_init = self.gpu_init.clone();

        let mut entry = WindowEntryTryBuilder {
            clock: FrameClock::default(),
            window,
            gfx_builder: |w| {
                pollster::block_on(Gpu::new(w, gpu_init))
                    .map(WgpuBackend::new)
                    .context("GPU initialization failed for window")
            },
        }
        .try_build()?;

        let lesson = &mut self.lesson;
        entry
            .with_gfx_mut(|gfx| host::create(gfx, lesson))
            .with_context(|| format!("creating lesson `{}`", lesson.name()))?;
        entry.with_clock_mut(|clock| clock.reset());

        self.window_id = Some(id);
        self.entry = Some(entry);
        Ok(())
    }

    /// Runs `on_close` once and drops the window.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        if let Some(mut entry) = self.entry.take() {
            let lesson = &mut self.lesson;
            if let Err(err) = entry.with_gfx_mut(|gfx| host::close(gfx, lesson)) {
                log::error!("closing lesson `{}` failed: {err}", lesson.name());
                self.failure.get_or_insert_with(|| anyhow!(err));
            }
        }
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure = Some(err);
        self.shutdown(event_loop);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        let lesson = &mut self.lesson;
        let result = entry.with_mut(|fields| {
            let time = fields.clock.tick();
            let window = fields.window;
            host::frame_with(fields.gfx, lesson, time, |_| window.pre_present_notify())
        });

        match result {
            Ok(AppControl::Continue) => {}
            Ok(AppControl::Exit) => self.shutdown(event_loop),
            Err(err) => {
                let name = self.lesson.name();
                self.fail(event_loop, anyhow!(err).context(format!("rendering `{name}`")));
            }
        }
    }
}

impl<L: Lesson + 'static> ApplicationHandler for AppState<L> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            self.fail(event_loop, e);
            return;
        }

        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Lessons animate every frame.
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        if self.window_id != Some(window_id) {
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.shutdown(event_loop),

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_gfx_mut(|gfx| gfx.resize(*new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_gfx_mut(|gfx| gfx.resize(new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}
