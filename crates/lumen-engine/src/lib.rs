//! Lumen engine crate.
//!
//! GPU resource lifecycle and the multi-pass lesson pipeline: a GL-style [`gfx::Backend`]
//! with a software and a wgpu implementation, the reusable components lessons are built
//! from, the per-frame sequencer, and the window runtime that hosts a lesson.

pub mod device;
pub mod gfx;
pub mod window;
pub mod time;
pub mod core;

pub mod logging;
pub mod resources;
pub mod sequencer;
pub mod shaders;
pub mod transform;
