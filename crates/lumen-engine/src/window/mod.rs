//! Window + runtime loop.
//!
//! Owns the `winit` event loop and window, wraps the window surface in a
//! [`WgpuBackend`](crate::gfx::WgpuBackend) and drives one lesson through it.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
