//! Core lesson-facing contracts.
//!
//! This module defines the interface between the host (window runtime or headless driver)
//! and the lessons: the [`Lesson`] callback set and the create/frame/close sequence that
//! drives it.

mod app;
pub mod host;

pub use app::{AppControl, Lesson};
pub use host::HeadlessHost;
