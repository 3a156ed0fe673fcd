//! Frame timing.
//!
//! One [`FrameClock`] per render loop; `tick()` once per presented frame yields the
//! [`FrameTime`] passed to lessons. Headless hosts build [`FrameTime::fixed`] steps instead.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
