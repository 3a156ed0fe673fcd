//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - creating & configuring the Surface (swapchain) and its depth/stencil attachment
//! - acquiring frames and providing encoders/views for rendering

mod gpu;

pub use gpu::{DEPTH_STENCIL_FORMAT, DepthStencil, Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
