//! WGSL programs shared by the lessons.
//!
//! Every program keeps its uniforms in one struct at group 0 binding 0, named after
//! [`crate::gfx::uniform_names`]. Textured programs sample `color_texture` (binding 1) with
//! `color_sampler` (binding 2). Vertex positions are read at location 0 as `vec4<f32>`, so
//! two and three component positions both work.

/// Solid colour, full world/view/projection transform.
pub const SCENE: &str = include_str!("scene.wgsl");

/// Per-vertex colour at location 1, tinted by `color`.
pub const VERTEX_COLOR: &str = include_str!("vertex_color.wgsl");

/// Texture coordinates at location 1, sampled and tinted by `color`.
pub const TEXTURED: &str = include_str!("textured.wgsl");

/// Screen-space quad sampling an offscreen image.
pub const COMPOSITE: &str = include_str!("composite.wgsl");
