//! Reusable GPU components the lessons are composed from.
//!
//! Each component owns the handles it created and gives them back through a consuming
//! `release`, so a component cannot be released twice. Handles are released in reverse
//! acquisition order.

mod geometry;
mod program;
mod target;
mod texture;

pub use geometry::{GeometryBuffer, IndexElement, VertexLayout};
pub use program::ShaderProgram;
pub use target::RenderTarget;
pub use texture::Texture;
