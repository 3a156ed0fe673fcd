//! Graphics backend capability interface.
//!
//! The [`Backend`] trait exposes the bind-then-operate model the lessons are written
//! against: bind a buffer, declare its attributes, use a program, set uniforms, draw. The
//! binding state (active buffer, program, texture units, target, depth/stencil state) lives
//! inside the backend and is changed only through these calls.
//!
//! Two implementations:
//! - [`SoftwareBackend`]: CPU rasterizer with a call journal, used headless and in tests
//! - [`WgpuBackend`]: records the same calls and replays them as wgpu render passes

mod error;
mod fetch;
mod handle;
pub mod reflect;
pub mod software;
mod types;
pub mod wgpu_backend;

pub use error::GfxError;
pub use handle::{
    BufferId, FramebufferId, Handle, ProgramId, RawHandle, ResourceKind, ShaderId, TextureId,
};
pub(crate) use handle::HandleTable;
pub use software::SoftwareBackend;
pub use types::{
    AttribType, BufferKind, ClearMask, ClearValues, Color, CompareFunc, Filter, IndexFormat,
    PixelFormat, ShaderStage, StencilFunc, StencilOp, StencilOps, TextureDesc, UniformKind,
    UniformLocation, UniformValue, VertexAttribute, Viewport, Wrap,
};
pub use wgpu_backend::WgpuBackend;

/// Uniform names shared by the bundled shaders and the software shading model.
pub mod uniform_names {
    pub const WORLD_MATRIX: &str = "world_matrix";
    pub const VIEW_MATRIX: &str = "view_matrix";
    pub const PROJECTION_MATRIX: &str = "projection_matrix";
    pub const COLOR: &str = "color";
    pub const COLOR_TEXTURE: &str = "color_texture";
}

/// GPU capability interface.
///
/// All calls happen on the thread that owns the context. Handles are only meaningful to the
/// backend that minted them.
pub trait Backend {
    // ── buffers ───────────────────────────────────────────────────────────

    /// Uploads immutable data. The buffer is static: it is never written again.
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId, GfxError>;

    /// Selects the buffer subsequent attribute declarations (vertex) or indexed draws
    /// (index) read from. `None` unbinds.
    fn bind_buffer(&mut self, kind: BufferKind, buffer: Option<BufferId>) -> Result<(), GfxError>;

    /// Declares an attribute against the currently bound vertex buffer.
    ///
    /// The declaration is context state, not buffer state: binding another buffer does not
    /// carry it along, so it is re-issued after every bind.
    fn declare_attribute(&mut self, attribute: VertexAttribute) -> Result<(), GfxError>;

    fn disable_attribute(&mut self, slot: u32);

    fn release_buffer(&mut self, buffer: BufferId) -> Result<(), GfxError>;

    // ── shaders ───────────────────────────────────────────────────────────

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, GfxError>;

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId)
    -> Result<ProgramId, GfxError>;

    fn use_program(&mut self, program: Option<ProgramId>) -> Result<(), GfxError>;

    /// Resolves a uniform by name. Unknown or unused names yield
    /// [`UniformLocation::INVALID`]; this is not an error.
    fn uniform_location(&self, program: ProgramId, name: &str)
    -> Result<UniformLocation, GfxError>;

    /// Writes a uniform of the active program. Writing through the invalid sentinel is a
    /// no-op.
    fn set_uniform(
        &mut self,
        location: UniformLocation,
        value: UniformValue,
    ) -> Result<(), GfxError>;

    fn release_shader(&mut self, shader: ShaderId) -> Result<(), GfxError>;

    fn release_program(&mut self, program: ProgramId) -> Result<(), GfxError>;

    // ── textures & framebuffers ───────────────────────────────────────────

    /// Creates a texture, optionally uploading already-decoded pixels.
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, GfxError>;

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) -> Result<(), GfxError>;

    fn release_texture(&mut self, texture: TextureId) -> Result<(), GfxError>;

    /// Creates a framebuffer rendering into `color`, with its own depth/stencil attachment
    /// of the same size.
    fn create_framebuffer(&mut self, color: TextureId) -> Result<FramebufferId, GfxError>;

    /// Redirects draws and clears. `None` selects the presented surface. The viewport is
    /// left untouched.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<(), GfxError>;

    fn release_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), GfxError>;

    // ── fixed-function state ──────────────────────────────────────────────

    fn set_viewport(&mut self, viewport: Viewport);

    fn set_clear_values(&mut self, values: ClearValues);

    /// Clears the bound target. Depth and stencil clears honour the current depth and
    /// stencil write masks.
    fn clear(&mut self, mask: ClearMask) -> Result<(), GfxError>;

    fn set_depth_test(&mut self, enabled: bool);

    fn set_depth_mask(&mut self, write: bool);

    fn set_stencil_test(&mut self, enabled: bool);

    fn set_stencil_func(&mut self, func: StencilFunc);

    fn set_stencil_op(&mut self, ops: StencilOps);

    fn set_stencil_mask(&mut self, mask: u8);

    // ── draws ─────────────────────────────────────────────────────────────

    /// Draws `count` vertices starting at `first` as a triangle list.
    fn draw_arrays(&mut self, first: u32, count: u32) -> Result<(), GfxError>;

    /// Draws `count` indices from the bound index buffer as a triangle list.
    fn draw_elements(&mut self, count: u32, format: IndexFormat) -> Result<(), GfxError>;

    /// Finishes the frame and shows it.
    fn present(&mut self) -> Result<(), GfxError>;

    /// Size of the presented surface in pixels.
    fn surface_size(&self) -> (u32, u32);
}
