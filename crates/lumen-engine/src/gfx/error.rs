use thiserror::Error;

use super::handle::ResourceKind;
use super::types::{PixelFormat, ShaderStage, UniformKind};

/// Errors reported by a [`Backend`](super::Backend).
///
/// Creation-time failures (`Compile`, `Link`, `UnsupportedRenderTargetFormat`) are fatal to
/// the lesson that hit them. Everything else is a usage violation: the call is rejected and
/// no GPU state is changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GfxError {
    /// The shader compiler rejected a stage. `log` is the compiler diagnostic, verbatim.
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    /// Vertex and fragment stages cannot be linked into one program.
    #[error("program link failed: {0}")]
    Link(String),

    /// The driver cannot back a framebuffer with this texture format.
    #[error("texture format {0:?} cannot be used as a render target")]
    UnsupportedRenderTargetFormat(PixelFormat),

    /// The handle was never minted, or was already released.
    #[error("{kind} handle {raw:#x} is not live")]
    InvalidHandle { kind: ResourceKind, raw: u64 },

    /// The active program reads a vertex input no attribute was declared for.
    #[error("vertex input at location {location} has no declared attribute")]
    MissingAttribute { location: u32 },

    /// A draw would read past the end of the bound vertex buffer.
    #[error(
        "attribute {slot} reads bytes up to {required} but the vertex buffer holds {available}"
    )]
    AttributeOutOfBounds {
        slot: u32,
        required: u64,
        available: u64,
    },

    /// An indexed draw reads past the end of the index buffer, or an index points past the
    /// vertex data.
    #[error("index {index} is out of bounds ({limit} available)")]
    IndexOutOfBounds { index: u64, limit: u64 },

    #[error("no program is in use")]
    NoActiveProgram,

    #[error("no vertex buffer is bound")]
    NoVertexBuffer,

    #[error("no index buffer is bound")]
    NoIndexBuffer,

    /// The value does not match the uniform's declared type.
    #[error("uniform `{name}` is {expected:?}, got a {actual} value")]
    UniformTypeMismatch {
        name: String,
        expected: UniformKind,
        actual: &'static str,
    },

    /// The location does not belong to the active program.
    #[error("uniform location {0} does not belong to the active program")]
    InvalidUniformLocation(i32),

    /// Attribute descriptor or geometry data is malformed.
    #[error("invalid vertex layout: {0}")]
    InvalidLayout(String),

    #[error("texture data is {actual} bytes, expected {expected}")]
    InvalidTextureData { expected: usize, actual: usize },

    #[error("texture size {width}x{height} is empty")]
    EmptyTexture { width: u32, height: u32 },

    /// A frame step ran outside the mirror technique's fixed order.
    #[error("{step} cannot run after {after}")]
    OutOfOrder {
        step: &'static str,
        after: &'static str,
    },

    /// The presentation surface failed in a way the frame cannot recover from.
    #[error("surface error: {0}")]
    Surface(String),
}

impl GfxError {
    pub(crate) fn invalid(kind: ResourceKind, raw: u64) -> Self {
        Self::InvalidHandle { kind, raw }
    }
}
