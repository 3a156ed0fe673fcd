use crate::gfx::{
    BufferId, BufferKind, ClearMask, ClearValues, FramebufferId, IndexFormat, ProgramId,
    ShaderId, ShaderStage, StencilFunc, StencilOps, TextureId, UniformLocation, UniformValue,
    VertexAttribute, Viewport,
};

/// One accepted backend call, in the order it was issued.
///
/// Rejected calls are never journaled: a call that returns an error leaves no trace.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    CreateBuffer(BufferKind, BufferId),
    BindBuffer(BufferKind, Option<BufferId>),
    DeclareAttribute(VertexAttribute),
    DisableAttribute(u32),
    ReleaseBuffer(BufferId),

    CompileShader(ShaderStage, ShaderId),
    LinkProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    SetUniform(UniformLocation, UniformValue),
    ReleaseShader(ShaderId),
    ReleaseProgram(ProgramId),

    CreateTexture(TextureId),
    BindTexture(u32, Option<TextureId>),
    ReleaseTexture(TextureId),
    CreateFramebuffer(FramebufferId),
    BindFramebuffer(Option<FramebufferId>),
    ReleaseFramebuffer(FramebufferId),

    Viewport(Viewport),
    ClearValues(ClearValues),
    Clear(ClearMask),
    DepthTest(bool),
    DepthMask(bool),
    StencilTest(bool),
    StencilFunc(StencilFunc),
    StencilOp(StencilOps),
    StencilMask(u8),

    DrawArrays { first: u32, count: u32 },
    DrawElements { count: u32, format: IndexFormat },
    Present,
}

impl Op {
    /// True for calls that change the depth/stencil pipeline state.
    pub fn is_stencil_or_depth_state(&self) -> bool {
        matches!(
            self,
            Self::DepthTest(_)
                | Self::DepthMask(_)
                | Self::StencilTest(_)
                | Self::StencilFunc(_)
                | Self::StencilOp(_)
                | Self::StencilMask(_)
        )
    }

    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawArrays { .. } | Self::DrawElements { .. })
    }
}
