//! Mapping from backend-neutral types to wgpu enums.

use crate::gfx::{
    AttribType, Color, CompareFunc, Filter, GfxError, IndexFormat, PixelFormat, StencilOp,
    VertexAttribute, Wrap,
};

pub(super) fn vertex_format(attr: &VertexAttribute) -> Result<wgpu::VertexFormat, GfxError> {
    use wgpu::VertexFormat as F;

    let format = match (attr.ty, attr.normalized, attr.components) {
        (AttribType::F32, _, 1) => F::Float32,
        (AttribType::F32, _, 2) => F::Float32x2,
        (AttribType::F32, _, 3) => F::Float32x3,
        (AttribType::F32, _, 4) => F::Float32x4,
        (AttribType::U8, true, 1) => F::Unorm8,
        (AttribType::U8, true, 2) => F::Unorm8x2,
        (AttribType::U8, true, 4) => F::Unorm8x4,
        (AttribType::U8, false, 1) => F::Uint8,
        (AttribType::U8, false, 2) => F::Uint8x2,
        (AttribType::U8, false, 4) => F::Uint8x4,
        (AttribType::U16, true, 1) => F::Unorm16,
        (AttribType::U16, true, 2) => F::Unorm16x2,
        (AttribType::U16, true, 4) => F::Unorm16x4,
        (AttribType::U16, false, 1) => F::Uint16,
        (AttribType::U16, false, 2) => F::Uint16x2,
        (AttribType::U16, false, 4) => F::Uint16x4,
        _ => {
            return Err(GfxError::InvalidLayout(format!(
                "attribute {} has no vertex format for {} {:?} components",
                attr.slot, attr.components, attr.ty
            )));
        }
    };
    Ok(format)
}

/// Texture format a texture of `format` is stored as. Three-byte RGB has no GPU
/// equivalent and is widened to RGBA on upload.
pub(super) fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm | PixelFormat::Rgb8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        PixelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
    }
}

/// Converts caller pixels into the layout [`texture_format`] stores.
pub(super) fn upload_bytes(format: PixelFormat, data: &[u8]) -> Vec<u8> {
    match format {
        PixelFormat::Rgb8Unorm => data
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        _ => data.to_vec(),
    }
}

pub(super) fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::U16 => wgpu::IndexFormat::Uint16,
        IndexFormat::U32 => wgpu::IndexFormat::Uint32,
    }
}

pub(super) fn compare(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Less => wgpu::CompareFunction::Less,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
        CompareFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunc::Always => wgpu::CompareFunction::Always,
    }
}

pub(super) fn stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::Increment => wgpu::StencilOperation::IncrementClamp,
        StencilOp::Decrement => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
    }
}

pub(super) fn filter(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

pub(super) fn address_mode(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

pub(super) fn color(c: Color) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(c.r),
        g: f64::from(c.g),
        b: f64::from(c.b),
        a: f64::from(c.a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_bytes_map_to_unorm() {
        let attr = VertexAttribute {
            slot: 1,
            components: 4,
            ty: AttribType::U8,
            normalized: true,
            stride: 4,
            offset: 0,
        };
        assert_eq!(vertex_format(&attr), Ok(wgpu::VertexFormat::Unorm8x4));
    }

    #[test]
    fn rgb_is_widened_on_upload() {
        assert_eq!(upload_bytes(PixelFormat::Rgb8Unorm, &[1, 2, 3, 4, 5, 6]), [
            1, 2, 3, 255, 4, 5, 6, 255
        ]);
        assert_eq!(
            texture_format(PixelFormat::Rgb8Unorm),
            wgpu::TextureFormat::Rgba8Unorm
        );
    }
}
