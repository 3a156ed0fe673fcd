//! Plain value types shared by every backend.

use std::fmt;

use super::error::GfxError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    #[inline]
    pub fn size(self) -> u64 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Element type of one vertex attribute component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttribType {
    F32,
    U8,
    U16,
}

impl AttribType {
    #[inline]
    pub fn size(self) -> u64 {
        match self {
            Self::F32 => 4,
            Self::U8 => 1,
            Self::U16 => 2,
        }
    }
}

/// One vertex attribute descriptor, as declared against the bound vertex buffer.
///
/// `stride` and `offset` are in bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub slot: u32,
    pub components: u32,
    pub ty: AttribType,
    pub normalized: bool,
    pub stride: u64,
    pub offset: u64,
}

impl VertexAttribute {
    /// Tightly packed `f32` attribute.
    pub const fn f32(slot: u32, components: u32, stride: u64, offset: u64) -> Self {
        Self {
            slot,
            components,
            ty: AttribType::F32,
            normalized: false,
            stride,
            offset,
        }
    }

    /// Size in bytes of one element of this attribute.
    #[inline]
    pub fn byte_size(&self) -> u64 {
        u64::from(self.components) * self.ty.size()
    }

    pub fn validate(&self) -> Result<(), GfxError> {
        if !(1..=4).contains(&self.components) {
            return Err(GfxError::InvalidLayout(format!(
                "attribute {} has {} components (expected 1..=4)",
                self.slot, self.components
            )));
        }
        if self.ty != AttribType::F32 && self.components == 3 {
            return Err(GfxError::InvalidLayout(format!(
                "attribute {} uses three {:?} components; integer attributes come in 1, 2 or 4",
                self.slot, self.ty
            )));
        }
        if self.stride != 0 && self.stride < self.byte_size() {
            return Err(GfxError::InvalidLayout(format!(
                "attribute {} is {} bytes wide but the stride is {}",
                self.slot,
                self.byte_size(),
                self.stride
            )));
        }
        Ok(())
    }

    /// Stride with the GL convention applied: `0` means tightly packed.
    #[inline]
    pub fn effective_stride(&self) -> u64 {
        if self.stride == 0 { self.byte_size() } else { self.stride }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    /// Three bytes per pixel, as produced by many image decoders. Sampling only.
    Rgb8Unorm,
    R8Unorm,
}

impl PixelFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8Unorm | Self::Bgra8Unorm => 4,
            Self::Rgb8Unorm => 3,
            Self::R8Unorm => 1,
        }
    }

    /// Expands one texel to RGBA8.
    pub fn to_rgba8(self, px: &[u8]) -> [u8; 4] {
        match self {
            Self::Rgba8Unorm => [px[0], px[1], px[2], px[3]],
            Self::Bgra8Unorm => [px[2], px[1], px[0], px[3]],
            Self::Rgb8Unorm => [px[0], px[1], px[2], 255],
            Self::R8Unorm => [px[0], 0, 0, 255],
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    Repeat,
    #[default]
    ClampToEdge,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: Filter,
    pub wrap: Wrap,
}

impl TextureDesc {
    pub const fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgba8Unorm,
            filter: Filter::Linear,
            wrap: Wrap::ClampToEdge,
        }
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    pub fn check_size(&self) -> Result<(), GfxError> {
        if self.width == 0 || self.height == 0 {
            return Err(GfxError::EmptyTexture {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn check_data(&self, data: &[u8]) -> Result<(), GfxError> {
        let expected = self.byte_len();
        if data.len() != expected {
            return Err(GfxError::InvalidTextureData {
                expected,
                actual: data.len(),
            });
        }
        Ok(())
    }
}

/// Straight-alpha RGBA color, components in `[0, 1]`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Quantizes to RGBA8 the way a unorm render target stores it.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

/// Pixel rectangle, origin top-left, +Y down.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Viewport covering a whole `width` x `height` target.
    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Which buffers a clear touches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl ClearMask {
    pub const ALL: Self = Self {
        color: true,
        depth: true,
        stencil: true,
    };
    pub const COLOR_DEPTH: Self = Self {
        color: true,
        depth: true,
        stencil: false,
    };
}

/// Values written by [`Backend::clear`](super::Backend::clear).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearValues {
    pub color: Color,
    pub depth: f32,
    pub stencil: u8,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            depth: 1.0,
            stencil: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunc {
    /// Evaluates `lhs <op> rhs`.
    #[inline]
    pub fn passes<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Self::Never => false,
            Self::Less => lhs < rhs,
            Self::Equal => lhs == rhs,
            Self::LessEqual => lhs <= rhs,
            Self::Greater => lhs > rhs,
            Self::NotEqual => lhs != rhs,
            Self::GreaterEqual => lhs >= rhs,
            Self::Always => true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    Invert,
}

impl StencilOp {
    #[inline]
    pub fn apply(self, current: u8, reference: u8) -> u8 {
        match self {
            Self::Keep => current,
            Self::Zero => 0,
            Self::Replace => reference,
            Self::Increment => current.saturating_add(1),
            Self::Decrement => current.saturating_sub(1),
            Self::Invert => !current,
        }
    }
}

/// Stencil operations for (stencil fail, depth fail, both pass).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilOps {
    pub stencil_fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

impl StencilOps {
    pub const KEEP: Self = Self {
        stencil_fail: StencilOp::Keep,
        depth_fail: StencilOp::Keep,
        pass: StencilOp::Keep,
    };
    pub const REPLACE_ON_PASS: Self = Self {
        stencil_fail: StencilOp::Keep,
        depth_fail: StencilOp::Keep,
        pass: StencilOp::Replace,
    };
}

/// Stencil comparison: `(reference & read_mask) <func> (stored & read_mask)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilFunc {
    pub compare: CompareFunc,
    pub reference: u8,
    pub read_mask: u8,
}

impl Default for StencilFunc {
    fn default() -> Self {
        Self {
            compare: CompareFunc::Always,
            reference: 0,
            read_mask: 0xff,
        }
    }
}

/// Declared type of a program uniform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    Vec4,
    Mat4,
    /// A sampled texture; set with an `Int` texture unit.
    Texture,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec4([f32; 4]),
    /// Column-major.
    Mat4([f32; 16]),
}

impl UniformValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::Vec4(_) => "vec4",
            Self::Mat4(_) => "mat4",
        }
    }

    pub fn fits(&self, kind: UniformKind) -> bool {
        matches!(
            (self, kind),
            (Self::Float(_), UniformKind::Float)
                | (Self::Int(_), UniformKind::Int)
                | (Self::Int(_), UniformKind::Texture)
                | (Self::Vec4(_), UniformKind::Vec4)
                | (Self::Mat4(_), UniformKind::Mat4)
        )
    }
}

impl From<glam::Mat4> for UniformValue {
    fn from(m: glam::Mat4) -> Self {
        Self::Mat4(m.to_cols_array())
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Vec4(v)
    }
}

impl From<glam::Vec4> for UniformValue {
    fn from(v: glam::Vec4) -> Self {
        Self::Vec4(v.to_array())
    }
}

impl From<Color> for UniformValue {
    fn from(c: Color) -> Self {
        Self::Vec4(c.to_array())
    }
}

/// Uniform slot inside a program. `INVALID` is returned for names the program does not
/// use; writing through it does nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformLocation(i32);

impl UniformLocation {
    pub const INVALID: Self = Self(-1);

    #[inline]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index as i32)
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Index into the program's uniform table, or `None` for the sentinel.
    #[inline]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_attributes_reject_three_components() {
        let a = VertexAttribute {
            slot: 0,
            components: 3,
            ty: AttribType::U8,
            normalized: true,
            stride: 4,
            offset: 0,
        };
        assert!(matches!(a.validate(), Err(GfxError::InvalidLayout(_))));
    }

    #[test]
    fn stride_narrower_than_element_is_rejected() {
        let a = VertexAttribute::f32(0, 3, 8, 0);
        assert!(a.validate().is_err());
        assert!(VertexAttribute::f32(0, 3, 0, 0).validate().is_ok());
        assert_eq!(VertexAttribute::f32(0, 3, 0, 0).effective_stride(), 12);
    }

    #[test]
    fn stencil_ops_follow_gl_semantics() {
        assert_eq!(StencilOp::Replace.apply(0, 1), 1);
        assert_eq!(StencilOp::Increment.apply(255, 0), 255);
        assert_eq!(StencilOp::Decrement.apply(0, 0), 0);
        assert_eq!(StencilOp::Invert.apply(0x0f, 0), 0xf0);
    }

    #[test]
    fn texture_data_length_is_checked() {
        let desc = TextureDesc::rgba8(2, 2);
        assert!(desc.check_data(&[0; 16]).is_ok());
        assert_eq!(
            desc.check_data(&[0; 12]),
            Err(GfxError::InvalidTextureData {
                expected: 16,
                actual: 12
            })
        );
    }

    #[test]
    fn sentinel_location_has_no_index() {
        assert!(!UniformLocation::INVALID.is_valid());
        assert_eq!(UniformLocation::INVALID.index(), None);
        assert_eq!(UniformLocation::new(3).index(), Some(3));
    }
}
