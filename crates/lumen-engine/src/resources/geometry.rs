use bytemuck::Pod;

use crate::gfx::{Backend, BufferId, BufferKind, GfxError, IndexFormat, VertexAttribute};

/// Attribute schema shared by every vertex of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    stride: u64,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Empty layout with the given vertex stride in bytes.
    pub fn new(stride: u64) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
        }
    }

    /// Tightly interleaved `f32` attributes. Slot `i` gets `components[i]` floats, in order.
    ///
    /// ```
    /// # use lumen_engine::resources::VertexLayout;
    /// // position (xy) + colour (rgba)
    /// let layout = VertexLayout::interleaved(&[2, 4]);
    /// assert_eq!(layout.stride(), 24);
    /// assert_eq!(layout.attributes()[1].offset, 8);
    /// ```
    pub fn interleaved(components: &[u32]) -> Self {
        let stride = components.iter().map(|&c| u64::from(c) * 4).sum();
        let mut layout = Self::new(stride);
        let mut offset = 0;
        for (slot, &count) in components.iter().enumerate() {
            layout = layout.with(VertexAttribute::f32(slot as u32, count, stride, offset));
            offset += u64::from(count) * 4;
        }
        layout
    }

    /// Adds an attribute. Its stride is overwritten with the layout's.
    pub fn with(mut self, mut attribute: VertexAttribute) -> Self {
        attribute.stride = self.stride;
        self.attributes.push(attribute);
        self
    }

    #[inline]
    pub fn stride(&self) -> u64 {
        self.stride
    }

    #[inline]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Checks every attribute fits inside one vertex and returns the vertex count of
    /// `bytes`.
    fn vertex_count(&self, bytes: usize) -> Result<u32, GfxError> {
        if self.stride == 0 {
            return Err(GfxError::InvalidLayout("vertex stride is zero".into()));
        }
        for attr in &self.attributes {
            attr.validate()?;
            let end = attr.offset.checked_add(attr.byte_size());
            if end.is_none_or(|end| end > self.stride) {
                return Err(GfxError::InvalidLayout(format!(
                    "attribute {} at offset {} does not fit the {}-byte vertex",
                    attr.slot, attr.offset, self.stride
                )));
            }
        }
        let bytes = bytes as u64;
        if bytes % self.stride != 0 {
            return Err(GfxError::InvalidLayout(format!(
                "{bytes} bytes of vertex data is not a whole number of {}-byte vertices",
                self.stride
            )));
        }
        u32::try_from(bytes / self.stride)
            .map_err(|_| GfxError::InvalidLayout("too many vertices".into()))
    }
}

/// Index element types accepted by [`GeometryBuffer::create_indexed`].
pub trait IndexElement: Pod {
    const FORMAT: IndexFormat;
}

impl IndexElement for u16 {
    const FORMAT: IndexFormat = IndexFormat::U16;
}

impl IndexElement for u32 {
    const FORMAT: IndexFormat = IndexFormat::U32;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Indices {
    buffer: BufferId,
    format: IndexFormat,
    count: u32,
}

/// Immutable vertex data (and optional indices) uploaded once.
#[derive(Debug)]
pub struct GeometryBuffer {
    vertices: BufferId,
    indices: Option<Indices>,
    layout: VertexLayout,
    vertex_count: u32,
}

impl GeometryBuffer {
    pub fn create<B: Backend, V: Pod>(
        gfx: &mut B,
        layout: VertexLayout,
        vertices: &[V],
    ) -> Result<Self, GfxError> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let vertex_count = layout.vertex_count(bytes.len())?;
        let buffer = gfx.create_buffer(BufferKind::Vertex, bytes)?;
        log::debug!(
            "geometry: {vertex_count} vertices, {} attributes",
            layout.attributes.len()
        );
        Ok(Self {
            vertices: buffer,
            indices: None,
            layout,
            vertex_count,
        })
    }

    pub fn create_indexed<B: Backend, V: Pod, I: IndexElement>(
        gfx: &mut B,
        layout: VertexLayout,
        vertices: &[V],
        indices: &[I],
    ) -> Result<Self, GfxError> {
        let mut geometry = Self::create(gfx, layout, vertices)?;
        let count = u32::try_from(indices.len())
            .map_err(|_| GfxError::InvalidLayout("too many indices".into()));
        let created = count.and_then(|count| {
            let buffer = gfx.create_buffer(BufferKind::Index, bytemuck::cast_slice(indices))?;
            Ok(Indices {
                buffer,
                format: I::FORMAT,
                count,
            })
        });
        match created {
            Ok(indices) => {
                geometry.indices = Some(indices);
                Ok(geometry)
            }
            Err(err) => {
                gfx.release_buffer(geometry.vertices)?;
                Err(err)
            }
        }
    }

    /// Binds the buffers and re-declares every attribute of the layout.
    pub fn bind<B: Backend>(&self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.bind_buffer(BufferKind::Vertex, Some(self.vertices))?;
        for attribute in &self.layout.attributes {
            gfx.declare_attribute(*attribute)?;
        }
        gfx.bind_buffer(BufferKind::Index, self.indices.map(|i| i.buffer))
    }

    /// Binds and draws the whole buffer as a triangle list.
    pub fn draw<B: Backend>(&self, gfx: &mut B) -> Result<(), GfxError> {
        self.bind(gfx)?;
        match self.indices {
            Some(indices) => gfx.draw_elements(indices.count, indices.format),
            None => gfx.draw_arrays(0, self.vertex_count),
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> Option<u32> {
        self.indices.map(|i| i.count)
    }

    #[inline]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    #[inline]
    pub fn vertex_buffer(&self) -> BufferId {
        self.vertices
    }

    /// Releases the index buffer, then the vertex buffer.
    pub fn release<B: Backend>(self, gfx: &mut B) -> Result<(), GfxError> {
        if let Some(indices) = self.indices {
            gfx.release_buffer(indices.buffer)?;
        }
        gfx.release_buffer(self.vertices)
    }
}
