//! CPU reference backend.
//!
//! `SoftwareBackend` implements [`Backend`] with a small rasterizer so lessons run headless
//! and tests can read pixels, stencil values and the exact call sequence back.
//!
//! Shading model (the backend has no shader interpreter; programs are still parsed,
//! validated and reflected with naga so compile and link behave as they do on the GPU):
//! - location 0 is the position; missing components default to `(0, 0, 0, 1)`
//! - clip position = `projection_matrix * view_matrix * world_matrix * position`, with any
//!   matrix the program does not use taken as identity
//! - the fragment color starts at the `color` uniform (white when the program has none)
//! - a program with a texture uniform reads location 1 as texture coordinates and multiplies
//!   the sample in
//! - otherwise a three- or four-component location 1 is a per-vertex color, multiplied in
//!
//! Pipeline semantics follow GL: stencil test, then depth test (`Less`), no blending, no
//! culling.

mod journal;
mod raster;

use std::collections::BTreeMap;

use glam::{Mat4, Vec2, Vec4};

pub use journal::Op;
use raster::{ClipVertex, Fragment, rasterize};

use super::fetch;
use super::uniform_names as names;
use super::reflect::{self, ProgramInfo, ScalarClass, StageInfo};
use super::{
    AttribType, Backend, BufferId, BufferKind, ClearMask, ClearValues, Color, CompareFunc,
    Filter, FramebufferId, GfxError, HandleTable, IndexFormat, PixelFormat, ProgramId,
    ShaderId, ShaderStage, StencilFunc, StencilOps, TextureDesc, TextureId,
    UniformLocation, UniformValue, VertexAttribute, Viewport, Wrap,
};

struct Buffer {
    kind: BufferKind,
    data: Vec<u8>,
}

struct Program {
    info: ProgramInfo,
    values: Vec<Option<UniformValue>>,
}

impl Program {
    fn value(&self, name: &str) -> Option<Option<UniformValue>> {
        let index = self.info.locate(name).index()?;
        Some(self.values.get(index).copied().flatten())
    }

    fn matrix(&self, name: &str) -> Mat4 {
        match self.value(name) {
            None => Mat4::IDENTITY,
            Some(Some(UniformValue::Mat4(m))) => Mat4::from_cols_array(&m),
            Some(_) => Mat4::ZERO,
        }
    }
}

struct Texture {
    desc: TextureDesc,
    /// Row 0 is the top row.
    texels: Vec<[u8; 4]>,
}

struct Framebuffer {
    color: TextureId,
    width: u32,
    height: u32,
    depth: Vec<f32>,
    stencil: Vec<u8>,
}

struct Surface {
    width: u32,
    height: u32,
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
    stencil: Vec<u8>,
}

impl Surface {
    fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![[0, 0, 0, 0]; n],
            depth: vec![1.0; n],
            stencil: vec![0; n],
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }
}

/// An attribute declaration captures the vertex buffer bound when it was issued.
#[derive(Copy, Clone)]
struct Attribute {
    buffer: BufferId,
    desc: VertexAttribute,
}

struct State {
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    attributes: BTreeMap<u32, Attribute>,
    program: Option<ProgramId>,
    textures: BTreeMap<u32, TextureId>,
    framebuffer: Option<FramebufferId>,
    viewport: Viewport,
    clear: ClearValues,
    pixel: PixelState,
}

/// Per-fragment fixed-function state, copied out before rasterizing.
#[derive(Copy, Clone)]
struct PixelState {
    depth_test: bool,
    depth_mask: bool,
    stencil_test: bool,
    stencil_func: StencilFunc,
    stencil_ops: StencilOps,
    stencil_mask: u8,
}

impl Default for PixelState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_mask: true,
            stencil_test: false,
            stencil_func: StencilFunc::default(),
            stencil_ops: StencilOps::KEEP,
            stencil_mask: 0xff,
        }
    }
}

impl PixelState {
    fn write_stencil(&self, stored: &mut u8, value: u8) {
        *stored = (*stored & !self.stencil_mask) | (value & self.stencil_mask);
    }

    /// Runs the stencil and depth tests for one fragment, applying their side effects.
    /// Returns whether the color write goes ahead.
    fn test(&self, depth: &mut f32, stencil: &mut u8, frag_depth: f32) -> bool {
        let func = self.stencil_func;
        if self.stencil_test {
            let reference = func.reference & func.read_mask;
            let stored = *stencil & func.read_mask;
            if !func.compare.passes(reference, stored) {
                let v = self.stencil_ops.stencil_fail.apply(*stencil, func.reference);
                self.write_stencil(stencil, v);
                return false;
            }
        }

        if self.depth_test && !CompareFunc::Less.passes(frag_depth, *depth) {
            if self.stencil_test {
                let v = self.stencil_ops.depth_fail.apply(*stencil, func.reference);
                self.write_stencil(stencil, v);
            }
            return false;
        }

        if self.stencil_test {
            let v = self.stencil_ops.pass.apply(*stencil, func.reference);
            self.write_stencil(stencil, v);
        }
        if self.depth_test && self.depth_mask {
            *depth = frag_depth;
        }
        true
    }
}

/// Mutable view of whichever target is bound.
struct Planes<'a> {
    width: u32,
    height: u32,
    color: &'a mut [[u8; 4]],
    depth: &'a mut [f32],
    stencil: &'a mut [u8],
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum VaryingSource {
    None,
    TexCoord,
    VertexColor,
}

/// Copy of a sampled texture, detached from the resource table while a draw writes.
struct SampledTexture {
    width: u32,
    height: u32,
    filter: Filter,
    wrap: Wrap,
    texels: Vec<[u8; 4]>,
}

impl SampledTexture {
    fn wrap_index(&self, i: i64, n: u32) -> usize {
        match self.wrap {
            Wrap::Repeat => i.rem_euclid(i64::from(n)) as usize,
            Wrap::ClampToEdge => i.clamp(0, i64::from(n) - 1) as usize,
        }
    }

    fn fetch(&self, x: i64, y: i64) -> Vec4 {
        let x = self.wrap_index(x, self.width);
        let y = self.wrap_index(y, self.height);
        let t = self.texels[y * self.width as usize + x];
        Vec4::new(t[0] as f32, t[1] as f32, t[2] as f32, t[3] as f32) / 255.0
    }

    fn sample(&self, uv: Vec2) -> Vec4 {
        if self.texels.is_empty() {
            return Vec4::new(0.0, 0.0, 0.0, 1.0);
        }
        let x = uv.x * self.width as f32;
        let y = uv.y * self.height as f32;
        match self.filter {
            Filter::Nearest => self.fetch(x.floor() as i64, y.floor() as i64),
            Filter::Linear => {
                let (fx, fy) = (x - 0.5, y - 0.5);
                let (x0, y0) = (fx.floor(), fy.floor());
                let (tx, ty) = (fx - x0, fy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let top = self.fetch(x0, y0).lerp(self.fetch(x0 + 1, y0), tx);
                let bottom = self.fetch(x0, y0 + 1).lerp(self.fetch(x0 + 1, y0 + 1), tx);
                top.lerp(bottom, ty)
            }
        }
    }
}

/// Everything a draw needs from the active program, resolved up front.
struct Shading {
    transform: Mat4,
    base: Vec4,
    source: VaryingSource,
    texture: Option<SampledTexture>,
}

impl Shading {
    fn shade(&self, varying: Vec4) -> [u8; 4] {
        let mut c = self.base;
        match self.source {
            VaryingSource::None => {}
            VaryingSource::VertexColor => c *= varying,
            VaryingSource::TexCoord => {
                if let Some(tex) = &self.texture {
                    c *= tex.sample(varying.truncate().truncate());
                }
            }
        }
        Color::new(c.x, c.y, c.z, c.w).to_rgba8()
    }
}

/// CPU rasterizer implementing [`Backend`], with readback and a call journal.
pub struct SoftwareBackend {
    surface: Surface,
    buffers: HandleTable<BufferId, Buffer>,
    shaders: HandleTable<ShaderId, StageInfo>,
    programs: HandleTable<ProgramId, Program>,
    textures: HandleTable<TextureId, Texture>,
    framebuffers: HandleTable<FramebufferId, Framebuffer>,
    state: State,
    journal: Vec<Op>,
    presented: u64,
    last_fetch_end: u64,
}

impl SoftwareBackend {
    /// Creates a backend whose presented surface is `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: Surface::new(width, height),
            buffers: HandleTable::default(),
            shaders: HandleTable::default(),
            programs: HandleTable::default(),
            textures: HandleTable::default(),
            framebuffers: HandleTable::default(),
            state: State {
                vertex_buffer: None,
                index_buffer: None,
                attributes: BTreeMap::new(),
                program: None,
                textures: BTreeMap::new(),
                framebuffer: None,
                viewport: Viewport::full(width, height),
                clear: ClearValues::default(),
                pixel: PixelState::default(),
            },
            journal: Vec::new(),
            presented: 0,
            last_fetch_end: 0,
        }
    }

    // ── inspection ────────────────────────────────────────────────────────

    /// Accepted calls since creation (or the last [`take_journal`](Self::take_journal)).
    pub fn journal(&self) -> &[Op] {
        &self.journal
    }

    pub fn take_journal(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.journal)
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    /// Number of live resources of every kind.
    pub fn live_resources(&self) -> usize {
        self.buffers.live()
            + self.shaders.live()
            + self.programs.live()
            + self.textures.live()
            + self.framebuffers.live()
    }

    /// Byte just past the furthest attribute element the last draw read.
    pub fn last_fetch_extent(&self) -> u64 {
        self.last_fetch_end
    }

    pub fn viewport(&self) -> Viewport {
        self.state.viewport
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.state.framebuffer
    }

    pub fn stencil_test_enabled(&self) -> bool {
        self.state.pixel.stencil_test
    }

    /// RGBA8 value of a presented-surface pixel. Row 0 is the top.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.surface.index(x, y).map(|i| self.surface.color[i])
    }

    pub fn stencil_value(&self, x: u32, y: u32) -> Option<u8> {
        self.surface.index(x, y).map(|i| self.surface.stencil[i])
    }

    pub fn depth_value(&self, x: u32, y: u32) -> Option<f32> {
        self.surface.index(x, y).map(|i| self.surface.depth[i])
    }

    /// Presented-surface colors, row-major from the top row.
    pub fn color_plane(&self) -> &[[u8; 4]] {
        &self.surface.color
    }

    pub fn stencil_plane(&self) -> &[u8] {
        &self.surface.stencil
    }

    /// Texels of a texture, expanded to RGBA8, row 0 first.
    pub fn texture_pixels(&self, texture: TextureId) -> Result<&[[u8; 4]], GfxError> {
        Ok(&self.textures.get(texture)?.texels)
    }

    pub fn texel(&self, texture: TextureId, x: u32, y: u32) -> Result<Option<[u8; 4]>, GfxError> {
        let tex = self.textures.get(texture)?;
        Ok((x < tex.desc.width && y < tex.desc.height)
            .then(|| tex.texels[(y * tex.desc.width + x) as usize]))
    }

    /// Reallocates the presented surface. Contents are lost.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface = Surface::new(width, height);
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn record(&mut self, op: Op) {
        self.journal.push(op);
    }

    fn target_planes(&mut self) -> Result<Planes<'_>, GfxError> {
        match self.state.framebuffer {
            None => Ok(Planes {
                width: self.surface.width,
                height: self.surface.height,
                color: &mut self.surface.color,
                depth: &mut self.surface.depth,
                stencil: &mut self.surface.stencil,
            }),
            Some(id) => {
                let fb = self.framebuffers.get_mut(id)?;
                let tex = self.textures.get_mut(fb.color)?;
                Ok(Planes {
                    width: fb.width,
                    height: fb.height,
                    color: &mut tex.texels,
                    depth: &mut fb.depth,
                    stencil: &mut fb.stencil,
                })
            }
        }
    }

    fn shading(&self, program: &Program) -> Shading {
        let info = &program.info;
        let transform = program.matrix(names::PROJECTION_MATRIX)
            * program.matrix(names::VIEW_MATRIX)
            * program.matrix(names::WORLD_MATRIX);

        let base = match program.value(names::COLOR) {
            None => Vec4::ONE,
            Some(Some(UniformValue::Vec4(c))) => Vec4::from_array(c),
            Some(_) => Vec4::ZERO,
        };

        let texture_slot = info.texture_slot();

        let source = match (texture_slot, info.vertex_input(1)) {
            (Some(_), Some(_)) => VaryingSource::TexCoord,
            (None, Some(v)) if v.ty.class == ScalarClass::Float && v.ty.components >= 3 => {
                VaryingSource::VertexColor
            }
            _ => VaryingSource::None,
        };

        let texture = texture_slot.and_then(|slot| {
            let unit = match program.values.get(slot).copied().flatten() {
                Some(UniformValue::Int(unit)) => u32::try_from(unit).ok()?,
                _ => 0,
            };
            let id = self.state.textures.get(&unit)?;
            let tex = self.textures.get(*id).ok()?;
            Some(SampledTexture {
                width: tex.desc.width,
                height: tex.desc.height,
                filter: tex.desc.filter,
                wrap: tex.desc.wrap,
                texels: tex.texels.clone(),
            })
        });

        Shading {
            transform,
            base,
            source,
            texture,
        }
    }

    /// Reads the position and varying of each vertex in `ids`, bounds-checking every
    /// attribute against its buffer first.
    fn fetch(
        &mut self,
        info: &ProgramInfo,
        ids: &[u32],
    ) -> Result<Vec<(Vec4, Vec4)>, GfxError> {
        let max_id = ids.iter().copied().max();

        let mut streams = Vec::with_capacity(info.vertex_inputs.len());
        let mut extent = 0;
        for input in &info.vertex_inputs {
            let attr = self
                .state
                .attributes
                .get(&input.location)
                .copied()
                .ok_or(GfxError::MissingAttribute {
                    location: input.location,
                })?;
            let buffer = self.buffers.get(attr.buffer)?;
            let end = fetch::check_attribute(&attr.desc, max_id, buffer.data.len() as u64)?;
            extent = extent.max(end);
            streams.push((input.location, attr.desc, attr.buffer));
        }

        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            let mut position = Vec4::new(0.0, 0.0, 0.0, 1.0);
            let mut varying = Vec4::new(0.0, 0.0, 0.0, 1.0);
            for &(location, desc, buffer) in &streams {
                let data = &self.buffers.get(buffer)?.data;
                let value = read_attribute(data, &desc, id);
                match location {
                    0 => position = value,
                    1 => varying = value,
                    _ => {}
                }
            }
            out.push((position, varying));
        }

        if !ids.is_empty() {
            self.last_fetch_end = extent;
        }
        Ok(out)
    }

    fn draw(&mut self, ids: &[u32]) -> Result<(), GfxError> {
        let program_id = self.state.program.ok_or(GfxError::NoActiveProgram)?;
        let program = self.programs.get(program_id)?;
        let info = program.info.clone();
        let shading = self.shading(program);

        let vertices = self.fetch(&info, ids)?;
        let clip: Vec<ClipVertex> = vertices
            .into_iter()
            .map(|(p, v)| ClipVertex {
                clip: shading.transform * p,
                varying: v,
            })
            .collect();

        let viewport = self.state.viewport;
        let pixel = self.state.pixel;
        let mut planes = self.target_planes()?;
        let (width, height) = (planes.width, planes.height);

        for tri in clip.chunks_exact(3) {
            let tri = [tri[0], tri[1], tri[2]];
            rasterize(&tri, viewport, width, height, |f: Fragment| {
                let i = (f.y * width + f.x) as usize;
                if pixel.test(&mut planes.depth[i], &mut planes.stencil[i], f.depth) {
                    planes.color[i] = shading.shade(f.varying);
                }
            });
        }
        Ok(())
    }
}

fn read_attribute(data: &[u8], desc: &VertexAttribute, vertex: u32) -> Vec4 {
    let base = (desc.offset + u64::from(vertex) * desc.effective_stride()) as usize;
    let mut out = [0.0, 0.0, 0.0, 1.0];
    for (c, slot) in out.iter_mut().enumerate().take(desc.components as usize) {
        let at = base + c * desc.ty.size() as usize;
        *slot = match desc.ty {
            AttribType::F32 => {
                f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
            }
            AttribType::U8 => {
                let v = f32::from(data[at]);
                if desc.normalized { v / 255.0 } else { v }
            }
            AttribType::U16 => {
                let v = f32::from(u16::from_le_bytes([data[at], data[at + 1]]));
                if desc.normalized { v / 65535.0 } else { v }
            }
        };
    }
    Vec4::from_array(out)
}

impl Backend for SoftwareBackend {
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId, GfxError> {
        let id = self.buffers.insert(Buffer {
            kind,
            data: data.to_vec(),
        });
        self.record(Op::CreateBuffer(kind, id));
        Ok(id)
    }

    fn bind_buffer(&mut self, kind: BufferKind, buffer: Option<BufferId>) -> Result<(), GfxError> {
        if let Some(id) = buffer {
            let existing = self.buffers.get(id)?;
            if existing.kind != kind {
                return Err(GfxError::InvalidLayout(format!(
                    "{:?} buffer cannot be bound as {:?}",
                    existing.kind, kind
                )));
            }
        }
        match kind {
            BufferKind::Vertex => self.state.vertex_buffer = buffer,
            BufferKind::Index => self.state.index_buffer = buffer,
        }
        self.record(Op::BindBuffer(kind, buffer));
        Ok(())
    }

    fn declare_attribute(&mut self, attribute: VertexAttribute) -> Result<(), GfxError> {
        attribute.validate()?;
        let buffer = self.state.vertex_buffer.ok_or(GfxError::NoVertexBuffer)?;
        self.buffers.get(buffer)?;
        self.state.attributes.insert(
            attribute.slot,
            Attribute {
                buffer,
                desc: attribute,
            },
        );
        self.record(Op::DeclareAttribute(attribute));
        Ok(())
    }

    fn disable_attribute(&mut self, slot: u32) {
        self.state.attributes.remove(&slot);
        self.record(Op::DisableAttribute(slot));
    }

    fn release_buffer(&mut self, buffer: BufferId) -> Result<(), GfxError> {
        self.buffers.remove(buffer)?;
        if self.state.vertex_buffer == Some(buffer) {
            self.state.vertex_buffer = None;
        }
        if self.state.index_buffer == Some(buffer) {
            self.state.index_buffer = None;
        }
        self.record(Op::ReleaseBuffer(buffer));
        Ok(())
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, GfxError> {
        let info = reflect::compile(stage, source)?;
        let id = self.shaders.insert(info);
        self.record(Op::CompileShader(stage, id));
        Ok(id)
    }

    fn link_program(
        &mut self,
        vertex: ShaderId,
        fragment: ShaderId,
    ) -> Result<ProgramId, GfxError> {
        let info = reflect::link(self.shaders.get(vertex)?, self.shaders.get(fragment)?)?;
        log::debug!(
            "linked program: {} uniforms, {} vertex inputs",
            info.uniforms.len(),
            info.vertex_inputs.len()
        );
        let values = vec![None; info.uniforms.len()];
        let id = self.programs.insert(Program { info, values });
        self.record(Op::LinkProgram(id));
        Ok(id)
    }

    fn use_program(&mut self, program: Option<ProgramId>) -> Result<(), GfxError> {
        if let Some(id) = program {
            self.programs.get(id)?;
        }
        self.state.program = program;
        self.record(Op::UseProgram(program));
        Ok(())
    }

    fn uniform_location(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Result<UniformLocation, GfxError> {
        Ok(self.programs.get(program)?.info.locate(name))
    }

    fn set_uniform(
        &mut self,
        location: UniformLocation,
        value: UniformValue,
    ) -> Result<(), GfxError> {
        let Some(index) = location.index() else {
            return Ok(());
        };
        let id = self.state.program.ok_or(GfxError::NoActiveProgram)?;
        let program = self.programs.get_mut(id)?;
        let slot = program
            .info
            .uniforms
            .get(index)
            .ok_or(GfxError::InvalidUniformLocation(location.raw()))?;
        if !value.fits(slot.kind) {
            return Err(GfxError::UniformTypeMismatch {
                name: slot.name.clone(),
                expected: slot.kind,
                actual: value.type_name(),
            });
        }
        program.values[index] = Some(value);
        self.record(Op::SetUniform(location, value));
        Ok(())
    }

    fn release_shader(&mut self, shader: ShaderId) -> Result<(), GfxError> {
        self.shaders.remove(shader)?;
        self.record(Op::ReleaseShader(shader));
        Ok(())
    }

    fn release_program(&mut self, program: ProgramId) -> Result<(), GfxError> {
        self.programs.remove(program)?;
        if self.state.program == Some(program) {
            self.state.program = None;
        }
        self.record(Op::ReleaseProgram(program));
        Ok(())
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, GfxError> {
        desc.check_size()?;
        let texels = match pixels {
            Some(data) => {
                desc.check_data(data)?;
                data.chunks_exact(desc.format.bytes_per_pixel())
                    .map(|px| desc.format.to_rgba8(px))
                    .collect()
            }
            None => vec![[0, 0, 0, 0]; desc.width as usize * desc.height as usize],
        };
        let id = self.textures.insert(Texture {
            desc: *desc,
            texels,
        });
        self.record(Op::CreateTexture(id));
        Ok(id)
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) -> Result<(), GfxError> {
        match texture {
            Some(id) => {
                self.textures.get(id)?;
                self.state.textures.insert(unit, id);
            }
            None => {
                self.state.textures.remove(&unit);
            }
        }
        self.record(Op::BindTexture(unit, texture));
        Ok(())
    }

    fn release_texture(&mut self, texture: TextureId) -> Result<(), GfxError> {
        self.textures.remove(texture)?;
        self.state.textures.retain(|_, t| *t != texture);
        self.record(Op::ReleaseTexture(texture));
        Ok(())
    }

    fn create_framebuffer(&mut self, color: TextureId) -> Result<FramebufferId, GfxError> {
        let desc = self.textures.get(color)?.desc;
        if !matches!(desc.format, PixelFormat::Rgba8Unorm | PixelFormat::Bgra8Unorm) {
            return Err(GfxError::UnsupportedRenderTargetFormat(desc.format));
        }
        let n = desc.width as usize * desc.height as usize;
        let id = self.framebuffers.insert(Framebuffer {
            color,
            width: desc.width,
            height: desc.height,
            depth: vec![1.0; n],
            stencil: vec![0; n],
        });
        self.record(Op::CreateFramebuffer(id));
        Ok(id)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<(), GfxError> {
        if let Some(id) = framebuffer {
            self.framebuffers.get(id)?;
        }
        self.state.framebuffer = framebuffer;
        self.record(Op::BindFramebuffer(framebuffer));
        Ok(())
    }

    fn release_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), GfxError> {
        self.framebuffers.remove(framebuffer)?;
        if self.state.framebuffer == Some(framebuffer) {
            self.state.framebuffer = None;
        }
        self.record(Op::ReleaseFramebuffer(framebuffer));
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.state.viewport = viewport;
        self.record(Op::Viewport(viewport));
    }

    fn set_clear_values(&mut self, values: ClearValues) {
        self.state.clear = values;
        self.record(Op::ClearValues(values));
    }

    fn clear(&mut self, mask: ClearMask) -> Result<(), GfxError> {
        let values = self.state.clear;
        let pixel = self.state.pixel;
        let mut planes = self.target_planes()?;

        if mask.color {
            planes.color.fill(values.color.to_rgba8());
        }
        if mask.depth && pixel.depth_mask {
            planes.depth.fill(values.depth);
        }
        if mask.stencil {
            for s in planes.stencil.iter_mut() {
                pixel.write_stencil(s, values.stencil);
            }
        }
        self.record(Op::Clear(mask));
        Ok(())
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.pixel.depth_test = enabled;
        self.record(Op::DepthTest(enabled));
    }

    fn set_depth_mask(&mut self, write: bool) {
        self.state.pixel.depth_mask = write;
        self.record(Op::DepthMask(write));
    }

    fn set_stencil_test(&mut self, enabled: bool) {
        self.state.pixel.stencil_test = enabled;
        self.record(Op::StencilTest(enabled));
    }

    fn set_stencil_func(&mut self, func: StencilFunc) {
        self.state.pixel.stencil_func = func;
        self.record(Op::StencilFunc(func));
    }

    fn set_stencil_op(&mut self, ops: StencilOps) {
        self.state.pixel.stencil_ops = ops;
        self.record(Op::StencilOp(ops));
    }

    fn set_stencil_mask(&mut self, mask: u8) {
        self.state.pixel.stencil_mask = mask;
        self.record(Op::StencilMask(mask));
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> Result<(), GfxError> {
        let ids: Vec<u32> = fetch::array_range(first, count)?.collect();
        self.draw(&ids)?;
        self.record(Op::DrawArrays { first, count });
        Ok(())
    }

    fn draw_elements(&mut self, count: u32, format: IndexFormat) -> Result<(), GfxError> {
        let id = self.state.index_buffer.ok_or(GfxError::NoIndexBuffer)?;
        let ids = fetch::decode_indices(&self.buffers.get(id)?.data, count, format)?;
        self.draw(&ids)?;
        self.record(Op::DrawElements { count, format });
        Ok(())
    }

    fn present(&mut self) -> Result<(), GfxError> {
        self.presented += 1;
        self.record(Op::Present);
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface.width, self.surface.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{ResourceKind, StencilOp};

    const FLAT_VS: &str = r#"
struct Uniforms { color: vec4<f32> }
@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 0.5, 1.0);
}
"#;

    const FLAT_FS: &str = r#"
struct Uniforms { color: vec4<f32> }
@group(0) @binding(0) var<uniform> u: Uniforms;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u.color;
}
"#;

    fn full_quad() -> Vec<u8> {
        let v: [f32; 12] = [
            -1.0, 1.0, 1.0, 1.0, 1.0, -1.0, //
            1.0, -1.0, -1.0, -1.0, -1.0, 1.0,
        ];
        bytemuck::cast_slice(&v).to_vec()
    }

    fn flat_setup(gfx: &mut SoftwareBackend) -> (ProgramId, UniformLocation) {
        let vs = gfx.compile_shader(ShaderStage::Vertex, FLAT_VS).unwrap();
        let fs = gfx.compile_shader(ShaderStage::Fragment, FLAT_FS).unwrap();
        let program = gfx.link_program(vs, fs).unwrap();
        gfx.use_program(Some(program)).unwrap();
        let color = gfx.uniform_location(program, "color").unwrap();

        let vbo = gfx.create_buffer(BufferKind::Vertex, &full_quad()).unwrap();
        gfx.bind_buffer(BufferKind::Vertex, Some(vbo)).unwrap();
        gfx.declare_attribute(VertexAttribute::f32(0, 2, 8, 0)).unwrap();
        (program, color)
    }

    #[test]
    fn clear_fills_color_and_honours_masks() {
        let mut gfx = SoftwareBackend::new(4, 4);
        gfx.set_clear_values(ClearValues {
            color: Color::rgb(1.0, 0.0, 0.0),
            depth: 0.25,
            stencil: 0xff,
        });
        gfx.set_depth_mask(false);
        gfx.set_stencil_mask(0x0f);
        gfx.clear(ClearMask::ALL).unwrap();

        assert_eq!(gfx.pixel(3, 3), Some([255, 0, 0, 255]));
        assert_eq!(gfx.depth_value(0, 0), Some(1.0));
        assert_eq!(gfx.stencil_value(0, 0), Some(0x0f));
    }

    #[test]
    fn flat_quad_covers_surface() {
        let mut gfx = SoftwareBackend::new(8, 8);
        let (_, color) = flat_setup(&mut gfx);
        gfx.set_uniform(color, Color::rgb(0.0, 1.0, 0.0).into()).unwrap();
        gfx.draw_arrays(0, 6).unwrap();

        assert!(gfx.color_plane().iter().all(|px| *px == [0, 255, 0, 255]));
        assert_eq!(gfx.last_fetch_extent(), 48);
    }

    #[test]
    fn stencil_equal_limits_coverage() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let (_, color) = flat_setup(&mut gfx);
        gfx.set_uniform(color, Color::WHITE.into()).unwrap();

        // Stamp stencil=1 into the top-left pixel only.
        gfx.set_viewport(Viewport::new(0, 0, 1, 1));
        gfx.set_stencil_test(true);
        gfx.set_stencil_func(StencilFunc {
            compare: CompareFunc::Always,
            reference: 1,
            read_mask: 0xff,
        });
        gfx.set_stencil_op(StencilOps::REPLACE_ON_PASS);
        gfx.draw_arrays(0, 6).unwrap();

        gfx.set_clear_values(ClearValues::default());
        gfx.clear(ClearMask::COLOR_DEPTH).unwrap();
        gfx.set_viewport(Viewport::full(4, 4));
        gfx.set_stencil_func(StencilFunc {
            compare: CompareFunc::Equal,
            reference: 1,
            read_mask: 0xff,
        });
        gfx.set_stencil_op(StencilOps::KEEP);
        gfx.draw_arrays(0, 6).unwrap();

        let lit = gfx.color_plane().iter().filter(|px| px[0] == 255).count();
        assert_eq!(lit, 1);
        assert_eq!(gfx.pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn stencil_fail_op_applies_on_rejection() {
        let state = PixelState {
            stencil_test: true,
            stencil_func: StencilFunc {
                compare: CompareFunc::Never,
                reference: 7,
                read_mask: 0xff,
            },
            stencil_ops: StencilOps {
                stencil_fail: StencilOp::Replace,
                depth_fail: StencilOp::Keep,
                pass: StencilOp::Keep,
            },
            ..PixelState::default()
        };
        let (mut depth, mut stencil) = (1.0, 0);
        assert!(!state.test(&mut depth, &mut stencil, 0.5));
        assert_eq!(stencil, 7);
    }

    #[test]
    fn depth_test_keeps_nearest_and_skips_writes_when_masked() {
        let mut state = PixelState {
            depth_test: true,
            ..PixelState::default()
        };
        let (mut depth, mut stencil) = (1.0, 0);
        assert!(state.test(&mut depth, &mut stencil, 0.4));
        assert_eq!(depth, 0.4);
        assert!(!state.test(&mut depth, &mut stencil, 0.6));

        state.depth_mask = false;
        assert!(state.test(&mut depth, &mut stencil, 0.1));
        assert_eq!(depth, 0.4);
    }

    #[test]
    fn draw_past_buffer_end_is_rejected() {
        let mut gfx = SoftwareBackend::new(4, 4);
        flat_setup(&mut gfx);
        let before = gfx.journal().len();
        assert!(matches!(
            gfx.draw_arrays(0, 7),
            Err(GfxError::AttributeOutOfBounds {
                slot: 0,
                required: 56,
                available: 48
            })
        ));
        assert_eq!(gfx.journal().len(), before);
    }

    #[test]
    fn attribute_offset_overflow_is_rejected() {
        let mut gfx = SoftwareBackend::new(4, 4);
        flat_setup(&mut gfx);
        gfx.declare_attribute(VertexAttribute::f32(0, 2, 8, u64::MAX - 4))
            .unwrap();
        assert!(matches!(
            gfx.draw_arrays(0, 3),
            Err(GfxError::AttributeOutOfBounds { slot: 0, .. })
        ));
    }

    #[test]
    fn zero_count_draws_are_no_ops() {
        let mut gfx = SoftwareBackend::new(4, 4);
        flat_setup(&mut gfx);
        let empty = gfx.create_buffer(BufferKind::Vertex, &[]).unwrap();
        gfx.bind_buffer(BufferKind::Vertex, Some(empty)).unwrap();
        gfx.declare_attribute(VertexAttribute::f32(0, 2, 8, 0)).unwrap();
        gfx.clear(ClearMask::ALL).unwrap();
        gfx.draw_arrays(0, 0).unwrap();
        assert_eq!(gfx.journal().last(), Some(&Op::DrawArrays { first: 0, count: 0 }));
        assert!(gfx.color_plane().iter().all(|px| *px == [0, 0, 0, 255]));
    }

    #[test]
    fn missing_attribute_is_reported() {
        let mut gfx = SoftwareBackend::new(4, 4);
        flat_setup(&mut gfx);
        gfx.disable_attribute(0);
        assert_eq!(
            gfx.draw_arrays(0, 3),
            Err(GfxError::MissingAttribute { location: 0 })
        );
    }

    #[test]
    fn indexed_draw_checks_index_buffer_length() {
        let mut gfx = SoftwareBackend::new(4, 4);
        flat_setup(&mut gfx);
        assert_eq!(
            gfx.draw_elements(3, IndexFormat::U16),
            Err(GfxError::NoIndexBuffer)
        );
        let ibo = gfx
            .create_buffer(BufferKind::Index, bytemuck::cast_slice(&[0u16, 1, 2]))
            .unwrap();
        gfx.bind_buffer(BufferKind::Index, Some(ibo)).unwrap();
        assert!(gfx.draw_elements(3, IndexFormat::U16).is_ok());
        assert_eq!(
            gfx.draw_elements(6, IndexFormat::U16),
            Err(GfxError::IndexOutOfBounds { index: 6, limit: 3 })
        );
    }

    #[test]
    fn uniform_type_is_checked_and_sentinel_is_ignored() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let (program, color) = flat_setup(&mut gfx);
        assert!(matches!(
            gfx.set_uniform(color, UniformValue::Float(1.0)),
            Err(GfxError::UniformTypeMismatch { .. })
        ));
        let missing = gfx.uniform_location(program, "nope").unwrap();
        assert_eq!(missing, UniformLocation::INVALID);
        assert_eq!(gfx.set_uniform(missing, UniformValue::Float(1.0)), Ok(()));
    }

    #[test]
    fn framebuffer_requires_renderable_format() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let desc = TextureDesc {
            format: PixelFormat::Rgb8Unorm,
            ..TextureDesc::rgba8(2, 2)
        };
        let tex = gfx.create_texture(&desc, None).unwrap();
        assert_eq!(
            gfx.create_framebuffer(tex),
            Err(GfxError::UnsupportedRenderTargetFormat(PixelFormat::Rgb8Unorm))
        );
    }

    #[test]
    fn offscreen_draw_lands_in_texture() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let (_, color) = flat_setup(&mut gfx);
        let tex = gfx.create_texture(&TextureDesc::rgba8(2, 2), None).unwrap();
        let fbo = gfx.create_framebuffer(tex).unwrap();
        gfx.bind_framebuffer(Some(fbo)).unwrap();
        gfx.set_viewport(Viewport::full(2, 2));
        gfx.set_uniform(color, Color::rgb(0.0, 0.0, 1.0).into()).unwrap();
        gfx.draw_arrays(0, 6).unwrap();

        assert!(gfx.texture_pixels(tex).unwrap().iter().all(|t| *t == [0, 0, 255, 255]));
        assert_eq!(gfx.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn released_resources_reject_second_release() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let buf = gfx.create_buffer(BufferKind::Vertex, &[0; 4]).unwrap();
        gfx.release_buffer(buf).unwrap();
        assert!(matches!(
            gfx.release_buffer(buf),
            Err(GfxError::InvalidHandle { kind: ResourceKind::Buffer, .. })
        ));
        assert_eq!(gfx.live_resources(), 0);
    }

    #[test]
    fn repeat_wrap_tiles_and_clamp_holds_edge() {
        let mut tex = SampledTexture {
            width: 2,
            height: 1,
            filter: Filter::Nearest,
            wrap: Wrap::Repeat,
            texels: vec![[255, 0, 0, 255], [0, 255, 0, 255]],
        };
        assert_eq!(tex.sample(Vec2::new(1.25, 0.5)).x, 1.0);
        tex.wrap = Wrap::ClampToEdge;
        assert_eq!(tex.sample(Vec2::new(1.25, 0.5)).y, 1.0);
    }
}
