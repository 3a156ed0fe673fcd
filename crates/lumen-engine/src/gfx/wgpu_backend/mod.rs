//! wgpu implementation of [`Backend`].
//!
//! wgpu has no immediate-mode context, so calls are applied to a shadow of the binding
//! state and every clear or draw is recorded with a snapshot of what it needs: target views,
//! pipeline, uniform bytes, texture views and vertex buffers. [`Backend::present`] replays
//! the recording into render passes and shows the frame.
//!
//! Each declared attribute is fed from its own vertex buffer slot at the attribute's offset,
//! so interleaved and split layouts both map directly. wgpu requires attribute strides and
//! offsets to be multiples of four bytes.

mod convert;
mod frame;
mod pipeline;

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU64;

use winit::dpi::PhysicalSize;

use frame::{ClearCall, Command, DrawCall, Resource, SurfaceViews, Target, UniformArena};
use pipeline::{DepthStencilKey, PipelineKey, ProgramStages, VertexStream};

use super::fetch;
use super::reflect::{self, ProgramInfo, ResourceType, ScalarClass, StageInfo};
use super::{
    AttribType, Backend, BufferId, BufferKind, ClearMask, ClearValues, FramebufferId, GfxError,
    HandleTable, IndexFormat, PixelFormat, ProgramId, ShaderId, ShaderStage, StencilFunc,
    StencilOps, TextureDesc, TextureId, UniformKind, UniformLocation, UniformValue,
    VertexAttribute, Viewport,
};
use crate::device::{DepthStencil, Gpu, SurfaceErrorAction};

struct GpuBuffer {
    kind: BufferKind,
    buffer: wgpu::Buffer,
    len: u64,
    /// CPU copy of index data, for bounds checks at draw time.
    indices: Option<Vec<u8>>,
}

struct GpuShader {
    info: StageInfo,
    module: wgpu::ShaderModule,
}

struct GpuProgram {
    info: ProgramInfo,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    /// Current bytes of each uniform block, by binding.
    blocks: BTreeMap<u32, Vec<u8>>,
    /// Texture unit selected for each texture binding.
    units: BTreeMap<u32, u32>,
}

struct GpuTexture {
    desc: TextureDesc,
    format: wgpu::TextureFormat,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    renderable: bool,
}

struct GpuFramebuffer {
    color: TextureId,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    depth: DepthStencil,
}

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
    depth_test: bool,
    depth_mask: bool,
    stencil_test: bool,
    stencil_func: StencilFunc,
    stencil_ops: StencilOps,
    stencil_mask: u8,
}

impl State {
    fn depth_stencil_key(&self) -> DepthStencilKey {
        DepthStencilKey {
            depth_test: self.depth_test,
            depth_mask: self.depth_mask,
            stencil_test: self.stencil_test,
            compare: self.stencil_func.compare,
            read_mask: self.stencil_func.read_mask,
            ops: self.stencil_ops,
            write_mask: self.stencil_mask,
        }
    }
}

/// GPU backend bound to a window surface.
pub struct WgpuBackend<'w> {
    gpu: Gpu<'w>,

    buffers: HandleTable<BufferId, GpuBuffer>,
    shaders: HandleTable<ShaderId, GpuShader>,
    programs: HandleTable<ProgramId, GpuProgram>,
    textures: HandleTable<TextureId, GpuTexture>,
    framebuffers: HandleTable<FramebufferId, GpuFramebuffer>,

    state: State,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    commands: Vec<Command>,
    arena: UniformArena,

    /// Bound for texture uniforms whose unit has nothing bound.
    fallback_view: wgpu::TextureView,
    fallback_sampler: wgpu::Sampler,

    presented: u64,
    warned_viewport_clamp: bool,
    warned_partial_stencil_clear: bool,
}

impl<'w> WgpuBackend<'w> {
    pub fn new(gpu: Gpu<'w>) -> Self {
        let size = gpu.size();
        let alignment = gpu.device().limits().min_uniform_buffer_offset_alignment;

        let fallback = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen fallback texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &fallback,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[0, 0, 0, 255],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let fallback_view = fallback.create_view(&wgpu::TextureViewDescriptor::default());
        let fallback_sampler = gpu
            .device()
            .create_sampler(&wgpu::SamplerDescriptor::default());

        Self {
            gpu,
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
                viewport: Viewport::full(size.width, size.height),
                clear: ClearValues::default(),
                depth_test: false,
                depth_mask: true,
                stencil_test: false,
                stencil_func: StencilFunc::default(),
                stencil_ops: StencilOps::KEEP,
                stencil_mask: 0xff,
            },
            pipelines: HashMap::new(),
            commands: Vec::new(),
            arena: UniformArena::new(alignment),
            fallback_view,
            fallback_sampler,
            presented: 0,
            warned_viewport_clamp: false,
            warned_partial_stencil_clear: false,
        }
    }

    pub fn gpu(&self) -> &Gpu<'w> {
        &self.gpu
    }

    /// Reconfigures the surface and its depth/stencil attachment. When the surface is the
    /// bound target the viewport is reset to cover it.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.gpu.resize(size);
        if self.state.framebuffer.is_none() {
            let size = self.gpu.size();
            self.state.viewport = Viewport::full(size.width, size.height);
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    /// The bound target, its color format and size.
    fn current_target(&self) -> Result<(Target, wgpu::TextureFormat, (u32, u32)), GfxError> {
        match self.state.framebuffer {
            None => Ok((Target::Surface, self.gpu.surface_format(), self.surface_size())),
            Some(id) => {
                let fb = self.framebuffers.get(id)?;
                let color = self.textures.get(fb.color)?;
                Ok((
                    Target::Offscreen {
                        id,
                        color: color.view.clone(),
                        depth: fb.depth.view.clone(),
                    },
                    fb.format,
                    (fb.width, fb.height),
                ))
            }
        }
    }

    fn clamp_viewport(&mut self, width: u32, height: u32) -> Option<[f32; 4]> {
        let vp = self.state.viewport;
        let x0 = vp.x.max(0);
        let y0 = vp.y.max(0);
        let x1 = (vp.x + vp.width as i32).min(width as i32);
        let y1 = (vp.y + vp.height as i32).min(height as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        let clamped = [x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32];
        let exact = [vp.x as f32, vp.y as f32, vp.width as f32, vp.height as f32];
        if clamped != exact && !self.warned_viewport_clamp {
            self.warned_viewport_clamp = true;
            log::debug!("viewport {vp:?} exceeds the {width}x{height} target; clamping");
        }
        Some(clamped)
    }

    /// Validates the draw against the current state and records it.
    fn record_draw(
        &mut self,
        range: std::ops::Range<u32>,
        max_vertex: Option<u32>,
        index: Option<(wgpu::Buffer, IndexFormat)>,
    ) -> Result<(), GfxError> {
        let program_id = self.state.program.ok_or(GfxError::NoActiveProgram)?;
        let (target, color_format, (width, height)) = self.current_target()?;

        let program = self.programs.get(program_id)?;
        let mut streams = Vec::with_capacity(program.info.vertex_inputs.len());
        let mut vertex_buffers = Vec::with_capacity(program.info.vertex_inputs.len());
        for input in &program.info.vertex_inputs {
            let attr = self
                .state
                .attributes
                .get(&input.location)
                .copied()
                .ok_or(GfxError::MissingAttribute {
                    location: input.location,
                })?;
            let buffer = self.buffers.get(attr.buffer)?;
            fetch::check_attribute(&attr.desc, max_vertex, buffer.len)?;

            let integer_input = matches!(input.ty.class, ScalarClass::Sint | ScalarClass::Uint);
            let integer_attr = attr.desc.ty != AttribType::F32 && !attr.desc.normalized;
            if integer_input != integer_attr {
                return Err(GfxError::InvalidLayout(format!(
                    "attribute {} does not match the shader input `{}`",
                    attr.desc.slot, input.name
                )));
            }

            streams.push(VertexStream {
                location: input.location,
                format: convert::vertex_format(&attr.desc)?,
                stride: attr.desc.effective_stride(),
            });
            vertex_buffers.push((buffer.buffer.clone(), attr.desc.offset));
        }

        let mut resources = Vec::with_capacity(program.info.bindings.len());
        let mut paired_sampler = None;
        for binding in &program.info.bindings {
            match &binding.ty {
                ResourceType::Uniform { size, .. } => {
                    let bytes = program
                        .blocks
                        .get(&binding.binding)
                        .cloned()
                        .unwrap_or_else(|| vec![0; *size as usize]);
                    resources.push(Resource::Uniform {
                        binding: binding.binding,
                        bytes,
                    });
                }
                ResourceType::Texture => {
                    let unit = program.units.get(&binding.binding).copied().unwrap_or(0);
                    let texture = self
                        .state
                        .textures
                        .get(&unit)
                        .and_then(|id| self.textures.get(*id).ok());
                    let (view, sampler) = match texture {
                        Some(t) => (t.view.clone(), t.sampler.clone()),
                        None => (self.fallback_view.clone(), self.fallback_sampler.clone()),
                    };
                    paired_sampler.get_or_insert(sampler);
                    resources.push(Resource::Texture {
                        binding: binding.binding,
                        view,
                    });
                }
                ResourceType::Sampler => resources.push(Resource::Sampler {
                    binding: binding.binding,
                    sampler: paired_sampler
                        .clone()
                        .unwrap_or_else(|| self.fallback_sampler.clone()),
                }),
            }
        }

        let key = PipelineKey {
            program: program_id,
            streams,
            depth_stencil: self.state.depth_stencil_key(),
            color_format,
        };
        let pipeline = match self.pipelines.get(&key) {
            Some(p) => p.clone(),
            None => {
                let p = pipeline::create_pipeline(
                    self.gpu.device(),
                    &key,
                    ProgramStages {
                        vertex: &program.vertex,
                        vertex_entry: &program.info.vertex_entry,
                        fragment: &program.fragment,
                        fragment_entry: &program.info.fragment_entry,
                        layout: &program.layout,
                    },
                );
                self.pipelines.insert(key, p.clone());
                p
            }
        };
        let layout = program.bind_group_layout.clone();

        if range.is_empty() {
            return Ok(());
        }
        let Some(viewport) = self.clamp_viewport(width, height) else {
            return Ok(());
        };

        self.commands.push(Command::Draw(Box::new(DrawCall {
            target,
            pipeline,
            layout,
            resources,
            streams: vertex_buffers,
            index: index.map(|(b, f)| (b, convert::index_format(f))),
            range,
            viewport,
            stencil_reference: u32::from(self.state.stencil_func.reference),
        })));
        Ok(())
    }
}

fn uniform_bytes(value: &UniformValue) -> &[u8] {
    match value {
        UniformValue::Float(v) => bytemuck::bytes_of(v),
        UniformValue::Int(v) => bytemuck::bytes_of(v),
        UniformValue::Vec4(v) => bytemuck::cast_slice(v),
        UniformValue::Mat4(v) => bytemuck::cast_slice(v),
    }
}

impl Backend for WgpuBackend<'_> {
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId, GfxError> {
        let len = data.len() as u64;
        let padded = len.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT).max(4);
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let buffer = self.gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(match kind {
                BufferKind::Vertex => "lumen vertex buffer",
                BufferKind::Index => "lumen index buffer",
            }),
            size: padded,
            usage,
            mapped_at_creation: false,
        });
        let mut upload = data.to_vec();
        upload.resize(padded as usize, 0);
        self.gpu.queue().write_buffer(&buffer, 0, &upload);

        Ok(self.buffers.insert(GpuBuffer {
            kind,
            buffer,
            len,
            indices: (kind == BufferKind::Index).then(|| data.to_vec()),
        }))
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
        Ok(())
    }

    fn declare_attribute(&mut self, attribute: VertexAttribute) -> Result<(), GfxError> {
        attribute.validate()?;
        convert::vertex_format(&attribute)?;
        if attribute.effective_stride() % 4 != 0 || attribute.offset % 4 != 0 {
            return Err(GfxError::InvalidLayout(format!(
                "attribute {} stride and offset must be multiples of 4",
                attribute.slot
            )));
        }
        let buffer = self.state.vertex_buffer.ok_or(GfxError::NoVertexBuffer)?;
        self.buffers.get(buffer)?;
        self.state.attributes.insert(
            attribute.slot,
            Attribute {
                buffer,
                desc: attribute,
            },
        );
        Ok(())
    }

    fn disable_attribute(&mut self, slot: u32) {
        self.state.attributes.remove(&slot);
    }

    fn release_buffer(&mut self, buffer: BufferId) -> Result<(), GfxError> {
        self.buffers.remove(buffer)?;
        if self.state.vertex_buffer == Some(buffer) {
            self.state.vertex_buffer = None;
        }
        if self.state.index_buffer == Some(buffer) {
            self.state.index_buffer = None;
        }
        Ok(())
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, GfxError> {
        let info = reflect::compile(stage, source)?;
        let module = self
            .gpu
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "lumen vertex shader",
                    ShaderStage::Fragment => "lumen fragment shader",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        Ok(self.shaders.insert(GpuShader { info, module }))
    }

    fn link_program(
        &mut self,
        vertex: ShaderId,
        fragment: ShaderId,
    ) -> Result<ProgramId, GfxError> {
        let vs = self.shaders.get(vertex)?;
        let fs = self.shaders.get(fragment)?;
        let info = reflect::link(&vs.info, &fs.info)?;

        let entries: Vec<wgpu::BindGroupLayoutEntry> = info
            .bindings
            .iter()
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: match &b.ty {
                    ResourceType::Uniform { size, .. } => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(u64::from(*size)),
                    },
                    ResourceType::Texture => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    ResourceType::Sampler => {
                        wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                    }
                },
                count: None,
            })
            .collect();

        let device = self.gpu.device();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen program bgl"),
            entries: &entries,
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen program layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let blocks = info
            .bindings
            .iter()
            .filter_map(|b| match b.ty {
                ResourceType::Uniform { size, .. } => Some((b.binding, vec![0; size as usize])),
                _ => None,
            })
            .collect();

        log::debug!(
            "linked program `{}`/`{}`: {} uniforms",
            info.vertex_entry,
            info.fragment_entry,
            info.uniforms.len()
        );

        Ok(self.programs.insert(GpuProgram {
            vertex: vs.module.clone(),
            fragment: fs.module.clone(),
            info,
            bind_group_layout,
            layout,
            blocks,
            units: BTreeMap::new(),
        }))
    }

    fn use_program(&mut self, program: Option<ProgramId>) -> Result<(), GfxError> {
        if let Some(id) = program {
            self.programs.get(id)?;
        }
        self.state.program = program;
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
        if !location.is_valid() {
            return Ok(());
        }
        let id = self.state.program.ok_or(GfxError::NoActiveProgram)?;
        let program = self.programs.get_mut(id)?;
        let slot = program
            .info
            .slot(location)
            .ok_or(GfxError::InvalidUniformLocation(location.raw()))?;
        if !value.fits(slot.kind) {
            return Err(GfxError::UniformTypeMismatch {
                name: slot.name.clone(),
                expected: slot.kind,
                actual: value.type_name(),
            });
        }

        if slot.kind == UniformKind::Texture {
            if let UniformValue::Int(unit) = value {
                program.units.insert(slot.binding, unit.max(0) as u32);
            }
            return Ok(());
        }

        let (binding, offset) = (slot.binding, slot.offset as usize);
        let bytes = uniform_bytes(&value);
        if let Some(block) = program.blocks.get_mut(&binding) {
            if let Some(dst) = block.get_mut(offset..offset + bytes.len()) {
                dst.copy_from_slice(bytes);
            }
        }
        Ok(())
    }

    fn release_shader(&mut self, shader: ShaderId) -> Result<(), GfxError> {
        self.shaders.remove(shader)?;
        Ok(())
    }

    fn release_program(&mut self, program: ProgramId) -> Result<(), GfxError> {
        self.programs.remove(program)?;
        self.pipelines.retain(|key, _| key.program != program);
        if self.state.program == Some(program) {
            self.state.program = None;
        }
        Ok(())
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, GfxError> {
        desc.check_size()?;
        if let Some(data) = pixels {
            desc.check_data(data)?;
        }

        let format = convert::texture_format(desc.format);
        let renderable =
            desc.format != PixelFormat::Rgb8Unorm && self.gpu.supports_render_target(format);
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if renderable {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let device = self.gpu.device();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        if let Some(data) = pixels {
            let bytes = convert::upload_bytes(desc.format, data);
            let bpp = format.block_copy_size(None).unwrap_or(4);
            self.gpu.queue().write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &bytes,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(desc.width * bpp),
                    rows_per_image: Some(desc.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let address = convert::address_mode(desc.wrap);
        let filter = convert::filter(desc.filter);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen sampler"),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        });

        Ok(self.textures.insert(GpuTexture {
            desc: *desc,
            format,
            view,
            sampler,
            renderable,
        }))
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
        Ok(())
    }

    fn release_texture(&mut self, texture: TextureId) -> Result<(), GfxError> {
        self.textures.remove(texture)?;
        self.state.textures.retain(|_, t| *t != texture);
        Ok(())
    }

    fn create_framebuffer(&mut self, color: TextureId) -> Result<FramebufferId, GfxError> {
        let tex = self.textures.get(color)?;
        if !tex.renderable {
            return Err(GfxError::UnsupportedRenderTargetFormat(tex.desc.format));
        }
        let (width, height, format) = (tex.desc.width, tex.desc.height, tex.format);
        let depth = self.gpu.create_depth_stencil(width, height);
        log::debug!("framebuffer {width}x{height} {format:?}");
        Ok(self.framebuffers.insert(GpuFramebuffer {
            color,
            format,
            width,
            height,
            depth,
        }))
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<(), GfxError> {
        if let Some(id) = framebuffer {
            self.framebuffers.get(id)?;
        }
        self.state.framebuffer = framebuffer;
        Ok(())
    }

    fn release_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), GfxError> {
        self.framebuffers.remove(framebuffer)?;
        if self.state.framebuffer == Some(framebuffer) {
            self.state.framebuffer = None;
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.state.viewport = viewport;
    }

    fn set_clear_values(&mut self, values: ClearValues) {
        self.state.clear = values;
    }

    fn clear(&mut self, mask: ClearMask) -> Result<(), GfxError> {
        let (target, _, _) = self.current_target()?;
        let values = self.state.clear;

        let stencil = (mask.stencil && self.state.stencil_mask != 0).then(|| {
            if self.state.stencil_mask != 0xff && !self.warned_partial_stencil_clear {
                self.warned_partial_stencil_clear = true;
                log::debug!(
                    "stencil write mask {:#04x} is not applied to clears",
                    self.state.stencil_mask
                );
            }
            u32::from(values.stencil & self.state.stencil_mask)
        });

        self.commands.push(Command::Clear(ClearCall {
            target,
            color: mask.color.then(|| convert::color(values.color)),
            depth: (mask.depth && self.state.depth_mask).then_some(values.depth),
            stencil,
        }));
        Ok(())
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn set_depth_mask(&mut self, write: bool) {
        self.state.depth_mask = write;
    }

    fn set_stencil_test(&mut self, enabled: bool) {
        self.state.stencil_test = enabled;
    }

    fn set_stencil_func(&mut self, func: StencilFunc) {
        self.state.stencil_func = func;
    }

    fn set_stencil_op(&mut self, ops: StencilOps) {
        self.state.stencil_ops = ops;
    }

    fn set_stencil_mask(&mut self, mask: u8) {
        self.state.stencil_mask = mask;
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> Result<(), GfxError> {
        let range = fetch::array_range(first, count)?;
        let max_vertex = range.clone().last();
        self.record_draw(range, max_vertex, None)
    }

    fn draw_elements(&mut self, count: u32, format: IndexFormat) -> Result<(), GfxError> {
        let id = self.state.index_buffer.ok_or(GfxError::NoIndexBuffer)?;
        let buffer = self.buffers.get(id)?;
        let data = buffer.indices.as_deref().unwrap_or_default();
        let indices = fetch::decode_indices(data, count, format)?;
        let max_vertex = indices.iter().copied().max();
        let index_buffer = buffer.buffer.clone();
        self.record_draw(0..count, max_vertex, Some((index_buffer, format)))
    }

    fn present(&mut self) -> Result<(), GfxError> {
        let commands = std::mem::take(&mut self.commands);

        let mut frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                let reason = format!("{err:?}");
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => Err(GfxError::Surface(format!(
                        "surface acquisition failed fatally: {reason}"
                    ))),
                    action => {
                        log::debug!("skipping frame after surface error ({action:?})");
                        Ok(())
                    }
                };
            }
        };

        frame::encode(
            self.gpu.device(),
            self.gpu.queue(),
            &mut self.arena,
            &mut frame.encoder,
            SurfaceViews {
                color: &frame.view,
                depth: &self.gpu.surface_depth_stencil().view,
            },
            &commands,
        );
        self.gpu.submit(frame);
        self.presented += 1;
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        let size = self.gpu.size();
        (size.width, size.height)
    }
}
