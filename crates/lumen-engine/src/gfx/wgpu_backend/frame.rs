//! Recorded frame commands and their replay as wgpu render passes.
//!
//! Clears and draws are recorded in call order. At present time consecutive commands that
//! hit the same target are merged into one render pass; a clear that arrives before any draw
//! of its pass becomes that pass's load op, a clear after draws starts a new pass.

use std::num::NonZeroU64;
use std::ops::Range;

use crate::gfx::FramebufferId;

/// Where a command renders.
#[derive(Clone)]
pub(super) enum Target {
    Surface,
    Offscreen {
        id: FramebufferId,
        color: wgpu::TextureView,
        depth: wgpu::TextureView,
    },
}

impl Target {
    fn same(&self, other: &Target) -> bool {
        match (self, other) {
            (Target::Surface, Target::Surface) => true,
            (Target::Offscreen { id: a, .. }, Target::Offscreen { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// A resource bound for one draw, by binding index in group 0.
pub(super) enum Resource {
    Uniform { binding: u32, bytes: Vec<u8> },
    Texture { binding: u32, view: wgpu::TextureView },
    Sampler { binding: u32, sampler: wgpu::Sampler },
}

pub(super) struct DrawCall {
    pub target: Target,
    pub pipeline: wgpu::RenderPipeline,
    pub layout: wgpu::BindGroupLayout,
    pub resources: Vec<Resource>,
    /// One buffer per vertex stream, with the attribute's byte offset.
    pub streams: Vec<(wgpu::Buffer, u64)>,
    pub index: Option<(wgpu::Buffer, wgpu::IndexFormat)>,
    /// Vertex range, or index range for indexed draws.
    pub range: Range<u32>,
    /// `x, y, width, height` in target pixels.
    pub viewport: [f32; 4],
    pub stencil_reference: u32,
}

pub(super) struct ClearCall {
    pub target: Target,
    pub color: Option<wgpu::Color>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
}

pub(super) enum Command {
    Clear(ClearCall),
    Draw(Box<DrawCall>),
}

/// Per-frame storage for uniform blocks, packed at the device's offset alignment.
pub(super) struct UniformArena {
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    alignment: u64,
}

impl UniformArena {
    pub(super) fn new(alignment: u32) -> Self {
        Self {
            buffer: None,
            capacity: 0,
            alignment: u64::from(alignment.max(1)),
        }
    }

    /// Uploads every block and returns each one's offset, in order.
    fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        blocks: &[&[u8]],
    ) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(blocks.len());
        let mut staging = Vec::new();
        for block in blocks {
            let offset = (staging.len() as u64).next_multiple_of(self.alignment);
            staging.resize(offset as usize, 0);
            staging.extend_from_slice(block);
            offsets.push(offset);
        }
        if staging.is_empty() {
            return offsets;
        }

        let needed = (staging.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        staging.resize(needed as usize, 0);
        if self.buffer.is_none() || self.capacity < needed {
            let capacity = needed.next_power_of_two().max(1024);
            log::debug!("growing uniform arena to {capacity} bytes");
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lumen uniform arena"),
                size: capacity,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.capacity = capacity;
        }
        if let Some(buffer) = &self.buffer {
            queue.write_buffer(buffer, 0, &staging);
        }
        offsets
    }
}

/// Load operations and draws of one render pass.
struct Segment {
    target: Target,
    color: wgpu::LoadOp<wgpu::Color>,
    depth: wgpu::LoadOp<f32>,
    stencil: wgpu::LoadOp<u32>,
    draws: Vec<usize>,
}

impl Segment {
    fn load(target: Target) -> Self {
        Self {
            target,
            color: wgpu::LoadOp::Load,
            depth: wgpu::LoadOp::Load,
            stencil: wgpu::LoadOp::Load,
            draws: Vec::new(),
        }
    }

    fn apply_clear(&mut self, clear: &ClearCall) {
        if let Some(c) = clear.color {
            self.color = wgpu::LoadOp::Clear(c);
        }
        if let Some(d) = clear.depth {
            self.depth = wgpu::LoadOp::Clear(d);
        }
        if let Some(s) = clear.stencil {
            self.stencil = wgpu::LoadOp::Clear(s);
        }
    }
}

fn split_passes(commands: &[Command]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut draw_index = 0;
    for command in commands {
        match command {
            Command::Clear(clear) => match segments.last_mut() {
                Some(seg) if seg.target.same(&clear.target) && seg.draws.is_empty() => {
                    seg.apply_clear(clear);
                }
                _ => {
                    let mut seg = Segment::load(clear.target.clone());
                    seg.apply_clear(clear);
                    segments.push(seg);
                }
            },
            Command::Draw(draw) => {
                match segments.last_mut() {
                    Some(seg) if seg.target.same(&draw.target) => seg.draws.push(draw_index),
                    _ => {
                        let mut seg = Segment::load(draw.target.clone());
                        seg.draws.push(draw_index);
                        segments.push(seg);
                    }
                }
                draw_index += 1;
            }
        }
    }
    segments
}

/// Surface attachments for the frame being encoded.
pub(super) struct SurfaceViews<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
}

/// Replays `commands` into `encoder`.
pub(super) fn encode(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    arena: &mut UniformArena,
    encoder: &mut wgpu::CommandEncoder,
    surface: SurfaceViews<'_>,
    commands: &[Command],
) {
    let draws: Vec<&DrawCall> = commands
        .iter()
        .filter_map(|c| match c {
            Command::Draw(d) => Some(d.as_ref()),
            Command::Clear(_) => None,
        })
        .collect();

    let blocks: Vec<&[u8]> = draws
        .iter()
        .flat_map(|d| d.resources.iter())
        .filter_map(|r| match r {
            Resource::Uniform { bytes, .. } => Some(bytes.as_slice()),
            _ => None,
        })
        .collect();
    let offsets = arena.upload(device, queue, &blocks);

    let mut next_offset = offsets.iter().copied();
    let bind_groups: Vec<wgpu::BindGroup> = draws
        .iter()
        .map(|draw| {
            let entries: Vec<wgpu::BindGroupEntry<'_>> = draw
                .resources
                .iter()
                .filter_map(|r| {
                    let (binding, resource) = match r {
                        Resource::Uniform { binding, bytes } => {
                            let buffer = arena.buffer.as_ref()?;
                            let offset = next_offset.next()?;
                            (
                                *binding,
                                wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                    buffer,
                                    offset,
                                    size: NonZeroU64::new(bytes.len() as u64),
                                }),
                            )
                        }
                        Resource::Texture { binding, view } => {
                            (*binding, wgpu::BindingResource::TextureView(view))
                        }
                        Resource::Sampler { binding, sampler } => {
                            (*binding, wgpu::BindingResource::Sampler(sampler))
                        }
                    };
                    Some(wgpu::BindGroupEntry { binding, resource })
                })
                .collect();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("lumen draw bind group"),
                layout: &draw.layout,
                entries: &entries,
            })
        })
        .collect();

    for segment in split_passes(commands) {
        let (color_view, depth_view) = match &segment.target {
            Target::Surface => (surface.color, surface.depth),
            Target::Offscreen { color, depth, .. } => (color, depth),
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lumen pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: segment.color,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: segment.depth,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: segment.stencil,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for &i in &segment.draws {
            let draw = draws[i];
            let [x, y, w, h] = draw.viewport;
            rpass.set_pipeline(&draw.pipeline);
            rpass.set_bind_group(0, &bind_groups[i], &[]);
            rpass.set_viewport(x, y, w, h, 0.0, 1.0);
            rpass.set_stencil_reference(draw.stencil_reference);
            for (slot, (buffer, offset)) in draw.streams.iter().enumerate() {
                rpass.set_vertex_buffer(slot as u32, buffer.slice(*offset..));
            }
            match &draw.index {
                Some((buffer, format)) => {
                    rpass.set_index_buffer(buffer.slice(..), *format);
                    rpass.draw_indexed(draw.range.clone(), 0, 0..1);
                }
                None => rpass.draw(draw.range.clone(), 0..1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear(color: Option<f64>, stencil: Option<u32>) -> Command {
        Command::Clear(ClearCall {
            target: Target::Surface,
            color: color.map(|r| wgpu::Color { r, g: 0.0, b: 0.0, a: 1.0 }),
            depth: None,
            stencil,
        })
    }

    #[test]
    fn leading_clears_merge_into_one_pass() {
        let segments = split_passes(&[clear(Some(1.0), None), clear(None, Some(0))]);
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0].color, wgpu::LoadOp::Clear(c) if c.r == 1.0));
        assert!(matches!(segments[0].stencil, wgpu::LoadOp::Clear(0)));
        assert!(matches!(segments[0].depth, wgpu::LoadOp::Load));
    }

    #[test]
    fn later_clear_overrides_earlier_value() {
        let segments = split_passes(&[clear(Some(1.0), None), clear(Some(0.5), None)]);
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0].color, wgpu::LoadOp::Clear(c) if c.r == 0.5));
    }
}
