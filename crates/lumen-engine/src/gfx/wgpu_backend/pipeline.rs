//! Pipeline cache keys and render pipeline construction.
//!
//! wgpu bakes vertex layout, depth/stencil state and the color format into the pipeline, so
//! the backend keys a cache on everything that can change between draws except the stencil
//! reference (dynamic) and bound resources (bind groups).

use crate::device::DEPTH_STENCIL_FORMAT;
use crate::gfx::{CompareFunc, ProgramId, StencilOps};

use super::convert;

/// Depth/stencil pipeline state at the time of a draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) struct DepthStencilKey {
    pub depth_test: bool,
    pub depth_mask: bool,
    pub stencil_test: bool,
    pub compare: CompareFunc,
    pub read_mask: u8,
    pub ops: StencilOps,
    pub write_mask: u8,
}

impl DepthStencilKey {
    pub(super) fn state(&self) -> wgpu::DepthStencilState {
        let stencil = if self.stencil_test {
            let face = wgpu::StencilFaceState {
                compare: convert::compare(self.compare),
                fail_op: convert::stencil_op(self.ops.stencil_fail),
                depth_fail_op: convert::stencil_op(self.ops.depth_fail),
                pass_op: convert::stencil_op(self.ops.pass),
            };
            wgpu::StencilState {
                front: face,
                back: face,
                read_mask: u32::from(self.read_mask),
                write_mask: u32::from(self.write_mask),
            }
        } else {
            wgpu::StencilState {
                front: wgpu::StencilFaceState::IGNORE,
                back: wgpu::StencilFaceState::IGNORE,
                read_mask: 0,
                write_mask: 0,
            }
        };

        wgpu::DepthStencilState {
            format: DEPTH_STENCIL_FORMAT,
            // A disabled depth test also disables depth writes.
            depth_write_enabled: self.depth_test && self.depth_mask,
            depth_compare: if self.depth_test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil,
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

/// One attribute, fed from its own vertex buffer slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) struct VertexStream {
    pub location: u32,
    pub format: wgpu::VertexFormat,
    pub stride: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub program: ProgramId,
    pub streams: Vec<VertexStream>,
    pub depth_stencil: DepthStencilKey,
    pub color_format: wgpu::TextureFormat,
}

/// Shader modules and layout of a linked program.
pub(super) struct ProgramStages<'a> {
    pub vertex: &'a wgpu::ShaderModule,
    pub vertex_entry: &'a str,
    pub fragment: &'a wgpu::ShaderModule,
    pub fragment_entry: &'a str,
    pub layout: &'a wgpu::PipelineLayout,
}

pub(super) fn create_pipeline(
    device: &wgpu::Device,
    key: &PipelineKey,
    stages: ProgramStages<'_>,
) -> wgpu::RenderPipeline {
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
        .streams
        .iter()
        .map(|s| {
            [wgpu::VertexAttribute {
                format: s.format,
                offset: 0,
                shader_location: s.location,
            }]
        })
        .collect();

    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = key
        .streams
        .iter()
        .zip(&attributes)
        .map(|(s, attrs)| wgpu::VertexBufferLayout {
            array_stride: s.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attrs,
        })
        .collect();

    log::debug!(
        "creating pipeline: {} vertex streams, color {:?}, {:?}",
        key.streams.len(),
        key.color_format,
        key.depth_stencil
    );

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("lumen program pipeline"),
        layout: Some(stages.layout),

        vertex: wgpu::VertexState {
            module: stages.vertex,
            entry_point: Some(stages.vertex_entry),
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: stages.fragment,
            entry_point: Some(stages.fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.color_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: Some(key.depth_stencil.state()),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::StencilOp;

    fn key(depth_test: bool, depth_mask: bool, stencil_test: bool) -> DepthStencilKey {
        DepthStencilKey {
            depth_test,
            depth_mask,
            stencil_test,
            compare: CompareFunc::Equal,
            read_mask: 0xff,
            ops: StencilOps::KEEP,
            write_mask: 0xff,
        }
    }

    #[test]
    fn disabled_depth_test_never_writes_depth() {
        let state = key(false, true, false).state();
        assert!(!state.depth_write_enabled);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::Always);
    }

    #[test]
    fn disabled_stencil_test_ignores_stencil() {
        let state = key(true, true, false).state();
        assert_eq!(state.stencil.write_mask, 0);
        assert_eq!(state.stencil.front, wgpu::StencilFaceState::IGNORE);
    }

    #[test]
    fn stencil_state_maps_ops() {
        let mut k = key(true, false, true);
        k.ops = StencilOps {
            stencil_fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: StencilOp::Replace,
        };
        let state = k.state();
        assert_eq!(state.stencil.front.compare, wgpu::CompareFunction::Equal);
        assert_eq!(state.stencil.front.pass_op, wgpu::StencilOperation::Replace);
        assert!(!state.depth_write_enabled);
    }
}
