//! WGSL compile/link front end shared by every backend.
//!
//! Stages are parsed and validated with naga. Compiling produces a [`StageInfo`] describing
//! what the entry point reads and writes; linking two stages checks that their interfaces
//! agree and builds the program's uniform table.
//!
//! Conventions:
//! - every bound resource lives in bind group 0
//! - the members of a `var<uniform>` struct are individual uniforms addressed by name; a
//!   non-struct `var<uniform>` is one uniform named after the variable
//! - resources the entry point never touches are dropped, the same way a GLSL compiler
//!   strips unused uniforms

use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::error::GfxError;
use super::types::{ShaderStage, UniformKind, UniformLocation};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScalarClass {
    Float,
    Sint,
    Uint,
    Bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VaryingType {
    pub class: ScalarClass,
    pub components: u32,
}

/// A location-bound entry point input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varying {
    pub location: u32,
    pub name: String,
    pub ty: VaryingType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub kind: UniformKind,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceType {
    Uniform { size: u32, fields: Vec<UniformField> },
    Texture,
    Sampler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundResource {
    pub group: u32,
    pub binding: u32,
    pub name: String,
    pub ty: ResourceType,
}

/// Reflection of one compiled stage.
#[derive(Debug, Clone)]
pub struct StageInfo {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub inputs: Vec<Varying>,
    pub outputs: Vec<Varying>,
    pub resources: Vec<BoundResource>,
}

/// One addressable entry of a program's uniform table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub kind: UniformKind,
    pub binding: u32,
    pub offset: u32,
}

/// Reflection of a linked program.
#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub vertex_inputs: Vec<Varying>,
    /// Union of both stages' resources, ordered by binding.
    pub bindings: Vec<BoundResource>,
    pub uniforms: Vec<UniformSlot>,
}

impl ProgramInfo {
    /// Resolves `name`, returning the sentinel for names the program does not use.
    pub fn locate(&self, name: &str) -> UniformLocation {
        self.uniforms
            .iter()
            .position(|u| u.name == name)
            .map_or(UniformLocation::INVALID, UniformLocation::new)
    }

    pub fn slot(&self, location: UniformLocation) -> Option<&UniformSlot> {
        location.index().and_then(|i| self.uniforms.get(i))
    }

    /// Uniform slot of the first sampled texture, if the program samples one.
    pub fn texture_slot(&self) -> Option<usize> {
        self.uniforms.iter().position(|u| u.kind == UniformKind::Texture)
    }

    pub fn vertex_input(&self, location: u32) -> Option<&Varying> {
        self.vertex_inputs.iter().find(|v| v.location == location)
    }
}

/// Parses, validates and reflects one WGSL stage.
pub fn compile(stage: ShaderStage, source: &str) -> Result<StageInfo, GfxError> {
    let compile_error = |log: String| GfxError::Compile { stage, log };

    let module =
        naga::front::wgsl::parse_str(source).map_err(|e| compile_error(e.emit_to_string(source)))?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| compile_error(e.emit_to_string(source)))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };

    let (index, entry) = module
        .entry_points
        .iter()
        .enumerate()
        .find(|(_, ep)| ep.stage == wanted)
        .ok_or_else(|| compile_error(format!("no @{stage} entry point in module")))?;

    let mut inputs = Vec::new();
    for arg in &entry.function.arguments {
        collect_varyings(&module, arg.ty, arg.binding.as_ref(), arg.name.as_deref(), &mut inputs);
    }

    let mut outputs = Vec::new();
    if let Some(result) = &entry.function.result {
        collect_varyings(&module, result.ty, result.binding.as_ref(), None, &mut outputs);
    }

    let uses = info.get_entry_point(index);
    let mut resources = Vec::new();
    for (handle, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else { continue };
        if uses[handle].is_empty() {
            continue;
        }
        let name = var.name.clone().unwrap_or_default();
        let Some(ty) = resource_type(&module, var, &name) else {
            log::debug!("ignoring unsupported resource `{name}` in {stage} stage");
            continue;
        };
        resources.push(BoundResource {
            group: binding.group,
            binding: binding.binding,
            name,
            ty,
        });
    }

    Ok(StageInfo {
        stage,
        entry_point: entry.name.clone(),
        inputs,
        outputs,
        resources,
    })
}

/// Checks that `vs` feeds `fs` and merges their resources into one uniform table.
pub fn link(vs: &StageInfo, fs: &StageInfo) -> Result<ProgramInfo, GfxError> {
    if vs.stage != ShaderStage::Vertex || fs.stage != ShaderStage::Fragment {
        return Err(GfxError::Link(format!(
            "expected a vertex and a fragment stage, got {} and {}",
            vs.stage, fs.stage
        )));
    }

    for input in &fs.inputs {
        match vs.outputs.iter().find(|o| o.location == input.location) {
            None => {
                return Err(GfxError::Link(format!(
                    "fragment input `{}` at location {} is not written by the vertex stage",
                    input.name, input.location
                )));
            }
            Some(out) if out.ty != input.ty => {
                return Err(GfxError::Link(format!(
                    "location {} is {:?} in the vertex stage but {:?} in the fragment stage",
                    input.location, out.ty, input.ty
                )));
            }
            Some(_) => {}
        }
    }

    let mut bindings: Vec<BoundResource> = Vec::new();
    for res in vs.resources.iter().chain(&fs.resources) {
        if res.group != 0 {
            return Err(GfxError::Link(format!(
                "`{}` is in bind group {}; only group 0 is supported",
                res.name, res.group
            )));
        }
        match bindings.iter().find(|b| b.binding == res.binding) {
            Some(existing) if existing.ty != res.ty => {
                return Err(GfxError::Link(format!(
                    "binding {} is declared differently by the two stages (`{}` vs `{}`)",
                    res.binding, existing.name, res.name
                )));
            }
            Some(_) => {}
            None => bindings.push(res.clone()),
        }
    }
    bindings.sort_by_key(|b| b.binding);

    let mut uniforms = Vec::new();
    for res in &bindings {
        match &res.ty {
            ResourceType::Uniform { fields, .. } => {
                uniforms.extend(fields.iter().map(|f| UniformSlot {
                    name: f.name.clone(),
                    kind: f.kind,
                    binding: res.binding,
                    offset: f.offset,
                }));
            }
            ResourceType::Texture => uniforms.push(UniformSlot {
                name: res.name.clone(),
                kind: UniformKind::Texture,
                binding: res.binding,
                offset: 0,
            }),
            ResourceType::Sampler => {}
        }
    }

    Ok(ProgramInfo {
        vertex_entry: vs.entry_point.clone(),
        fragment_entry: fs.entry_point.clone(),
        vertex_inputs: vs.inputs.clone(),
        bindings,
        uniforms,
    })
}

fn collect_varyings(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    name: Option<&str>,
    out: &mut Vec<Varying>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            if let Some(vt) = varying_type(module, ty) {
                out.push(Varying {
                    location: *location,
                    name: name.unwrap_or_default().to_string(),
                    ty: vt,
                });
            }
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_varyings(module, m.ty, m.binding.as_ref(), m.name.as_deref(), out);
                }
            }
        }
    }
}

fn scalar_class(kind: naga::ScalarKind) -> ScalarClass {
    match kind {
        naga::ScalarKind::Sint | naga::ScalarKind::AbstractInt => ScalarClass::Sint,
        naga::ScalarKind::Uint => ScalarClass::Uint,
        naga::ScalarKind::Bool => ScalarClass::Bool,
        naga::ScalarKind::Float | naga::ScalarKind::AbstractFloat => ScalarClass::Float,
    }
}

fn varying_type(module: &naga::Module, ty: naga::Handle<naga::Type>) -> Option<VaryingType> {
    match module.types[ty].inner {
        naga::TypeInner::Scalar(s) => Some(VaryingType {
            class: scalar_class(s.kind),
            components: 1,
        }),
        naga::TypeInner::Vector { size, scalar } => Some(VaryingType {
            class: scalar_class(scalar.kind),
            components: size as u32,
        }),
        _ => None,
    }
}

fn uniform_kind(inner: &naga::TypeInner) -> Option<UniformKind> {
    use naga::{ScalarKind, TypeInner, VectorSize};

    match *inner {
        TypeInner::Scalar(s) if s.kind == ScalarKind::Float => Some(UniformKind::Float),
        TypeInner::Scalar(s) if matches!(s.kind, ScalarKind::Sint | ScalarKind::Uint) => {
            Some(UniformKind::Int)
        }
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float => Some(UniformKind::Vec4),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float => Some(UniformKind::Mat4),
        _ => None,
    }
}

fn resource_type(
    module: &naga::Module,
    var: &naga::GlobalVariable,
    name: &str,
) -> Option<ResourceType> {
    let inner = &module.types[var.ty].inner;
    match var.space {
        naga::AddressSpace::Uniform => {
            let size = inner.size(module.to_ctx());
            let fields = match inner {
                naga::TypeInner::Struct { members, .. } => members
                    .iter()
                    .filter_map(|m| {
                        let kind = uniform_kind(&module.types[m.ty].inner)?;
                        Some(UniformField {
                            name: m.name.clone().unwrap_or_default(),
                            kind,
                            offset: m.offset,
                        })
                    })
                    .collect(),
                other => uniform_kind(other)
                    .map(|kind| UniformField {
                        name: name.to_string(),
                        kind,
                        offset: 0,
                    })
                    .into_iter()
                    .collect(),
            };
            Some(ResourceType::Uniform { size, fields })
        }
        naga::AddressSpace::Handle => match inner {
            naga::TypeInner::Image {
                dim: naga::ImageDimension::D2,
                arrayed: false,
                ..
            } => Some(ResourceType::Texture),
            naga::TypeInner::Sampler { comparison: false } => Some(ResourceType::Sampler),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
struct Uniforms {
    world_matrix: mat4x4<f32>,
    color: vec4<f32>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) in_pos: vec3<f32>, @location(1) in_uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = u.world_matrix * vec4<f32>(in_pos, 1.0);
    out.uv = in_uv;
    return out;
}
"#;

    const FS: &str = r#"
@group(0) @binding(1) var color_texture: texture_2d<f32>;
@group(0) @binding(2) var color_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(color_texture, color_sampler, uv);
}
"#;

    #[test]
    fn compile_reflects_inputs_outputs_and_resources() {
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        assert_eq!(vs.entry_point, "vs_main");
        assert_eq!(vs.inputs.len(), 2);
        assert_eq!(vs.inputs[0].location, 0);
        assert_eq!(vs.inputs[0].ty.components, 3);
        assert_eq!(vs.outputs.len(), 1);
        assert_eq!(vs.resources.len(), 1);
        let ResourceType::Uniform { size, fields } = &vs.resources[0].ty else {
            panic!("expected a uniform block");
        };
        assert_eq!(*size, 80);
        assert_eq!(fields[1].name, "color");
        assert_eq!(fields[1].offset, 64);
    }

    #[test]
    fn link_builds_uniform_table() {
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let fs = compile(ShaderStage::Fragment, FS).unwrap();
        let program = link(&vs, &fs).unwrap();

        let names: Vec<_> = program.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["world_matrix", "color", "color_texture"]);
        assert_eq!(program.texture_slot(), Some(2));
        assert_eq!(program.locate("color"), UniformLocation::new(1));
        assert_eq!(program.locate("missing"), UniformLocation::INVALID);
    }

    #[test]
    fn syntax_error_surfaces_diagnostic() {
        let err = compile(ShaderStage::Vertex, "fn vs_main( {").unwrap_err();
        let GfxError::Compile { stage, log } = err else {
            panic!("expected a compile error");
        };
        assert_eq!(stage, ShaderStage::Vertex);
        assert!(!log.is_empty());
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let err = compile(ShaderStage::Fragment, VS).unwrap_err();
        assert!(matches!(err, GfxError::Compile { stage: ShaderStage::Fragment, .. }));
    }

    #[test]
    fn unwritten_fragment_input_fails_link() {
        let fs = r#"
@fragment
fn fs_main(@location(3) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint;
}
"#;
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let fs = compile(ShaderStage::Fragment, fs).unwrap();
        assert!(matches!(link(&vs, &fs), Err(GfxError::Link(_))));
    }

    #[test]
    fn mismatched_varying_type_fails_link() {
        let fs = r#"
@fragment
fn fs_main(@location(0) uv: vec4<f32>) -> @location(0) vec4<f32> {
    return uv;
}
"#;
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let fs = compile(ShaderStage::Fragment, fs).unwrap();
        assert!(matches!(link(&vs, &fs), Err(GfxError::Link(_))));
    }

    #[test]
    fn unused_uniform_is_stripped() {
        let vs = r#"
@group(0) @binding(0) var<uniform> unused_scale: f32;

@vertex
fn vs_main(@location(0) p: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(p, 0.0, 1.0);
}
"#;
        let fs = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;
        let vs = compile(ShaderStage::Vertex, vs).unwrap();
        let fs = compile(ShaderStage::Fragment, fs).unwrap();
        let program = link(&vs, &fs).unwrap();
        assert!(program.uniforms.is_empty());
        assert_eq!(program.locate("unused_scale"), UniformLocation::INVALID);
    }
}
