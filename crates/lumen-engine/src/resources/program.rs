use std::cell::RefCell;
use std::collections::HashMap;

use glam::Mat4;

use crate::gfx::uniform_names;
use crate::gfx::{Backend, GfxError, ProgramId, ShaderId, ShaderStage, UniformLocation, UniformValue};

/// A linked vertex + fragment program with a per-program uniform location cache.
///
/// Names the program does not use resolve to [`UniformLocation::INVALID`]; the sentinel is
/// cached like any other slot, and writes through it do nothing.
#[derive(Debug)]
pub struct ShaderProgram {
    vertex: ShaderId,
    fragment: ShaderId,
    program: ProgramId,
    locations: RefCell<HashMap<String, UniformLocation>>,
}

impl ShaderProgram {
    /// Compiles both stages and links them. Stages already created are released again when
    /// a later step fails.
    pub fn build<B: Backend>(
        gfx: &mut B,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, GfxError> {
        let vertex = gfx.compile_shader(ShaderStage::Vertex, vertex_source)?;
        let fragment = match gfx.compile_shader(ShaderStage::Fragment, fragment_source) {
            Ok(id) => id,
            Err(err) => {
                gfx.release_shader(vertex)?;
                return Err(err);
            }
        };
        let program = match gfx.link_program(vertex, fragment) {
            Ok(id) => id,
            Err(err) => {
                gfx.release_shader(fragment)?;
                gfx.release_shader(vertex)?;
                return Err(err);
            }
        };
        Ok(Self {
            vertex,
            fragment,
            program,
            locations: RefCell::default(),
        })
    }

    /// Vertex and fragment stage from one WGSL module.
    pub fn from_module<B: Backend>(gfx: &mut B, source: &str) -> Result<Self, GfxError> {
        Self::build(gfx, source, source)
    }

    #[inline]
    pub fn id(&self) -> ProgramId {
        self.program
    }

    pub fn activate<B: Backend>(&self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.use_program(Some(self.program))
    }

    /// Resolves `name`, asking the backend only the first time.
    pub fn location<B: Backend>(
        &self,
        gfx: &B,
        name: &str,
    ) -> Result<UniformLocation, GfxError> {
        if let Some(&location) = self.locations.borrow().get(name) {
            return Ok(location);
        }
        let location = gfx.uniform_location(self.program, name)?;
        if !location.is_valid() {
            log::debug!("program {:?} does not use uniform `{name}`", self.program);
        }
        self.locations.borrow_mut().insert(name.to_owned(), location);
        Ok(location)
    }

    /// Writes a uniform of this program. The program must be active.
    pub fn set<B: Backend>(
        &self,
        gfx: &mut B,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<(), GfxError> {
        let location = self.location(gfx, name)?;
        gfx.set_uniform(location, value.into())
    }

    /// Writes the world, view and projection matrices.
    pub fn set_matrices<B: Backend>(
        &self,
        gfx: &mut B,
        world: Mat4,
        view: Mat4,
        projection: Mat4,
    ) -> Result<(), GfxError> {
        self.set(gfx, uniform_names::WORLD_MATRIX, world)?;
        self.set(gfx, uniform_names::VIEW_MATRIX, view)?;
        self.set(gfx, uniform_names::PROJECTION_MATRIX, projection)
    }

    /// Number of names resolved so far, sentinels included.
    pub fn cached_locations(&self) -> usize {
        self.locations.borrow().len()
    }

    /// Releases the program, then the fragment and vertex stages.
    pub fn release<B: Backend>(self, gfx: &mut B) -> Result<(), GfxError> {
        gfx.release_program(self.program)?;
        gfx.release_shader(self.fragment)?;
        gfx.release_shader(self.vertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::SoftwareBackend;
    use crate::gfx::software::Op;

    const SOURCE: &str = r#"
struct Uniforms {
    world_matrix: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return u.world_matrix * vec4<f32>(position, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u.color;
}
"#;

    #[test]
    fn cached_location_is_stable() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let program = ShaderProgram::from_module(&mut gfx, SOURCE).unwrap();

        let first = program.location(&gfx, "color").unwrap();
        let second = program.location(&gfx, "color").unwrap();
        assert!(first.is_valid());
        assert_eq!(first, second);

        let missing = program.location(&gfx, "shininess").unwrap();
        assert_eq!(missing, UniformLocation::INVALID);
        assert_eq!(program.location(&gfx, "shininess").unwrap(), missing);
        assert_eq!(program.cached_locations(), 2);
    }

    #[test]
    fn unknown_uniform_write_is_ignored() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let program = ShaderProgram::from_module(&mut gfx, SOURCE).unwrap();
        program.activate(&mut gfx).unwrap();
        program.set(&mut gfx, "shininess", 4.0f32).unwrap();
    }

    #[test]
    fn failed_link_releases_stages() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let fragment = r#"
@fragment
fn fs_main(@location(3) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint;
}
"#;
        let err = ShaderProgram::build(&mut gfx, SOURCE, fragment).unwrap_err();
        assert!(matches!(err, GfxError::Link(_)));
        assert_eq!(gfx.live_resources(), 0);
    }

    #[test]
    fn release_order_is_program_fragment_vertex() {
        let mut gfx = SoftwareBackend::new(4, 4);
        let program = ShaderProgram::from_module(&mut gfx, SOURCE).unwrap();
        let (id, vertex, fragment) = (program.id(), program.vertex, program.fragment);
        gfx.take_journal();

        program.release(&mut gfx).unwrap();
        assert_eq!(
            gfx.take_journal()[..],
            [
                Op::ReleaseProgram(id),
                Op::ReleaseShader(fragment),
                Op::ReleaseShader(vertex),
            ][..]
        );
    }
}
