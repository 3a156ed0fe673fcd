use glam::Mat4;
use lumen_engine::gfx::{Backend, ClearValues, Color, GfxError, SoftwareBackend};
use lumen_engine::resources::{GeometryBuffer, ShaderProgram, VertexLayout};
use lumen_engine::sequencer::{DrawCommand, FramePlan, FrameSequencer, MirrorPhase, SceneView};
use lumen_engine::shaders;
use lumen_engine::transform::unit_ortho;

const QUAD: [f32; 8] = [-0.5, 0.5, 0.5, 0.5, 0.5, -0.5, -0.5, -0.5];
const FULL_QUAD: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0];
const LEFT_HALF: [f32; 8] = [-1.0, -1.0, 0.0, -1.0, 0.0, 1.0, -1.0, 1.0];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

fn quad(gfx: &mut SoftwareBackend, vertices: &[f32; 8]) -> GeometryBuffer {
    GeometryBuffer::create_indexed(gfx, VertexLayout::interleaved(&[2]), vertices, &QUAD_INDICES)
        .unwrap()
}

fn rgba(color: Color) -> [u8; 4] {
    color.to_rgba8()
}

#[test]
fn centred_quad_covers_middle_of_surface() {
    let mut gfx = SoftwareBackend::new(800, 600);
    let program = ShaderProgram::from_module(&mut gfx, shaders::SCENE).unwrap();
    let geometry = quad(&mut gfx, &QUAD);
    let mut seq = FrameSequencer::new();

    let background = Color::rgb(0.2, 0.3, 0.4);
    let fill = Color::rgb(1.0, 0.0, 0.0);
    let view = SceneView {
        view: Mat4::IDENTITY,
        projection: unit_ortho(),
    };
    let mut plan = FramePlan::new(view);
    plan.clear.color = background;
    plan.opaque.push(DrawCommand::new(&program, &geometry).color(fill));
    seq.render(&mut gfx, &plan).unwrap();
    gfx.present().unwrap();

    for (x, y) in [(200, 150), (599, 150), (599, 449), (200, 449), (400, 300)] {
        assert_eq!(gfx.pixel(x, y), Some(rgba(fill)), "pixel ({x}, {y})");
    }
    for (x, y) in [(0, 0), (199, 300), (600, 300), (400, 149), (400, 450)] {
        assert_eq!(gfx.pixel(x, y), Some(rgba(background)), "pixel ({x}, {y})");
    }
    assert_eq!(gfx.frames_presented(), 1);

    geometry.release(&mut gfx).unwrap();
    program.release(&mut gfx).unwrap();
    seq.release(&mut gfx).unwrap();
    assert_eq!(gfx.live_resources(), 0);
}

#[test]
fn offscreen_color_survives_composite() {
    let mut gfx = SoftwareBackend::new(64, 48);
    let program = ShaderProgram::from_module(&mut gfx, shaders::SCENE).unwrap();
    let geometry = quad(&mut gfx, &FULL_QUAD);
    let mut seq = FrameSequencer::with_offscreen(&mut gfx, 64, 48).unwrap();

    let solid = Color::rgb(0.2, 0.6, 1.0);
    let mut plan = FramePlan::new(SceneView::IDENTITY);
    plan.offscreen.push(DrawCommand::new(&program, &geometry).color(solid));
    seq.render(&mut gfx, &plan).unwrap();

    let target = seq.target().unwrap().texture();
    assert_eq!(gfx.texel(target, 10, 10).unwrap(), Some(rgba(solid)));
    for (x, y) in [(0, 0), (63, 0), (32, 24), (0, 47), (63, 47)] {
        assert_eq!(gfx.pixel(x, y), Some(rgba(solid)), "pixel ({x}, {y})");
    }

    geometry.release(&mut gfx).unwrap();
    program.release(&mut gfx).unwrap();
    seq.release(&mut gfx).unwrap();
    assert_eq!(gfx.live_resources(), 0);
}

#[test]
fn reflection_stays_inside_mirror_silhouette() {
    let mut gfx = SoftwareBackend::new(64, 64);
    let program = ShaderProgram::from_module(&mut gfx, shaders::SCENE).unwrap();
    let mirror = quad(&mut gfx, &LEFT_HALF);
    let everywhere = quad(&mut gfx, &FULL_QUAD);
    let mut seq = FrameSequencer::new();

    let reflection = Color::rgb(0.0, 1.0, 0.0);
    let mut plan = FramePlan::new(SceneView::IDENTITY);
    plan.mirror
        .push(DrawCommand::new(&program, &mirror).color(Color::rgb(1.0, 0.0, 1.0)));
    plan.reflected
        .push(DrawCommand::new(&program, &everywhere).color(reflection));
    seq.render(&mut gfx, &plan).unwrap();

    for y in [4, 32, 60] {
        assert_eq!(gfx.pixel(8, y), Some(rgba(reflection)));
        assert_eq!(gfx.stencil_value(8, y), Some(1));
        assert_eq!(gfx.pixel(56, y), Some(rgba(Color::BLACK)));
        assert_eq!(gfx.stencil_value(56, y), Some(0));
    }
    assert!(!gfx.stencil_test_enabled());
    assert_eq!(seq.mirror_phase(), MirrorPhase::Idle);

    everywhere.release(&mut gfx).unwrap();
    mirror.release(&mut gfx).unwrap();
    program.release(&mut gfx).unwrap();
}

#[test]
fn failed_frame_leaves_sequencer_ready() {
    let mut gfx = SoftwareBackend::new(16, 16);
    let colored = ShaderProgram::from_module(&mut gfx, shaders::VERTEX_COLOR).unwrap();
    let plain = ShaderProgram::from_module(&mut gfx, shaders::SCENE).unwrap();
    let positions_only = quad(&mut gfx, &FULL_QUAD);
    let mut seq = FrameSequencer::new();

    let mut bad = FramePlan::new(SceneView::IDENTITY);
    bad.opaque.push(DrawCommand::new(&colored, &positions_only));
    let err = seq.render(&mut gfx, &bad).unwrap_err();
    assert_eq!(err, GfxError::MissingAttribute { location: 1 });
    assert_eq!(seq.mirror_phase(), MirrorPhase::Idle);

    let mut good = FramePlan::new(SceneView::IDENTITY);
    good.opaque
        .push(DrawCommand::new(&plain, &positions_only).color(Color::WHITE));
    seq.render(&mut gfx, &good).unwrap();
    assert_eq!(gfx.pixel(8, 8), Some(rgba(Color::WHITE)));

    positions_only.release(&mut gfx).unwrap();
    plain.release(&mut gfx).unwrap();
    colored.release(&mut gfx).unwrap();
}

#[test]
fn empty_geometry_draws_nothing() {
    let mut gfx = SoftwareBackend::new(16, 16);
    let program = ShaderProgram::from_module(&mut gfx, shaders::SCENE).unwrap();
    let empty: [f32; 0] = [];
    let nothing =
        GeometryBuffer::create(&mut gfx, VertexLayout::interleaved(&[2]), &empty).unwrap();
    assert_eq!(nothing.vertex_count(), 0);
    let mut seq = FrameSequencer::new();

    let mut plan = FramePlan::new(SceneView::IDENTITY);
    plan.opaque
        .push(DrawCommand::new(&program, &nothing).color(Color::WHITE));
    seq.render(&mut gfx, &plan).unwrap();
    assert!(gfx.color_plane().iter().all(|px| *px == rgba(Color::BLACK)));

    nothing.release(&mut gfx).unwrap();
    program.release(&mut gfx).unwrap();
}

#[test]
fn geometry_holds_exactly_its_vertices() {
    let mut gfx = SoftwareBackend::new(8, 8);
    let program = ShaderProgram::from_module(&mut gfx, shaders::SCENE).unwrap();
    let triangle = [0.0f32, 0.5, 0.5, -0.5, -0.5, -0.5];
    let geometry =
        GeometryBuffer::create(&mut gfx, VertexLayout::interleaved(&[2]), &triangle).unwrap();
    assert_eq!(geometry.vertex_count(), 3);

    program.activate(&mut gfx).unwrap();
    geometry.bind(&mut gfx).unwrap();
    gfx.draw_arrays(0, 3).unwrap();
    assert_eq!(gfx.last_fetch_extent(), 24);

    let err = gfx.draw_arrays(1, 3).unwrap_err();
    assert!(matches!(err, GfxError::AttributeOutOfBounds { required: 32, available: 24, .. }));

    let buffer = geometry.vertex_buffer();
    geometry.release(&mut gfx).unwrap();
    assert!(matches!(
        gfx.release_buffer(buffer),
        Err(GfxError::InvalidHandle { .. })
    ));
    program.release(&mut gfx).unwrap();
}
