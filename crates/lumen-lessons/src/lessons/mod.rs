//! The lesson catalogue.
//!
//! Each lesson is a thin composition of the engine components: it builds its geometry and
//! programs in `on_create`, draws in `on_render` and gives everything back in `on_close`.

mod clear;
mod indexed_quad;
mod mirror;
mod mirror_post;
mod post_process;
mod textured_cube;
mod textured_quad;
mod triangle;
mod vertex_color;

pub use clear::ClearLesson;
pub use indexed_quad::IndexedQuadLesson;
pub use mirror::MirrorLesson;
pub use mirror_post::MirrorPostLesson;
pub use post_process::PostProcessLesson;
pub use textured_cube::TexturedCubeLesson;
pub use textured_quad::TexturedQuadLesson;
pub use triangle::TriangleLesson;
pub use vertex_color::VertexColorLesson;

use glam::{Mat4, Vec3};
use lumen_engine::gfx::{Backend, Filter, GfxError, PixelFormat, TextureDesc, Wrap};
use lumen_engine::resources::{GeometryBuffer, Texture, VertexLayout};
use lumen_engine::sequencer::SceneView;
use lumen_engine::transform::Camera;

pub const WINDOW_WIDTH: u32 = 800;
pub const WINDOW_HEIGHT: u32 = 600;
pub const ASPECT: f32 = WINDOW_WIDTH as f32 / WINDOW_HEIGHT as f32;

/// Unit box centred on the origin, 36 positions (xyz).
#[rustfmt::skip]
pub const BOX: [f32; 108] = [
    -0.5, -0.5, -0.5,   0.5, -0.5, -0.5,   0.5,  0.5, -0.5,
     0.5,  0.5, -0.5,  -0.5,  0.5, -0.5,  -0.5, -0.5, -0.5,

    -0.5, -0.5,  0.5,   0.5, -0.5,  0.5,   0.5,  0.5,  0.5,
     0.5,  0.5,  0.5,  -0.5,  0.5,  0.5,  -0.5, -0.5,  0.5,

    -0.5,  0.5,  0.5,  -0.5,  0.5, -0.5,  -0.5, -0.5, -0.5,
    -0.5, -0.5, -0.5,  -0.5, -0.5,  0.5,  -0.5,  0.5,  0.5,

     0.5,  0.5,  0.5,   0.5,  0.5, -0.5,   0.5, -0.5, -0.5,
     0.5, -0.5, -0.5,   0.5, -0.5,  0.5,   0.5,  0.5,  0.5,

    -0.5, -0.5, -0.5,   0.5, -0.5, -0.5,   0.5, -0.5,  0.5,
     0.5, -0.5,  0.5,  -0.5, -0.5,  0.5,  -0.5, -0.5, -0.5,

    -0.5,  0.5, -0.5,   0.5,  0.5, -0.5,   0.5,  0.5,  0.5,
     0.5,  0.5,  0.5,  -0.5,  0.5,  0.5,  -0.5,  0.5, -0.5,
];

/// Height of the mirror plane; the box rests on it.
pub const MIRROR_HEIGHT: f32 = -0.5;

/// 2x2 mirror plane at [`MIRROR_HEIGHT`], two triangles (xyz).
#[rustfmt::skip]
pub const MIRROR_PLANE: [f32; 18] = [
    -1.0, MIRROR_HEIGHT, -1.0,   1.0, MIRROR_HEIGHT, -1.0,   1.0, MIRROR_HEIGHT,  1.0,
     1.0, MIRROR_HEIGHT,  1.0,  -1.0, MIRROR_HEIGHT,  1.0,  -1.0, MIRROR_HEIGHT, -1.0,
];

pub fn create_box<B: Backend>(gfx: &mut B) -> Result<GeometryBuffer, GfxError> {
    GeometryBuffer::create(gfx, VertexLayout::interleaved(&[3]), &BOX)
}

/// Perspective view of the origin from `eye`, at the window's aspect ratio.
pub fn orbit_view(eye: Vec3) -> SceneView {
    let camera = Camera::looking_at_origin(eye, ASPECT);
    SceneView {
        view: camera.view(),
        projection: camera.projection(),
    }
}

/// World transforms of the two boxes rendered offscreen by the post-process lessons.
pub fn offscreen_boxes(angle: f32) -> [Mat4; 2] {
    [
        Mat4::from_rotation_y(angle),
        Mat4::from_translation(Vec3::new(1.0, -1.0, -1.0))
            * Mat4::from_rotation_z(angle)
            * Mat4::from_rotation_x(angle),
    ]
}

/// Two-colour RGBA checkerboard, standing in for a decoded image file.
pub fn checkerboard(size: u32, cell: u32) -> Vec<u8> {
    const LIGHT: [u8; 4] = [255, 255, 255, 255];
    const DARK: [u8; 4] = [64, 128, 255, 255];
    let cell = cell.max(1);
    (0..size)
        .flat_map(|y| (0..size).map(move |x| (x, y)))
        .flat_map(|(x, y)| if (x / cell + y / cell) % 2 == 0 { LIGHT } else { DARK })
        .collect()
}

pub fn create_checker_texture<B: Backend>(gfx: &mut B) -> Result<Texture, GfxError> {
    let desc = TextureDesc {
        width: 64,
        height: 64,
        format: PixelFormat::Rgba8Unorm,
        filter: Filter::Linear,
        wrap: Wrap::Repeat,
    };
    Texture::create(gfx, desc, &checkerboard(64, 8))
}

#[cfg(test)]
pub(crate) mod testing {
    use lumen_engine::core::{HeadlessHost, Lesson};
    use lumen_engine::gfx::SoftwareBackend;

    use super::{WINDOW_HEIGHT, WINDOW_WIDTH};

    /// Creates `lesson`, runs `frames` frames at 60 Hz and closes it, checking every
    /// resource was released. Returns the backend for pixel checks of the last frame.
    pub fn run_headless<L: Lesson>(lesson: L, frames: u32) -> SoftwareBackend {
        let gfx = SoftwareBackend::new(WINDOW_WIDTH, WINDOW_HEIGHT);
        let mut host = HeadlessHost::new(gfx, lesson);
        host.create().unwrap();
        host.run_frames(frames, 1.0 / 60.0).unwrap();
        assert_eq!(host.gfx().frames_presented(), u64::from(frames));
        host.close().unwrap();
        let (gfx, _) = host.into_parts();
        assert_eq!(gfx.live_resources(), 0, "lesson leaked resources");
        gfx
    }

    pub fn centre(gfx: &SoftwareBackend) -> [u8; 4] {
        gfx.pixel(WINDOW_WIDTH / 2, WINDOW_HEIGHT / 2).unwrap()
    }

    pub fn corner(gfx: &SoftwareBackend) -> [u8; 4] {
        gfx.pixel(0, 0).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_cells() {
        let pixels = checkerboard(4, 2);
        assert_eq!(pixels.len(), 4 * 4 * 4);
        assert_eq!(pixels[0..4], [255, 255, 255, 255]);
        // (2, 0) starts the second cell.
        assert_eq!(pixels[8..12], [64, 128, 255, 255]);
    }
}
