//! World, view and projection matrices.
//!
//! Every matrix targets wgpu clip space (depth in `[0, 1]`, right-handed view space) and is
//! combined as `projection * view * world * position`.

use glam::{Mat4, Vec3};

/// Perspective camera looking at a fixed point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// 45° field of view, near 0.001, far 1000, looking at the origin.
    pub fn looking_at_origin(eye: Vec3, aspect: f32) -> Self {
        Self {
            eye,
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect,
            near: 0.001,
            far: 1000.0,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }
}

/// Orthographic projection in pixel coordinates: `(0, 0)` is the top-left corner and
/// `(width, height)` the bottom-right one.
pub fn pixel_ortho(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0)
}

/// Orthographic projection of the `[-1, 1]²` square.
pub fn unit_ortho() -> Mat4 {
    Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0)
}

/// Mirrors geometry across the horizontal plane `y = height`.
pub fn reflect_y(height: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(0.0, 2.0 * height, 0.0))
        * Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn approx(a: Vec4, b: Vec4) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    #[test]
    fn pixel_ortho_maps_corners() {
        let m = pixel_ortho(800.0, 600.0);
        let top_left = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let bottom_right = m * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert!(approx(top_left, Vec4::new(-1.0, 1.0, 0.5, 1.0)));
        assert!(approx(bottom_right, Vec4::new(1.0, -1.0, 0.5, 1.0)));
    }

    #[test]
    fn reflection_flips_about_plane() {
        let m = reflect_y(-0.5);
        let p = m * Vec4::new(1.0, 0.5, 2.0, 1.0);
        assert!(approx(p, Vec4::new(1.0, -1.5, 2.0, 1.0)));
    }

    #[test]
    fn camera_projects_target_to_screen_centre() {
        let camera = Camera::looking_at_origin(Vec3::new(3.0, 2.0, 3.0), 800.0 / 600.0);
        let clip = camera.projection() * camera.view() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
