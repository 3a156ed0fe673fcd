//! Triangle setup and scan conversion for the software backend.
//!
//! Clip space follows wgpu: `x, y` in `[-1, 1]` with +Y up, depth `z / w` in `[0, 1]`.
//! Window space is top-left origin, +Y down; pixel centers sit at `+0.5`.

use glam::Vec4;

use crate::gfx::Viewport;

/// A transformed vertex: clip-space position plus one interpolated varying.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(super) struct ClipVertex {
    pub clip: Vec4,
    pub varying: Vec4,
}

/// A covered pixel produced by [`rasterize`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub(super) struct Fragment {
    pub x: u32,
    pub y: u32,
    pub depth: f32,
    pub varying: Vec4,
}

struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
    varying: Vec4,
}

/// Minimum `w` accepted; primitives with a vertex behind the eye are dropped whole.
const MIN_W: f32 = 1e-6;

#[inline]
fn edge(ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32) -> f32 {
    (bx - ax) * (py - ay) - (by - ay) * (px - ax)
}

fn to_screen(v: &ClipVertex, vp: Viewport) -> Option<ScreenVertex> {
    if v.clip.w <= MIN_W {
        return None;
    }
    let inv_w = 1.0 / v.clip.w;
    let ndc = v.clip.truncate() * inv_w;
    Some(ScreenVertex {
        x: vp.x as f32 + (ndc.x + 1.0) * 0.5 * vp.width as f32,
        y: vp.y as f32 + (1.0 - ndc.y) * 0.5 * vp.height as f32,
        z: ndc.z,
        inv_w,
        varying: v.varying,
    })
}

/// Scan-converts one triangle, calling `emit` for every covered pixel center inside both
/// the viewport and the `width` x `height` target.
///
/// Coverage is inclusive on edges. Varyings are interpolated perspective-correctly; depth is
/// interpolated linearly in screen space. Fragments outside the `[0, 1]` depth range are
/// clipped.
pub(super) fn rasterize(
    tri: &[ClipVertex; 3],
    viewport: Viewport,
    width: u32,
    height: u32,
    mut emit: impl FnMut(Fragment),
) {
    let (Some(a), Some(b), Some(c)) = (
        to_screen(&tri[0], viewport),
        to_screen(&tri[1], viewport),
        to_screen(&tri[2], viewport),
    ) else {
        return;
    };

    let area = edge(a.x, a.y, b.x, b.y, c.x, c.y);
    if area == 0.0 || !area.is_finite() {
        return;
    }

    let min_x = viewport.x.max(0) as f32;
    let min_y = viewport.y.max(0) as f32;
    let max_x = ((viewport.x + viewport.width as i32).min(width as i32)).max(0) as f32;
    let max_y = ((viewport.y + viewport.height as i32).min(height as i32)).max(0) as f32;

    let x0 = a.x.min(b.x).min(c.x).floor().max(min_x) as u32;
    let y0 = a.y.min(b.y).min(c.y).floor().max(min_y) as u32;
    let x1 = a.x.max(b.x).max(c.x).ceil().min(max_x) as u32;
    let y1 = a.y.max(b.y).max(c.y).ceil().min(max_y) as u32;

    let inv_area = 1.0 / area;

    for py in y0..y1 {
        for px in x0..x1 {
            let sx = px as f32 + 0.5;
            let sy = py as f32 + 0.5;

            let l0 = edge(b.x, b.y, c.x, c.y, sx, sy) * inv_area;
            let l1 = edge(c.x, c.y, a.x, a.y, sx, sy) * inv_area;
            let l2 = edge(a.x, a.y, b.x, b.y, sx, sy) * inv_area;
            if l0 < 0.0 || l1 < 0.0 || l2 < 0.0 {
                continue;
            }

            let depth = l0 * a.z + l1 * b.z + l2 * c.z;
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }

            let p0 = l0 * a.inv_w;
            let p1 = l1 * b.inv_w;
            let p2 = l2 * c.inv_w;
            let norm = 1.0 / (p0 + p1 + p2);
            let varying = (a.varying * p0 + b.varying * p1 + c.varying * p2) * norm;

            emit(Fragment {
                x: px,
                y: py,
                depth,
                varying,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32) -> ClipVertex {
        ClipVertex {
            clip: Vec4::new(x, y, 0.5, 1.0),
            varying: Vec4::ZERO,
        }
    }

    fn coverage(tri: [ClipVertex; 3], vp: Viewport, w: u32, h: u32) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        rasterize(&tri, vp, w, h, |f| out.push((f.x, f.y)));
        out
    }

    #[test]
    fn full_screen_triangle_pair_covers_every_pixel() {
        let vp = Viewport::full(4, 4);
        let mut hits = coverage([v(-1.0, 1.0), v(1.0, 1.0), v(1.0, -1.0)], vp, 4, 4);
        hits.extend(coverage([v(1.0, -1.0), v(-1.0, -1.0), v(-1.0, 1.0)], vp, 4, 4));
        hits.sort_unstable();
        hits.dedup();
        assert_eq!(hits.len(), 16);
    }

    #[test]
    fn winding_does_not_matter() {
        let vp = Viewport::full(8, 8);
        let cw = coverage([v(-1.0, 1.0), v(1.0, 1.0), v(1.0, -1.0)], vp, 8, 8);
        let ccw = coverage([v(-1.0, 1.0), v(1.0, -1.0), v(1.0, 1.0)], vp, 8, 8);
        assert_eq!(cw.len(), ccw.len());
    }

    #[test]
    fn output_is_clipped_to_viewport_and_target() {
        let vp = Viewport::new(2, 2, 4, 4);
        let hits = coverage([v(-3.0, 3.0), v(3.0, 3.0), v(0.0, -3.0)], vp, 5, 5);
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|&(x, y)| (2..5).contains(&x) && (2..5).contains(&y)));
    }

    #[test]
    fn primitive_behind_eye_is_dropped() {
        let mut tri = [v(-1.0, 1.0), v(1.0, 1.0), v(1.0, -1.0)];
        tri[1].clip.w = -1.0;
        assert!(coverage(tri, Viewport::full(4, 4), 4, 4).is_empty());
    }

    #[test]
    fn varyings_interpolate_across_the_triangle() {
        let mut tri = [v(-1.0, -1.0), v(3.0, -1.0), v(-1.0, 3.0)];
        tri[1].varying = Vec4::new(1.0, 0.0, 0.0, 0.0);
        let mut seen = Vec::new();
        rasterize(&tri, Viewport::full(2, 2), 2, 2, |f| seen.push((f.x, f.varying.x)));
        // Pixel (0, y) sits a quarter of the way along the 4-unit x edge.
        let (_, at_left) = seen.iter().find(|(x, _)| *x == 0).copied().unwrap();
        assert!((at_left - 0.125).abs() < 1e-5, "got {at_left}");
    }
}
