//! Debug rendering of tracked targets.

use image::{Rgba, RgbaImage};
use tagtrack_core::{CameraParameters, GrayImageView, Iso3, Pt2, Pt3};
use tagtrack_tracker::{Detector, TrackingSession, TrackingState};

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const CYAN: Rgba<u8> = Rgba([0, 255, 255, 255]);

const EDGE_COLORS: [Rgba<u8>; 4] = [RED, GREEN, BLUE, CYAN];
const EDGE_WIDTH: i64 = 3;

pub fn gray_to_rgba(gray: &GrayImageView<'_>) -> RgbaImage {
    RgbaImage::from_fn(gray.width as u32, gray.height as u32, |x, y| {
        let v = gray
            .data
            .get(y as usize * gray.width + x as usize)
            .copied()
            .unwrap_or(0);
        Rgba([v, v, v, 255])
    })
}

/// Draw every registered target that is currently tracked.
pub fn draw_session(
    canvas: &mut RgbaImage,
    session: &TrackingSession,
    camera: &CameraParameters,
) {
    for (_, _, detector) in session.targets() {
        draw_detector(canvas, detector, camera);
    }
}

/// Outline and axis frame of one target; nothing when it is not tracked.
///
/// Quadrilaterals get their four edges in red, green, blue and cyan. Larger
/// point sets (chessboard corners) are marked individually. The axis frame
/// has length `2 × reference_size` (x red, y green, z blue).
pub fn draw_detector(
    canvas: &mut RgbaImage,
    detector: &dyn Detector,
    camera: &CameraParameters,
) {
    if detector.state() == TrackingState::NoObject {
        return;
    }
    let points = detector.image_points();
    if points.len() == 4 {
        for (k, color) in EDGE_COLORS.iter().enumerate() {
            draw_line(canvas, points[k], points[(k + 1) % 4], *color, EDGE_WIDTH);
        }
    } else {
        for p in points {
            draw_cross(canvas, *p, 4.0, CYAN);
        }
    }
    if let Some(pose) = detector.pose() {
        draw_frame(canvas, pose, camera, 2.0 * detector.reference_size());
    }
}

/// Project the object axes of `pose` and draw them from its origin.
pub fn draw_frame(canvas: &mut RgbaImage, pose: &Iso3, camera: &CameraParameters, length: f64) {
    let Some(origin) = camera.project_distorted(&(pose * Pt3::origin())) else {
        return;
    };
    let axes = [
        (Pt3::new(length, 0.0, 0.0), RED),
        (Pt3::new(0.0, length, 0.0), GREEN),
        (Pt3::new(0.0, 0.0, length), BLUE),
    ];
    for (tip, color) in axes {
        if let Some(tip) = camera.project_distorted(&(pose * tip)) {
            draw_line(canvas, origin, tip, color, EDGE_WIDTH);
        }
    }
}

fn put_square(canvas: &mut RgbaImage, x: i64, y: i64, width: i64, color: Rgba<u8>) {
    let r = width / 2;
    for yy in y - r..=y + r {
        for xx in x - r..=x + r {
            let inside = xx >= 0
                && yy >= 0
                && (xx as u32) < canvas.width()
                && (yy as u32) < canvas.height();
            if inside {
                canvas.put_pixel(xx as u32, yy as u32, color);
            }
        }
    }
}

/// Bresenham line stamped with a square brush.
pub fn draw_line(canvas: &mut RgbaImage, a: Pt2, b: Pt2, color: Rgba<u8>, width: i64) {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return;
    }
    // Clamp far endpoints; the brush clips per pixel.
    let limit = 4.0 * (canvas.width().max(canvas.height()) as f64 + 1.0);
    let clamp = |v: f64| v.clamp(-limit, limit).round() as i64;
    let (mut x0, mut y0) = (clamp(a.x), clamp(a.y));
    let (x1, y1) = (clamp(b.x), clamp(b.y));

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_square(canvas, x0, y0, width, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_cross(canvas: &mut RgbaImage, p: Pt2, half: f64, color: Rgba<u8>) {
    draw_line(canvas, Pt2::new(p.x - half, p.y), Pt2::new(p.x + half, p.y), color, 1);
    draw_line(canvas, Pt2::new(p.x, p.y - half), Pt2::new(p.x, p.y + half), color, 1);
}
