//! Object-side reference geometry and 2D-3D correspondences.

use crate::PoseError;
use tagtrack_core::{CameraParameters, GridCoords, Pt2, Pt3};

/// The four tag corners in the tag frame, centered on the origin in `z = 0`.
///
/// Order: `(-s/2, -s/2)`, `(s/2, -s/2)`, `(s/2, s/2)`, `(-s/2, s/2)`. Detected
/// polygons are expected in the same order.
pub fn tag_reference_points(tag_size: f64) -> [Pt3; 4] {
    let h = tag_size / 2.0;
    [
        Pt3::new(-h, -h, 0.0),
        Pt3::new(h, -h, 0.0),
        Pt3::new(h, h, 0.0),
        Pt3::new(-h, h, 0.0),
    ]
}

/// Object points of chessboard corners: `(i * s, j * s, 0)`.
pub fn grid_reference_points(grid: &[GridCoords], square_size: f64) -> Vec<Pt3> {
    grid.iter()
        .map(|g| Pt3::new(g.i as f64 * square_size, g.j as f64 * square_size, 0.0))
        .collect()
}

/// One object point paired with its observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correspondence {
    /// Point in the object frame (meters).
    pub object: Pt3,
    /// Observed pixel.
    pub pixel: Pt2,
    /// Observed point on the normalized image plane.
    pub normalized: Pt2,
}

/// Pair object points with pixels, converting pixels with the ideal camera model.
pub fn build_correspondences(
    camera: &CameraParameters,
    object: &[Pt3],
    pixels: &[Pt2],
) -> Result<Vec<Correspondence>, PoseError> {
    if object.len() != pixels.len() {
        return Err(PoseError::CountMismatch {
            object: object.len(),
            image: pixels.len(),
        });
    }
    Ok(object
        .iter()
        .zip(pixels)
        .map(|(&object, &pixel)| Correspondence {
            object,
            pixel,
            normalized: camera.pixel_to_normalized(pixel),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_corners_are_stable_and_ordered() {
        let a = tag_reference_points(0.1);
        let b = tag_reference_points(0.1);
        assert_eq!(a, b);
        assert_eq!(a[0], Pt3::new(-0.05, -0.05, 0.0));
        assert_eq!(a[1], Pt3::new(0.05, -0.05, 0.0));
        assert_eq!(a[2], Pt3::new(0.05, 0.05, 0.0));
        assert_eq!(a[3], Pt3::new(-0.05, 0.05, 0.0));
    }

    #[test]
    fn grid_points_scale_with_square_size() {
        let pts = grid_reference_points(&[GridCoords { i: 2, j: 3 }], 0.025);
        assert!((pts[0].x - 0.05).abs() < 1e-12);
        assert!((pts[0].y - 0.075).abs() < 1e-12);
        assert_eq!(pts[0].z, 0.0);
    }

    #[test]
    fn correspondences_require_matching_counts() {
        let cam = CameraParameters::pinhole(500.0, 500.0, 320.0, 240.0);
        let object = tag_reference_points(0.1);
        let pixels = [Pt2::new(320.0, 240.0); 3];
        assert_eq!(
            build_correspondences(&cam, &object, &pixels),
            Err(PoseError::CountMismatch {
                object: 4,
                image: 3
            })
        );

        let pixels = [Pt2::new(820.0, 240.0); 4];
        let c = build_correspondences(&cam, &object, &pixels).expect("counts match");
        assert!((c[0].normalized.x - 1.0).abs() < 1e-12);
        assert_eq!(c[0].normalized.y, 0.0);
    }
}
