//! Direct pose from a depth map.
//!
//! Depth samples inside the detected polygon are back-projected and fitted
//! with a plane. Each corner's viewing ray is intersected with that plane,
//! and the object model is aligned rigidly onto the resulting 3D corners.
//! No prior pose is needed, which is what makes this the acquisition path.

use crate::{rigid_from_points, Correspondence, PoseError, PoseParams};
use nalgebra::SymmetricEigen;
use tagtrack_core::{CameraParameters, DepthMap, Iso3, Mat3, Pt2, Pt3, Vec3};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Plane `normal · X = offset` in the camera frame, `normal` unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f64,
    pub centroid: Pt3,
}

impl Plane {
    /// Intersect the ray through normalized point `n` with the plane.
    pub fn intersect_ray(&self, n: Pt2) -> Option<Pt3> {
        let ray = Vec3::new(n.x, n.y, 1.0);
        let denom = self.normal.dot(&ray);
        if denom.abs() < 1e-9 {
            return None;
        }
        let t = self.offset / denom;
        (t > 0.0 && t.is_finite()).then(|| Pt3::from(ray * t))
    }
}

/// Even-odd point in polygon test.
fn contains(polygon: &[Pt2], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > y) != (pj.y > y) {
            let x_cross = pj.x + (y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Back-project every valid depth pixel inside `polygon` into the camera frame.
pub fn collect_depth_points(
    depth: &DepthMap,
    polygon: &[Pt2],
    camera: &CameraParameters,
    stride: usize,
) -> Vec<Pt3> {
    if polygon.len() < 3 || depth.is_empty() {
        return Vec::new();
    }
    let stride = stride.max(1);

    let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
    let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in polygon {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    let x0 = x0.floor().max(0.0) as i64;
    let y0 = y0.floor().max(0.0) as i64;
    let x1 = (x1.ceil() as i64).min(depth.width as i64 - 1);
    let y1 = (y1.ceil() as i64).min(depth.height as i64 - 1);

    let mut out = Vec::new();
    let mut y = y0;
    while y <= y1 {
        let mut x = x0;
        while x <= x1 {
            if contains(polygon, x as f64, y as f64) {
                if let Some(d) = depth.get(x, y) {
                    let n = camera.pixel_to_normalized(Pt2::new(x as f64, y as f64));
                    let d = d as f64;
                    out.push(Pt3::new(n.x * d, n.y * d, d));
                }
            }
            x += stride as i64;
        }
        y += stride as i64;
    }
    out
}

/// Least-squares plane through `points` (centroid + smallest eigenvector).
pub fn fit_plane(points: &[Pt3]) -> Result<Plane, PoseError> {
    if points.len() < 3 {
        return Err(PoseError::InsufficientDepth {
            found: points.len(),
            required: 3,
        });
    }
    let n = points.len() as f64;
    let centroid = Pt3::from(points.iter().map(|p| p.coords).sum::<Vec3>() / n);

    let mut cov = Mat3::zeros();
    for p in points {
        let d = p - centroid;
        cov += d * d.transpose();
    }

    let eig = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    let (smallest, middle, largest) = (
        eig.eigenvalues[order[0]],
        eig.eigenvalues[order[1]],
        eig.eigenvalues[order[2]],
    );
    if largest <= 1e-18 || middle <= 1e-12 * largest {
        return Err(PoseError::DegeneratePlane);
    }
    debug_assert!(smallest <= middle);

    let mut normal: Vec3 = eig.eigenvectors.column(order[0]).into_owned();
    // Orient the normal towards the camera.
    if normal.dot(&centroid.coords) > 0.0 {
        normal = -normal;
    }
    let offset = normal.dot(&centroid.coords);
    Ok(Plane {
        normal,
        offset,
        centroid,
    })
}

/// RGB-D direct pose: plane fit on the depth inside `polygon`, ray/plane
/// intersection per corner, then rigid alignment of the object model.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(corners = correspondences.len()))
)]
pub fn solve_rgbd(
    depth: Option<&DepthMap>,
    polygon: &[Pt2],
    correspondences: &[Correspondence],
    camera: &CameraParameters,
    params: &PoseParams,
) -> Result<Iso3, PoseError> {
    let depth = depth.ok_or(PoseError::MissingDepth)?;
    if correspondences.len() < 3 {
        return Err(PoseError::NotEnoughCorrespondences {
            found: correspondences.len(),
            required: 3,
        });
    }

    let samples = collect_depth_points(depth, polygon, camera, params.depth_stride);
    let required = params.min_depth_samples.max(3);
    if samples.len() < required {
        return Err(PoseError::InsufficientDepth {
            found: samples.len(),
            required,
        });
    }
    let plane = fit_plane(&samples)?;
    log::trace!(
        "depth plane from {} samples: n={:?} d={:.4}",
        samples.len(),
        plane.normal.as_slice(),
        plane.offset
    );

    let mut camera_points = Vec::with_capacity(correspondences.len());
    for (corner, c) in correspondences.iter().enumerate() {
        let p = plane
            .intersect_ray(c.normalized)
            .ok_or(PoseError::RayMissesPlane { corner })?;
        camera_points.push(p);
    }

    let object: Vec<Pt3> = correspondences.iter().map(|c| c.object).collect();
    rigid_from_points(&object, &camera_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_containment() {
        let square = [
            Pt2::new(0.0, 0.0),
            Pt2::new(10.0, 0.0),
            Pt2::new(10.0, 10.0),
            Pt2::new(0.0, 10.0),
        ];
        assert!(contains(&square, 5.0, 5.0));
        assert!(!contains(&square, 11.0, 5.0));
        assert!(!contains(&square, 5.0, -0.5));
    }

    #[test]
    fn fronto_parallel_plane_from_constant_depth() {
        let cam = CameraParameters::pinhole(500.0, 500.0, 50.0, 50.0);
        let depth = DepthMap::filled(100, 100, 2.0);
        let polygon = [
            Pt2::new(20.0, 20.0),
            Pt2::new(80.0, 20.0),
            Pt2::new(80.0, 80.0),
            Pt2::new(20.0, 80.0),
        ];
        let pts = collect_depth_points(&depth, &polygon, &cam, 2);
        assert!(pts.len() > 100);
        let plane = fit_plane(&pts).expect("plane");
        assert!((plane.normal.z.abs() - 1.0).abs() < 1e-9);
        assert!(plane.normal.z < 0.0, "normal faces the camera");
        let hit = plane.intersect_ray(Pt2::new(0.1, -0.1)).expect("hit");
        assert!((hit.z - 2.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_samples_are_degenerate() {
        let pts: Vec<Pt3> = (0..10).map(|i| Pt3::new(i as f64, 0.0, 1.0)).collect();
        assert_eq!(fit_plane(&pts), Err(PoseError::DegeneratePlane));
    }

    #[test]
    fn missing_depth_is_reported() {
        let cam = CameraParameters::pinhole(500.0, 500.0, 50.0, 50.0);
        let err = solve_rgbd(None, &[], &[], &cam, &PoseParams::default());
        assert_eq!(err, Err(PoseError::MissingDepth));
    }
}
