use crate::{Correspondence, PoseError};
use nalgebra::{Rotation3, Translation3, UnitQuaternion};
use tagtrack_core::{estimate_homography, Iso3, Mat3, Pt2, Vec3};

/// Depth-free pose of a planar object (`z = 0` in its own frame).
///
/// The homography from object `(x, y)` to normalized image coordinates is
/// `H ~ [r1 r2 t]`. The scale is taken from the mean norm of the first two
/// columns and its sign is chosen so the object lies in front of the camera.
pub fn solve_planar(correspondences: &[Correspondence]) -> Result<Iso3, PoseError> {
    if correspondences.len() < 4 {
        return Err(PoseError::NotEnoughCorrespondences {
            found: correspondences.len(),
            required: 4,
        });
    }
    if correspondences.iter().any(|c| c.object.z.abs() > 1e-12) {
        return Err(PoseError::DegeneratePoints);
    }

    let src: Vec<Pt2> = correspondences
        .iter()
        .map(|c| Pt2::new(c.object.x, c.object.y))
        .collect();
    let dst: Vec<Pt2> = correspondences.iter().map(|c| c.normalized).collect();
    let h = estimate_homography(&src, &dst)
        .ok_or(PoseError::DegeneratePoints)?
        .h;

    let h1: Vec3 = h.column(0).into_owned();
    let h2: Vec3 = h.column(1).into_owned();
    let h3: Vec3 = h.column(2).into_owned();
    let norm = 0.5 * (h1.norm() + h2.norm());
    if norm < 1e-12 {
        return Err(PoseError::DegeneratePoints);
    }
    let mut lambda = 1.0 / norm;
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let mut r = Mat3::zeros();
    r.set_column(0, &r1);
    r.set_column(1, &r2);
    r.set_column(2, &r3);

    // Project onto SO(3).
    let svd = r.svd(true, true);
    let u = svd.u.ok_or(PoseError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(PoseError::SvdFailed)?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_fix = u;
        u_fix.column_mut(2).neg_mut();
        r_orth = u_fix * v_t;
    }

    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    Ok(Iso3::from_parts(Translation3::from(h3 * lambda), rot))
}
