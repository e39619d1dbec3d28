use crate::PoseError;
use nalgebra::{Rotation3, Translation3, UnitQuaternion};
use tagtrack_core::{Iso3, Mat3, Pt3, Vec3};

/// Rigid transform mapping `object` points onto `camera` points (Kabsch).
///
/// Rotation comes from the SVD of the cross-covariance with the usual
/// reflection fix; translation aligns the centroids.
pub fn rigid_from_points(object: &[Pt3], camera: &[Pt3]) -> Result<Iso3, PoseError> {
    if object.len() != camera.len() {
        return Err(PoseError::CountMismatch {
            object: object.len(),
            image: camera.len(),
        });
    }
    if object.len() < 3 {
        return Err(PoseError::NotEnoughCorrespondences {
            found: object.len(),
            required: 3,
        });
    }

    let n = object.len() as f64;
    let mut c_o = Vec3::zeros();
    let mut c_c = Vec3::zeros();
    for (po, pc) in object.iter().zip(camera) {
        c_o += po.coords;
        c_c += pc.coords;
    }
    c_o /= n;
    c_c /= n;

    let mut h = Mat3::zeros();
    for (po, pc) in object.iter().zip(camera) {
        h += (pc.coords - c_c) * (po.coords - c_o).transpose();
    }
    if h.norm() < 1e-15 {
        return Err(PoseError::DegeneratePoints);
    }

    let svd = h.svd(true, true);
    let u = svd.u.ok_or(PoseError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(PoseError::SvdFailed)?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fix = u;
        u_fix.column_mut(2).neg_mut();
        r = u_fix * v_t;
    }

    let t = c_c - r * c_o;
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    Ok(Iso3::from_parts(Translation3::from(t), rot))
}
