//! Virtual visual servoing (VVS) pose refinement.
//!
//! The current pose is treated as a virtual camera that is servoed until the
//! projected object points coincide with the observed normalized points.
//! Each iteration computes the point-feature interaction matrix `L`, the
//! camera velocity `v = -λ L⁺ e` and applies `cMo ← exp(v)⁻¹ · cMo`.

use crate::{Correspondence, PoseError, PoseParams};
use nalgebra::DMatrix;
use tagtrack_core::{se3_exp, Iso3, Vec6};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of a refinement run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VvsSolution {
    pub pose: Iso3,
    /// Sum of squared normalized reprojection errors at `pose`.
    pub residual: f64,
    pub iterations: usize,
}

/// Sum over all correspondences of the squared normalized reprojection error.
///
/// Points behind the camera contribute `+inf`.
pub fn residual(pose: &Iso3, correspondences: &[Correspondence]) -> f64 {
    correspondences
        .iter()
        .map(|c| {
            let p = pose * c.object;
            if p.z <= 0.0 {
                return f64::INFINITY;
            }
            let dx = p.x / p.z - c.normalized.x;
            let dy = p.y / p.z - c.normalized.y;
            dx * dx + dy * dy
        })
        .sum()
}

/// Refine `warm_start` by virtual visual servoing.
///
/// The loop stops when the residual changes by less than
/// `params.vvs_threshold` or after `params.vvs_max_iterations` updates.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(points = correspondences.len()))
)]
pub fn refine_vvs(
    warm_start: &Iso3,
    correspondences: &[Correspondence],
    params: &PoseParams,
) -> Result<VvsSolution, PoseError> {
    let n = correspondences.len();
    if n < 3 {
        return Err(PoseError::NotEnoughCorrespondences {
            found: n,
            required: 3,
        });
    }

    let mut pose = *warm_start;
    let mut l = DMatrix::<f64>::zeros(2 * n, 6);
    let mut e = DMatrix::<f64>::zeros(2 * n, 1);

    let mut r = f64::MAX;
    let mut iterations = 0;

    loop {
        for (k, c) in correspondences.iter().enumerate() {
            let p = pose * c.object;
            if p.z <= 1e-12 {
                return Err(PoseError::PointBehindCamera { index: k });
            }
            let z_inv = 1.0 / p.z;
            let x = p.x * z_inv;
            let y = p.y * z_inv;

            e[(2 * k, 0)] = x - c.normalized.x;
            e[(2 * k + 1, 0)] = y - c.normalized.y;

            let row = 2 * k;
            l[(row, 0)] = -z_inv;
            l[(row, 1)] = 0.0;
            l[(row, 2)] = x * z_inv;
            l[(row, 3)] = x * y;
            l[(row, 4)] = -(1.0 + x * x);
            l[(row, 5)] = y;

            let row = row + 1;
            l[(row, 0)] = 0.0;
            l[(row, 1)] = -z_inv;
            l[(row, 2)] = y * z_inv;
            l[(row, 3)] = 1.0 + y * y;
            l[(row, 4)] = -x * y;
            l[(row, 5)] = -x;
        }

        let r_prev = r;
        r = e.norm_squared();
        if (r - r_prev).abs() <= params.vvs_threshold || iterations >= params.vvs_max_iterations
        {
            break;
        }

        let l_pinv = l
            .clone()
            .pseudo_inverse(1e-12)
            .map_err(|_| PoseError::SvdFailed)?;
        let v = -params.vvs_lambda * (l_pinv * &e);
        let twist = Vec6::from_iterator(v.iter().copied());
        if !twist.iter().all(|x| x.is_finite()) {
            return Err(PoseError::Diverged);
        }

        pose = se3_exp(&twist).inverse() * pose;
        iterations += 1;
    }

    let residual = residual(&pose, correspondences);
    if !residual.is_finite() {
        return Err(PoseError::Diverged);
    }
    if let Some(limit) = params.max_residual {
        if residual > limit {
            return Err(PoseError::ResidualTooLarge { residual, limit });
        }
    }
    log::trace!("vvs converged after {iterations} iterations, residual {residual:.3e}");

    Ok(VvsSolution {
        pose,
        residual,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_reference_points;
    use nalgebra::{Translation3, UnitQuaternion};
    use tagtrack_core::Pt2;

    fn observe(pose: &Iso3, tag_size: f64) -> Vec<Correspondence> {
        tag_reference_points(tag_size)
            .iter()
            .map(|&o| {
                let p = pose * o;
                let n = Pt2::new(p.x / p.z, p.y / p.z);
                Correspondence {
                    object: o,
                    pixel: n,
                    normalized: n,
                }
            })
            .collect()
    }

    #[test]
    fn residual_is_zero_at_ground_truth() {
        let gt = Iso3::from_parts(
            Translation3::new(0.0, 0.0, 0.5),
            UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
        );
        let c = observe(&gt, 0.1);
        assert!(residual(&gt, &c) < 1e-24);
    }

    #[test]
    fn refinement_from_ground_truth_stays_put() {
        let gt = Iso3::translation(0.02, 0.01, 0.8);
        let c = observe(&gt, 0.1);
        let sol = refine_vvs(&gt, &c, &PoseParams::default()).expect("converges");
        assert!(sol.residual < 1e-20);
        assert!((sol.pose.translation.vector - gt.translation.vector).norm() < 1e-9);
    }

    #[test]
    fn residual_limit_rejects_bad_fit() {
        let gt = Iso3::translation(0.0, 0.0, 0.8);
        let mut c = observe(&gt, 0.1);
        // Corrupt one observation so no rigid pose explains all four.
        c[0].normalized.x += 0.05;
        let params = PoseParams {
            max_residual: Some(1e-8),
            ..PoseParams::default()
        };
        assert!(matches!(
            refine_vvs(&gt, &c, &params),
            Err(PoseError::ResidualTooLarge { .. })
        ));
    }

    #[test]
    fn too_few_points_is_an_error() {
        let gt = Iso3::translation(0.0, 0.0, 0.8);
        let c = observe(&gt, 0.1);
        assert!(matches!(
            refine_vvs(&gt, &c[..2], &PoseParams::default()),
            Err(PoseError::NotEnoughCorrespondences { found: 2, .. })
        ));
    }
}
