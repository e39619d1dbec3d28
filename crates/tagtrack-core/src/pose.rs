//! Rigid transforms and the SE(3) exponential map.

use nalgebra::{
    Isometry3, Matrix3, Point2, Point3, Quaternion, Translation3, UnitQuaternion, Vector3,
    Vector6,
};
use serde::{Deserialize, Serialize};

pub type Pt2 = Point2<f64>;
pub type Pt3 = Point3<f64>;
pub type Vec3 = Vector3<f64>;
pub type Vec6 = Vector6<f64>;
pub type Mat3 = Matrix3<f64>;
/// Rigid transform; `cMo` maps object coordinates into the camera frame.
pub type Iso3 = Isometry3<f64>;

#[inline]
fn skew(v: &Vec3) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Exponential of a twist `[v; w]` (translational part first).
///
/// Unlike `Isometry3::new`, the translation is coupled to the rotation
/// through the left Jacobian, so constant-velocity screw motions integrate
/// exactly.
pub fn se3_exp(twist: &Vec6) -> Iso3 {
    let v = Vec3::new(twist[0], twist[1], twist[2]);
    let w = Vec3::new(twist[3], twist[4], twist[5]);
    let theta = w.norm();
    let wx = skew(&w);

    let (a, b) = if theta < 1e-8 {
        // Taylor expansions of (1-cos)/θ² and (θ-sin)/θ³.
        (0.5 - theta * theta / 24.0, 1.0 / 6.0 - theta * theta / 120.0)
    } else {
        let t2 = theta * theta;
        ((1.0 - theta.cos()) / t2, (theta - theta.sin()) / (t2 * theta))
    };
    let jacobian = Mat3::identity() + a * wx + b * wx * wx;

    let rotation = UnitQuaternion::from_scaled_axis(w);
    Iso3::from_parts(Translation3::from(jacobian * v), rotation)
}

/// Wire representation of a rigid transform (translation + `x, y, z, w` quaternion).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformMsg {
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
}

impl TransformMsg {
    pub fn from_pose(pose: &Iso3) -> Self {
        let t = pose.translation.vector;
        let q = pose.rotation.quaternion();
        Self {
            translation: [t.x, t.y, t.z],
            rotation: [q.i, q.j, q.k, q.w],
        }
    }

    pub fn to_pose(&self) -> Iso3 {
        let [x, y, z] = self.translation;
        let [qx, qy, qz, qw] = self.rotation;
        Iso3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz)),
        )
    }
}
