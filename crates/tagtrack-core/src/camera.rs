//! Calibrated pinhole camera with Brown-Conrady distortion.
//!
//! Pose estimation works in normalized image-plane coordinates. The tag
//! path converts pixels with the *ideal* model (no distortion inversion),
//! matching how the corners are handed over by the recognizer.

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Errors raised while building camera parameters from raw calibration data.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("invalid intrinsics (fx={fx}, fy={fy}, cx={cx}, cy={cy})")]
    InvalidIntrinsics { fx: f64, fy: f64, cx: f64, cy: f64 },
    #[error("unsupported distortion coefficient count {0} (expected 0, 4, 5 or 8)")]
    DistortionCount(usize),
}

/// Pinhole camera intrinsics in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Returns `true` when every parameter is finite and focal lengths are non-zero.
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }

    #[inline]
    pub fn pixel_to_normalized(&self, pixel: Point2<f64>) -> Point2<f64> {
        Point2::new((pixel.x - self.cx) / self.fx, (pixel.y - self.cy) / self.fy)
    }

    #[inline]
    pub fn normalized_to_pixel(&self, normalized: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.fx * normalized.x + self.cx,
            self.fy * normalized.y + self.cy,
        )
    }
}

/// Brown-Conrady radial-tangential distortion coefficients.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RadialTangentialDistortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl RadialTangentialDistortion {
    pub fn is_zero(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0 && self.k3 == 0.0
    }

    /// Apply distortion to normalized coordinates.
    pub fn distort_normalized(&self, p: Point2<f64>) -> Point2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Point2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert [`Self::distort_normalized`] by fixed-point iteration.
    fn undistort_normalized(&self, distorted: Point2<f64>) -> Option<Point2<f64>> {
        const MAX_ITERS: usize = 20;
        const EPS: f64 = 1e-12;

        let mut p = distorted;
        for _ in 0..MAX_ITERS {
            let r2 = p.x * p.x + p.y * p.y;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
            if !radial.is_finite() || radial.abs() < 1e-12 {
                return None;
            }
            let dx = 2.0 * self.p1 * p.x * p.y + self.p2 * (r2 + 2.0 * p.x * p.x);
            let dy = self.p1 * (r2 + 2.0 * p.y * p.y) + 2.0 * self.p2 * p.x * p.y;
            let next = Point2::new((distorted.x - dx) / radial, (distorted.y - dy) / radial);
            if !next.x.is_finite() || !next.y.is_finite() {
                return None;
            }
            let step = (next - p).norm();
            p = next;
            if step <= EPS {
                break;
            }
        }
        Some(p)
    }
}

/// Full camera model shared read-only by every detector during a frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraParameters {
    pub intrinsics: CameraIntrinsics,
    #[serde(default)]
    pub distortion: RadialTangentialDistortion,
}

impl CameraParameters {
    /// Distortion-free camera.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            intrinsics: CameraIntrinsics { fx, fy, cx, cy },
            distortion: RadialTangentialDistortion::default(),
        }
    }

    /// Build parameters from a camera-info style message.
    ///
    /// `k` is the row-major 3x3 camera matrix, `d` the plumb-bob coefficients
    /// `[k1, k2, p1, p2, k3, ...]`. Rational-model terms beyond `k3` are ignored.
    pub fn from_camera_info(k: [f64; 9], d: &[f64]) -> Result<Self, CameraError> {
        let intrinsics = CameraIntrinsics {
            fx: k[0],
            fy: k[4],
            cx: k[2],
            cy: k[5],
        };
        if !intrinsics.is_valid() {
            return Err(CameraError::InvalidIntrinsics {
                fx: intrinsics.fx,
                fy: intrinsics.fy,
                cx: intrinsics.cx,
                cy: intrinsics.cy,
            });
        }
        let distortion = match d.len() {
            0 => RadialTangentialDistortion::default(),
            4 | 5 | 8 => RadialTangentialDistortion {
                k1: d[0],
                k2: d[1],
                p1: d[2],
                p2: d[3],
                k3: d.get(4).copied().unwrap_or(0.0),
            },
            n => return Err(CameraError::DistortionCount(n)),
        };
        Ok(Self {
            intrinsics,
            distortion,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.intrinsics.is_valid()
    }

    /// Ideal conversion from pixels to the normalized image plane.
    ///
    /// Distortion is deliberately not inverted here.
    #[inline]
    pub fn pixel_to_normalized(&self, pixel: Point2<f64>) -> Point2<f64> {
        self.intrinsics.pixel_to_normalized(pixel)
    }

    /// Conversion from (distorted) pixels to undistorted normalized coordinates.
    pub fn pixel_to_normalized_undistorted(&self, pixel: Point2<f64>) -> Option<Point2<f64>> {
        let xd = self.intrinsics.pixel_to_normalized(pixel);
        if self.distortion.is_zero() {
            return Some(xd);
        }
        self.distortion.undistort_normalized(xd)
    }

    /// Ideal pinhole projection of a camera-frame point. `None` behind the camera.
    pub fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        if point.z <= 1e-12 {
            return None;
        }
        let normalized = Point2::new(point.x / point.z, point.y / point.z);
        Some(self.intrinsics.normalized_to_pixel(normalized))
    }

    /// Projection including lens distortion.
    pub fn project_distorted(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        if point.z <= 1e-12 {
            return None;
        }
        let normalized = Point2::new(point.x / point.z, point.y / point.z);
        let distorted = self.distortion.distort_normalized(normalized);
        Some(self.intrinsics.normalized_to_pixel(distorted))
    }
}
