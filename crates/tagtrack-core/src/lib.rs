//! Core types and utilities for fiducial tag tracking.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete tag recognizer, transport or image library.

mod camera;
mod homography;
mod image;
mod logger;
mod pose;
mod target;

pub use camera::{CameraError, CameraIntrinsics, CameraParameters, RadialTangentialDistortion};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{DepthMap, GrayImage, GrayImageView};
pub use pose::{se3_exp, Iso3, Mat3, Pt2, Pt3, TransformMsg, Vec3, Vec6};
pub use target::{GridCoords, LabeledCorner, TargetDetection, TargetKind};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
