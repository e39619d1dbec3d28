//! The per-object acquisition state machine shared by all targets.

use serde::{Deserialize, Serialize};
use tagtrack_core::{CameraParameters, DepthMap, GrayImageView, Iso3, Pt2, Pt3, TargetKind};
use tagtrack_pose::{
    build_correspondences, refine_vvs, solve_planar, solve_rgbd, PoseError, PoseParams,
};

use crate::engine::{message_matches_suffix, AnalysedFrame, TagDetection};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    #[default]
    NoObject,
    NewlyAcquired,
    AlreadyAcquired,
}

/// What to do when a newly seen object has no usable depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDepthPolicy {
    /// Fail the acquisition; the object is retried on the next frame.
    #[default]
    Fail,
    /// Initialize from the image-only planar solve instead.
    PlanarFallback,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingOptions {
    pub missing_depth: MissingDepthPolicy,
    /// Report detected-but-unposable objects as [`DetectOutcome::PoseUnresolved`]
    /// instead of [`DetectOutcome::NotDetected`].
    pub separate_pose_failure: bool,
    /// Keep the last good pose available through [`PoseTrack::last_known_pose`]
    /// after the object is lost.
    pub keep_last_pose: bool,
}

/// Data of a posed object for the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Acquisition {
    /// Observed corners, ordered like the object's reference points.
    pub image_points: Vec<Pt2>,
    /// `cMo`.
    pub pose: Iso3,
    /// Residual of the refinement; `None` on the direct acquisition path.
    pub residual_error: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DetectOutcome {
    Posed,
    NotDetected,
    PoseUnresolved(PoseError),
}

impl DetectOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DetectOutcome::Posed)
    }
}

/// Everything a detector may read while processing one frame.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub detections: &'a [TagDetection],
    pub depth: Option<&'a DepthMap>,
    pub gray: GrayImageView<'a>,
    pub camera: &'a CameraParameters,
    pub params: &'a PoseParams,
    pub options: &'a TrackingOptions,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        frame: &'a AnalysedFrame<'_>,
        camera: &'a CameraParameters,
        params: &'a PoseParams,
        options: &'a TrackingOptions,
    ) -> Self {
        Self {
            detections: frame.detections(),
            depth: frame.depth(),
            gray: frame.gray(),
            camera,
            params,
            options,
        }
    }

    /// First detection whose message ends with `suffix`, in recognizer order.
    pub(crate) fn find_message(&self, suffix: &str) -> Option<&'a TagDetection> {
        self.detections
            .iter()
            .find(|d| message_matches_suffix(&d.message, suffix))
    }
}

/// State of one tracked object across frames.
///
/// `acquisition` is `Some` exactly when `state != NoObject`; its pose is the
/// warm start handed to the next frame's refinement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseTrack {
    state: TrackingState,
    acquisition: Option<Acquisition>,
    last_known: Option<Iso3>,
}

impl PoseTrack {
    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn acquisition(&self) -> Option<&Acquisition> {
        self.acquisition.as_ref()
    }

    pub fn pose(&self) -> Option<&Iso3> {
        self.acquisition.as_ref().map(|a| &a.pose)
    }

    pub fn residual_error(&self) -> Option<f64> {
        self.acquisition.as_ref().and_then(|a| a.residual_error)
    }

    pub fn image_points(&self) -> &[Pt2] {
        self.acquisition
            .as_ref()
            .map(|a| a.image_points.as_slice())
            .unwrap_or(&[])
    }

    /// Last successfully computed pose.
    ///
    /// While tracked this is the current pose whatever the options. After a
    /// loss it survives only when [`TrackingOptions::keep_last_pose`] is set.
    pub fn last_known_pose(&self) -> Option<&Iso3> {
        self.last_known.as_ref()
    }

    /// The object was not found this frame.
    pub fn miss(&mut self, options: &TrackingOptions) -> DetectOutcome {
        if self.state != TrackingState::NoObject {
            log::debug!("object lost");
        }
        self.reset(options);
        DetectOutcome::NotDetected
    }

    /// The object was found at `image_points`; compute its pose.
    ///
    /// `object` holds the matching reference points and `polygon` bounds the
    /// object in the image for depth sampling.
    pub fn observe(
        &mut self,
        image_points: Vec<Pt2>,
        object: &[Pt3],
        polygon: &[Pt2],
        frame: &FrameContext<'_>,
    ) -> DetectOutcome {
        let warm_start = self.acquisition.take().map(|a| a.pose);
        self.state = if warm_start.is_some() {
            TrackingState::AlreadyAcquired
        } else {
            TrackingState::NewlyAcquired
        };

        match compute_pose(warm_start.as_ref(), &image_points, object, polygon, frame) {
            Ok((pose, residual_error)) => {
                if self.state == TrackingState::NewlyAcquired {
                    log::debug!("object acquired at t={:?}", pose.translation.vector.as_slice());
                }
                self.acquisition = Some(Acquisition {
                    image_points,
                    pose,
                    residual_error,
                });
                self.last_known = Some(pose);
                DetectOutcome::Posed
            }
            Err(err) => {
                log::warn!("pose computation failed ({:?}): {err}", self.state);
                self.reset(frame.options);
                if frame.options.separate_pose_failure {
                    DetectOutcome::PoseUnresolved(err)
                } else {
                    DetectOutcome::NotDetected
                }
            }
        }
    }

    fn reset(&mut self, options: &TrackingOptions) {
        self.state = TrackingState::NoObject;
        self.acquisition = None;
        if !options.keep_last_pose {
            self.last_known = None;
        }
    }
}

/// Direct RGB-D solve without a warm start, VVS refinement with one.
fn compute_pose(
    warm_start: Option<&Iso3>,
    image_points: &[Pt2],
    object: &[Pt3],
    polygon: &[Pt2],
    frame: &FrameContext<'_>,
) -> Result<(Iso3, Option<f64>), PoseError> {
    let correspondences = build_correspondences(frame.camera, object, image_points)?;

    match warm_start {
        Some(previous) => {
            let sol = refine_vvs(previous, &correspondences, frame.params)?;
            Ok((sol.pose, Some(sol.residual)))
        }
        None => {
            let direct = solve_rgbd(
                frame.depth,
                polygon,
                &correspondences,
                frame.camera,
                frame.params,
            );
            match direct {
                Err(PoseError::MissingDepth | PoseError::InsufficientDepth { .. })
                    if frame.options.missing_depth == MissingDepthPolicy::PlanarFallback =>
                {
                    log::debug!("no usable depth, planar initialization");
                    Ok((solve_planar(&correspondences)?, None))
                }
                other => other.map(|pose| (pose, None)),
            }
        }
    }
}

/// A trackable object: AprilTag or chessboard.
pub trait Detector: Send {
    fn kind(&self) -> TargetKind;

    /// Look for the object in this frame and update the track.
    fn detect(&mut self, frame: &FrameContext<'_>) -> DetectOutcome;

    fn track(&self) -> &PoseTrack;

    /// Physical size used to scale the overlay axes (tag side, square side).
    fn reference_size(&self) -> f64;

    fn state(&self) -> TrackingState {
        self.track().state()
    }

    fn pose(&self) -> Option<&Iso3> {
        self.track().pose()
    }

    fn residual_error(&self) -> Option<f64> {
        self.track().residual_error()
    }

    fn image_points(&self) -> &[Pt2] {
        self.track().image_points()
    }
}
