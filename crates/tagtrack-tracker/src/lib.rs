//! Per-frame fiducial tracking.
//!
//! Pipeline for one frame:
//! - the shared [`TagEngine`] runs the tag recognizer once and caches the depth map,
//! - every registered detector looks for its own object in that output,
//! - newly acquired objects get an RGB-D direct pose, tracked ones a
//!   warm-started VVS refinement,
//! - detectors that fail fall back to [`TrackingState::NoObject`].
//!
//! Pixel-level tag and chessboard recognition are external: plug them in
//! through [`TagRecognizer`] and [`GridRecognizer`].

mod chessboard;
mod engine;
mod replay;
mod session;
mod tag;
mod tracking;

pub use chessboard::{ChessboardDetector, ChessboardSpec, GridRecognizer};
pub use engine::{message_matches_id, AnalysedFrame, TagDetection, TagEngine, TagRecognizer};
pub use replay::{ReplayGridRecognizer, ReplayRecognizer};
pub use session::{Frame, FrameReport, SessionError, TargetFrames, TargetKey, TargetPose, TrackingSession};
pub use tag::AprilTagDetector;
pub use tracking::{
    Acquisition, DetectOutcome, Detector, FrameContext, MissingDepthPolicy, PoseTrack,
    TrackingOptions, TrackingState,
};

pub use tagtrack_pose::{PoseError, PoseParams};
