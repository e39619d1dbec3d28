use tagtrack_core::{Iso3, Pt3, TargetKind};
use tagtrack_pose::tag_reference_points;

use crate::engine::id_suffix;
use crate::tracking::{DetectOutcome, Detector, FrameContext, PoseTrack};

/// Tracks one AprilTag id of known physical size.
#[derive(Clone, Debug)]
pub struct AprilTagDetector {
    tag_id: i32,
    tag_size: f64,
    suffix: String,
    reference: [Pt3; 4],
    track: PoseTrack,
}

impl AprilTagDetector {
    /// `tag_size` is the side of the black square in meters.
    pub fn new(tag_id: i32, tag_size: f64) -> Self {
        Self {
            tag_id,
            tag_size,
            suffix: id_suffix(tag_id),
            reference: tag_reference_points(tag_size),
            track: PoseTrack::default(),
        }
    }

    pub fn tag_id(&self) -> i32 {
        self.tag_id
    }

    pub fn tag_size(&self) -> f64 {
        self.tag_size
    }

    pub fn last_known_pose(&self) -> Option<&Iso3> {
        self.track.last_known_pose()
    }
}

impl Detector for AprilTagDetector {
    fn kind(&self) -> TargetKind {
        TargetKind::AprilTag
    }

    fn detect(&mut self, frame: &FrameContext<'_>) -> DetectOutcome {
        let Some(hit) = frame.find_message(&self.suffix) else {
            return self.track.miss(frame.options);
        };
        log::trace!("tag {} matched message {:?}", self.tag_id, hit.message);
        self.track
            .observe(hit.polygon.to_vec(), &self.reference, &hit.polygon, frame)
    }

    fn track(&self) -> &PoseTrack {
        &self.track
    }

    fn reference_size(&self) -> f64 {
        self.tag_size
    }
}
