use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tagtrack_core::{CameraParameters, DepthMap, GrayImage, Iso3};
use tagtrack_pose::{PoseError, PoseParams};

use crate::chessboard::{ChessboardDetector, ChessboardSpec, GridRecognizer};
use crate::engine::TagEngine;
use crate::tag::AprilTagDetector;
use crate::tracking::{DetectOutcome, Detector, FrameContext, TrackingOptions, TrackingState};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Identifies a registered target. Targets are processed in key order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKey {
    Tag(i32),
    Chessboard,
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKey::Tag(id) => write!(f, "tag {id}"),
            TargetKey::Chessboard => f.write_str("chessboard"),
        }
    }
}

/// Parent/child frame names published with a target's pose.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFrames {
    pub parent: String,
    pub child: String,
}

impl TargetFrames {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("tag {0} is already registered")]
    DuplicateTag(i32),
    #[error("invalid size {size} for tag {id}")]
    InvalidTagSize { id: i32, size: f64 },
    #[error("invalid chessboard {rows}x{cols} with square size {square_size}")]
    InvalidChessboard {
        rows: u32,
        cols: u32,
        square_size: f64,
    },
    #[error("camera parameters are not valid")]
    InvalidCamera,
}

/// One image with its optional aligned depth.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    /// Seconds, as stamped by the source.
    pub timestamp: f64,
    pub gray: GrayImage,
    pub depth: Option<DepthMap>,
}

/// A pose produced during one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetPose {
    pub key: TargetKey,
    pub frames: TargetFrames,
    /// `cMo`.
    pub pose: Iso3,
    pub state: TrackingState,
    pub residual_error: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub timestamp: f64,
    pub poses: Vec<TargetPose>,
    /// Targets not visible this frame (including unposable ones unless
    /// [`TrackingOptions::separate_pose_failure`] is set).
    pub misses: Vec<TargetKey>,
    /// Targets seen but not posed, when reported separately.
    pub unresolved: Vec<(TargetKey, PoseError)>,
}

struct RegisteredTarget {
    detector: Box<dyn Detector>,
    frames: TargetFrames,
}

/// Registry of tracked targets sharing one tag engine.
pub struct TrackingSession {
    engine: TagEngine,
    targets: BTreeMap<TargetKey, RegisteredTarget>,
    params: PoseParams,
    options: TrackingOptions,
}

impl TrackingSession {
    pub fn new(engine: TagEngine, params: PoseParams, options: TrackingOptions) -> Self {
        Self {
            engine,
            targets: BTreeMap::new(),
            params,
            options,
        }
    }

    pub fn engine(&self) -> &TagEngine {
        &self.engine
    }

    pub fn params(&self) -> &PoseParams {
        &self.params
    }

    pub fn options(&self) -> &TrackingOptions {
        &self.options
    }

    /// Register an AprilTag; it starts in [`TrackingState::NoObject`].
    pub fn add_april_tag(
        &mut self,
        tag_id: i32,
        tag_size: f64,
        frames: TargetFrames,
    ) -> Result<(), SessionError> {
        if !(tag_size.is_finite() && tag_size > 0.0) {
            return Err(SessionError::InvalidTagSize {
                id: tag_id,
                size: tag_size,
            });
        }
        let key = TargetKey::Tag(tag_id);
        if self.targets.contains_key(&key) {
            return Err(SessionError::DuplicateTag(tag_id));
        }
        log::info!(
            "tracking tag {tag_id} ({tag_size} m) as {} -> {}",
            frames.parent,
            frames.child
        );
        self.targets.insert(
            key,
            RegisteredTarget {
                detector: Box::new(AprilTagDetector::new(tag_id, tag_size)),
                frames,
            },
        );
        Ok(())
    }

    /// Configure the chessboard target, replacing any previous one.
    pub fn set_chessboard(
        &mut self,
        spec: ChessboardSpec,
        recognizer: Box<dyn GridRecognizer>,
        frames: TargetFrames,
    ) -> Result<(), SessionError> {
        if !spec.is_valid() {
            return Err(SessionError::InvalidChessboard {
                rows: spec.rows,
                cols: spec.cols,
                square_size: spec.square_size,
            });
        }
        log::info!(
            "tracking {}x{} chessboard ({} m squares) as {} -> {}",
            spec.cols,
            spec.rows,
            spec.square_size,
            frames.parent,
            frames.child
        );
        let previous = self.targets.insert(
            TargetKey::Chessboard,
            RegisteredTarget {
                detector: Box::new(ChessboardDetector::new(spec, recognizer)),
                frames,
            },
        );
        if previous.is_some() {
            log::debug!("previous chessboard configuration replaced");
        }
        Ok(())
    }

    pub fn remove(&mut self, key: TargetKey) -> bool {
        let removed = self.targets.remove(&key).is_some();
        if removed {
            log::info!("stopped tracking {key}");
        }
        removed
    }

    pub fn contains(&self, key: TargetKey) -> bool {
        self.targets.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn detector(&self, key: TargetKey) -> Option<&dyn Detector> {
        self.targets.get(&key).map(|t| t.detector.as_ref())
    }

    pub fn frames(&self, key: TargetKey) -> Option<&TargetFrames> {
        self.targets.get(&key).map(|t| &t.frames)
    }

    /// Registered targets in processing order.
    pub fn targets(&self) -> impl Iterator<Item = (TargetKey, &TargetFrames, &dyn Detector)> {
        self.targets
            .iter()
            .map(|(key, t)| (*key, &t.frames, t.detector.as_ref()))
    }

    /// Run one recognition pass over `frame`, then update every target in key order.
    ///
    /// A failure of one target never affects the others.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(t = frame.timestamp, targets = self.targets.len()))
    )]
    pub fn process_frame(
        &mut self,
        frame: Frame,
        camera: &CameraParameters,
    ) -> Result<FrameReport, SessionError> {
        if !camera.is_valid() {
            return Err(SessionError::InvalidCamera);
        }
        let Frame {
            timestamp,
            gray,
            depth,
        } = frame;

        let analysed = self.engine.analyse_image(gray.view(), depth);
        let ctx = FrameContext::new(&analysed, camera, &self.params, &self.options);

        let mut report = FrameReport {
            timestamp,
            ..FrameReport::default()
        };
        for (key, target) in self.targets.iter_mut() {
            match target.detector.detect(&ctx) {
                DetectOutcome::Posed => {
                    let detector = target.detector.as_ref();
                    if let Some(pose) = detector.pose() {
                        report.poses.push(TargetPose {
                            key: *key,
                            frames: target.frames.clone(),
                            pose: *pose,
                            state: detector.state(),
                            residual_error: detector.residual_error(),
                        });
                    }
                }
                DetectOutcome::NotDetected => report.misses.push(*key),
                DetectOutcome::PoseUnresolved(err) => report.unresolved.push((*key, err)),
            }
        }
        log::debug!(
            "frame t={timestamp:.3}: {} posed, {} missed, {} unresolved",
            report.poses.len(),
            report.misses.len(),
            report.unresolved.len()
        );
        Ok(report)
    }
}

impl fmt::Debug for TrackingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingSession")
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .field("params", &self.params)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
