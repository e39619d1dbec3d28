//! Transport-facing tracker node.
//!
//! Camera parameters and images arrive asynchronously through the callbacks;
//! [`TrackerNode::spin_once`] snapshots both under their locks and runs one
//! tracking pass. Images that arrive while a pass is running are coalesced:
//! only the latest one is kept.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tagtrack_core::{CameraParameters, TransformMsg};
use tagtrack_tracker::{
    ChessboardSpec, Frame, FrameReport, GridRecognizer, SessionError, TagEngine, TargetKey,
    TrackingSession,
};

use crate::config::NodeConfig;
use crate::sink::{PoseChannel, PoseSink, PoseStamped};
use crate::{NodeError, SinkError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Result of one processed frame.
#[derive(Debug)]
pub struct SpinOutcome {
    pub report: FrameReport,
    /// Debug rendering of the frame, when `debug_display` is set.
    #[cfg(feature = "image")]
    pub overlay: Option<image::RgbaImage>,
}

pub struct TrackerNode {
    config: NodeConfig,
    camera: Mutex<Option<CameraParameters>>,
    latest: Mutex<Option<Frame>>,
    image_ready: Condvar,
    session: Mutex<TrackingSession>,
}

impl TrackerNode {
    /// Build a node and register the tags and chessboard listed in `config`.
    ///
    /// The chessboard entry is only honored when `grid` provides a recognizer.
    pub fn new(
        config: NodeConfig,
        engine: TagEngine,
        grid: Option<Box<dyn GridRecognizer>>,
    ) -> Result<Self, NodeError> {
        let mut session =
            TrackingSession::new(engine, config.pose.clone(), config.tracking.clone());
        for tag in &config.tags {
            let frames = config.tag_frames(tag.id, tag.child_frame.as_deref());
            session.add_april_tag(tag.id, tag.size, frames)?;
        }
        match (&config.chessboard, grid) {
            (Some(board), Some(recognizer)) => {
                let frames = config.chessboard_frames(board.child_frame.as_deref());
                session.set_chessboard(board.spec, recognizer, frames)?;
            }
            (Some(_), None) => log::warn!("chessboard configured but no grid recognizer given"),
            _ => {}
        }

        Ok(Self {
            config,
            camera: Mutex::new(None),
            latest: Mutex::new(None),
            image_ready: Condvar::new(),
            session: Mutex::new(session),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Store the latest camera calibration.
    pub fn camera_info_callback(&self, camera: CameraParameters) -> Result<(), NodeError> {
        if !camera.is_valid() {
            return Err(SessionError::InvalidCamera.into());
        }
        let mut slot = self.camera.lock();
        if slot.is_none() {
            log::info!("camera parameters received");
        }
        *slot = Some(camera);
        Ok(())
    }

    /// Same as [`Self::camera_info_callback`] from a raw `K` matrix and distortion vector.
    pub fn camera_info_raw(&self, k: [f64; 9], d: &[f64]) -> Result<(), NodeError> {
        self.camera_info_callback(CameraParameters::from_camera_info(k, d)?)
    }

    /// Offer a new image. Returns `false` when it is dropped because no
    /// camera parameters have been received yet.
    pub fn frame_callback(&self, frame: Frame) -> bool {
        if self.camera.lock().is_none() {
            log::debug!(
                "frame at t={:.3} dropped: no camera parameters yet",
                frame.timestamp
            );
            return false;
        }
        let mut latest = self.latest.lock();
        if let Some(old) = latest.replace(frame) {
            log::trace!("frame at t={:.3} superseded before processing", old.timestamp);
        }
        self.image_ready.notify_one();
        true
    }

    /// Block until an unprocessed image is available.
    ///
    /// With a timeout, returns `false` if none arrived in time.
    pub fn wait_for_image(&self, timeout: Option<Duration>) -> bool {
        let mut latest = self.latest.lock();
        match timeout {
            None => {
                while latest.is_none() {
                    self.image_ready.wait(&mut latest);
                }
                true
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while latest.is_none() {
                    if self.image_ready.wait_until(&mut latest, deadline).timed_out() {
                        return latest.is_some();
                    }
                }
                true
            }
        }
    }

    /// Register a tag at runtime; the child frame defaults to `tag_<id>`.
    pub fn add_april_tag(
        &self,
        tag_id: i32,
        tag_size: f64,
        child_frame: Option<&str>,
    ) -> Result<(), NodeError> {
        let frames = self.config.tag_frames(tag_id, child_frame);
        self.session.lock().add_april_tag(tag_id, tag_size, frames)?;
        Ok(())
    }

    /// Configure (or replace) the chessboard target at runtime.
    pub fn set_chessboard(
        &self,
        spec: ChessboardSpec,
        recognizer: Box<dyn GridRecognizer>,
        child_frame: Option<&str>,
    ) -> Result<(), NodeError> {
        let frames = self.config.chessboard_frames(child_frame);
        self.session.lock().set_chessboard(spec, recognizer, frames)?;
        Ok(())
    }

    pub fn remove_target(&self, key: TargetKey) -> bool {
        self.session.lock().remove(key)
    }

    /// Run a closure with the session locked, e.g. to inspect detector states.
    pub fn with_session<R>(&self, f: impl FnOnce(&TrackingSession) -> R) -> R {
        f(&self.session.lock())
    }

    /// Process the latest image, if any, and publish its poses to `sink`.
    ///
    /// A sink failure is reported after the whole frame has been offered to
    /// the sink; the tracking state still advances.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn spin_once(&self, sink: &mut dyn PoseSink) -> Result<Option<SpinOutcome>, NodeError> {
        let Some(frame) = self.latest.lock().take() else {
            return Ok(None);
        };
        let Some(camera) = *self.camera.lock() else {
            return Ok(None);
        };

        #[cfg(feature = "image")]
        let canvas = self
            .config
            .debug_display
            .then(|| crate::overlay::gray_to_rgba(&frame.gray.view()));

        let mut session = self.session.lock();
        let report = session.process_frame(frame, &camera)?;
        self.publish(&report, sink)?;

        #[cfg(feature = "image")]
        let overlay = canvas.map(|mut canvas| {
            crate::overlay::draw_session(&mut canvas, &session, &camera);
            canvas
        });

        Ok(Some(SpinOutcome {
            report,
            #[cfg(feature = "image")]
            overlay,
        }))
    }

    /// Every message is offered to the sink even after a failure; the first
    /// error is returned.
    fn publish(&self, report: &FrameReport, sink: &mut dyn PoseSink) -> Result<(), NodeError> {
        let mut first_error: Option<SinkError> = None;
        for target in &report.poses {
            let transform = TransformMsg::from_pose(&target.pose);
            let mut messages = Vec::with_capacity(2);
            if self.config.broadcast_tf {
                messages.push((
                    PoseChannel::Tf,
                    PoseStamped {
                        stamp: report.timestamp,
                        parent_frame: target.frames.parent.clone(),
                        child_frame: format!(
                            "{}{}",
                            target.frames.child, self.config.broadcast_tf_postfix
                        ),
                        transform,
                    },
                ));
            }
            if self.config.broadcast_topic {
                messages.push((
                    PoseChannel::Topic,
                    PoseStamped {
                        stamp: report.timestamp,
                        parent_frame: target.frames.parent.clone(),
                        child_frame: target.frames.child.clone(),
                        transform,
                    },
                ));
            }
            for (channel, msg) in messages {
                if let Err(err) = sink.publish(channel, &msg) {
                    log::warn!("publishing {} on {channel:?} failed: {err}", msg.child_frame);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for TrackerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerNode")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
