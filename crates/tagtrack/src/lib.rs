//! AprilTag and chessboard pose tracking for RGB-D cameras.
//!
//! This crate wires the `tagtrack-*` crates into a runnable tracker:
//! - [`TrackerNode`]: camera/image callbacks with a latest-frame-wins slot,
//!   one tracking pass per [`TrackerNode::spin_once`],
//! - [`PoseSink`]s for the TF and topic channels,
//! - [`NodeConfig`] and [`Recording`] JSON formats and [`run_replay`],
//! - (feature `image`) a debug overlay on `image::RgbaImage`.
//!
//! ## Quickstart
//!
//! ```no_run
//! use tagtrack::{MemorySink, NodeConfig, TrackerNode};
//! use tagtrack::tracker::{ReplayRecognizer, TagEngine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NodeConfig::load_json("node.json")?;
//! let engine = TagEngine::new(Box::new(ReplayRecognizer::default()));
//! let node = TrackerNode::new(config, engine, None)?;
//! node.camera_info_raw([615.0, 0.0, 320.0, 0.0, 615.0, 240.0, 0.0, 0.0, 1.0], &[])?;
//! node.add_april_tag(3, 0.1, None)?;
//!
//! let mut sink = MemorySink::default();
//! while node.wait_for_image(None) {
//!     node.spin_once(&mut sink)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `tagtrack::core`: camera model, images, depth maps, rigid transforms.
//! - `tagtrack::pose`: RGB-D, planar and VVS pose solvers.
//! - `tagtrack::tracker`: tag engine, per-target state machine, session.

pub use tagtrack_core as core;
pub use tagtrack_pose as pose;
pub use tagtrack_tracker as tracker;

mod config;
mod error;
mod node;
mod recording;
mod replay;
mod sink;

#[cfg(feature = "image")]
pub mod overlay;

pub use config::{ChessboardConfig, NodeConfig, TagConfig};
pub use error::{ConfigError, NodeError, ReplayError, SinkError};
pub use node::{SpinOutcome, TrackerNode};
pub use recording::{DepthSource, RecordedFrame, Recording};
pub use replay::{recording_base_dir, run_replay, ReplayOptions, ReplaySummary};
pub use sink::{JsonLinesSink, MemorySink, PoseChannel, PoseSink, PoseStamped};

pub use tagtrack_core::{init_with_level, CameraParameters, Iso3, TransformMsg};
#[cfg(feature = "tracing")]
pub use tagtrack_core::init_tracing;
pub use tagtrack_tracker::{
    Frame, FrameReport, TargetFrames, TargetKey, TargetPose, TrackingOptions, TrackingState,
};
