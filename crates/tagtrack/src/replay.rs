//! Offline replay of a [`Recording`] through a [`TrackerNode`].

use std::path::{Path, PathBuf};

use tagtrack_core::GrayImage;
use tagtrack_tracker::{Frame, GridRecognizer, ReplayGridRecognizer, ReplayRecognizer, TagEngine};

use crate::config::NodeConfig;
use crate::node::TrackerNode;
use crate::recording::Recording;
use crate::sink::PoseSink;
use crate::ReplayError;

#[derive(Clone, Debug, Default)]
pub struct ReplayOptions {
    /// Directory resolving relative depth paths of the recording.
    pub base_dir: PathBuf,
    /// Write one overlay PNG per frame here when `debug_display` is set.
    pub overlay_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub poses: usize,
    pub misses: usize,
    pub unresolved: usize,
}

/// Feed every recorded frame to a fresh node and publish the poses to `sink`.
pub fn run_replay(
    config: &NodeConfig,
    recording: &Recording,
    options: &ReplayOptions,
    sink: &mut dyn PoseSink,
) -> Result<ReplaySummary, ReplayError> {
    let tags = ReplayRecognizer::new(recording.frames.iter().map(|f| f.tags.clone()));
    let grid: Option<Box<dyn GridRecognizer>> = config.chessboard.as_ref().map(|_| {
        Box::new(ReplayGridRecognizer::new(
            recording.frames.iter().map(|f| f.chessboard.clone()),
        )) as Box<dyn GridRecognizer>
    });

    let node = TrackerNode::new(config.clone(), TagEngine::new(Box::new(tags)), grid)?;
    node.camera_info_callback(recording.camera)?;
    log::info!(
        "replaying {} frames ({}x{})",
        recording.frames.len(),
        recording.width,
        recording.height
    );

    let mut summary = ReplaySummary::default();
    for (index, recorded) in recording.frames.iter().enumerate() {
        let depth = recording.load_depth(index, &options.base_dir)?;
        node.frame_callback(Frame {
            timestamp: recorded.timestamp,
            gray: GrayImage::new(recording.width, recording.height),
            depth,
        });
        let Some(outcome) = node.spin_once(sink)? else {
            continue;
        };
        summary.frames += 1;
        summary.poses += outcome.report.poses.len();
        summary.misses += outcome.report.misses.len();
        summary.unresolved += outcome.report.unresolved.len();

        #[cfg(feature = "image")]
        {
            if let (Some(dir), Some(overlay)) = (options.overlay_dir.as_deref(), outcome.overlay) {
                save_overlay(dir, index, &overlay)?;
            }
        }
    }
    log::info!(
        "replay done: {} frames, {} poses, {} misses, {} unresolved",
        summary.frames,
        summary.poses,
        summary.misses,
        summary.unresolved
    );
    Ok(summary)
}

#[cfg(feature = "image")]
fn save_overlay(dir: &Path, index: usize, overlay: &image::RgbaImage) -> Result<(), ReplayError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("overlay_{index:05}.png"));
    overlay.save(&path)?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

/// Directory a recording's relative paths are resolved against.
pub fn recording_base_dir(recording_path: &Path) -> PathBuf {
    recording_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}
