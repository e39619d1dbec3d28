//! JSON configuration of a tracker node.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tagtrack_tracker::{ChessboardSpec, PoseParams, TargetFrames, TrackingOptions};

use crate::ConfigError;

fn default_camera_frame() -> String {
    "camera".to_string()
}

fn default_true() -> bool {
    true
}

/// A tag tracked from startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagConfig {
    pub id: i32,
    /// Side of the tag in meters.
    pub size: f64,
    /// Published child frame; defaults to `tag_<id>`.
    #[serde(default)]
    pub child_frame: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChessboardConfig {
    #[serde(flatten)]
    pub spec: ChessboardSpec,
    /// Published child frame; defaults to `chessboard`.
    #[serde(default)]
    pub child_frame: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Parent frame of every published pose.
    #[serde(default = "default_camera_frame")]
    pub camera_frame: String,
    #[serde(default = "default_true")]
    pub broadcast_tf: bool,
    #[serde(default = "default_true")]
    pub broadcast_topic: bool,
    /// Appended to child frame names on the TF channel only.
    #[serde(default)]
    pub broadcast_tf_postfix: String,
    #[serde(default)]
    pub debug_display: bool,
    #[serde(default)]
    pub pose: PoseParams,
    #[serde(default)]
    pub tracking: TrackingOptions,
    #[serde(default)]
    pub tags: Vec<TagConfig>,
    #[serde(default)]
    pub chessboard: Option<ChessboardConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            camera_frame: default_camera_frame(),
            broadcast_tf: true,
            broadcast_topic: true,
            broadcast_tf_postfix: String::new(),
            debug_display: false,
            pose: PoseParams::default(),
            tracking: TrackingOptions::default(),
            tags: Vec::new(),
            chessboard: None,
        }
    }
}

impl NodeConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Frame names for a tag, using `child` or `tag_<id>`.
    pub fn tag_frames(&self, id: i32, child: Option<&str>) -> TargetFrames {
        let child = child.map_or_else(|| format!("tag_{id}"), str::to_string);
        TargetFrames::new(self.camera_frame.clone(), child)
    }

    pub fn chessboard_frames(&self, child: Option<&str>) -> TargetFrames {
        TargetFrames::new(
            self.camera_frame.clone(),
            child.unwrap_or("chessboard").to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagtrack_tracker::MissingDepthPolicy;

    #[test]
    fn minimal_json_uses_defaults() {
        let cfg: NodeConfig = serde_json::from_str(r#"{ "tags": [{ "id": 3, "size": 0.1 }] }"#)
            .expect("json");
        assert_eq!(cfg.camera_frame, "camera");
        assert!(cfg.broadcast_tf && cfg.broadcast_topic);
        assert!(cfg.broadcast_tf_postfix.is_empty());
        assert_eq!(cfg.pose, PoseParams::default());
        assert_eq!(cfg.tags[0].child_frame, None);
        assert_eq!(cfg.tag_frames(3, None).child, "tag_3");
    }

    #[test]
    fn nested_overrides_and_chessboard() {
        let cfg: NodeConfig = serde_json::from_str(
            r#"{
                "camera_frame": "rgbd_optical",
                "broadcast_tf_postfix": "_measured",
                "tracking": { "missing_depth": "planar_fallback" },
                "pose": { "vvs_max_iterations": 50 },
                "chessboard": { "rows": 6, "cols": 9, "square_size": 0.025, "child_frame": "board" }
            }"#,
        )
        .expect("json");
        assert_eq!(cfg.tracking.missing_depth, MissingDepthPolicy::PlanarFallback);
        assert_eq!(cfg.pose.vvs_max_iterations, 50);
        assert_eq!(cfg.pose.vvs_lambda, 0.9);
        let board = cfg.chessboard.as_ref().expect("board");
        assert_eq!(board.spec.cols, 9);
        let frames = cfg.chessboard_frames(board.child_frame.as_deref());
        assert_eq!(frames.parent, "rgbd_optical");
        assert_eq!(frames.child, "board");
    }
}
