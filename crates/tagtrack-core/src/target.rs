use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Integer grid coordinates of a target corner (`i` along columns, `j` along rows).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoords {
    pub i: i32,
    pub j: i32,
}

/// A detected image corner, optionally labeled with its position on the target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabeledCorner {
    /// Pixel position (distorted image coordinates).
    pub position: Point2<f32>,
    #[serde(default)]
    pub grid: Option<GridCoords>,
    #[serde(default)]
    pub id: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    AprilTag,
    Chessboard,
}

/// Output of an external planar-target recognizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetDetection {
    pub kind: TargetKind,
    pub corners: Vec<LabeledCorner>,
}
