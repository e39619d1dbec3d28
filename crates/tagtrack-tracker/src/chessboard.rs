use serde::{Deserialize, Serialize};
use tagtrack_core::{GrayImageView, GridCoords, Pt2, TargetDetection, TargetKind};
use tagtrack_pose::grid_reference_points;

use crate::tracking::{DetectOutcome, Detector, FrameContext, PoseTrack};

/// Inner-corner layout of a chessboard.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChessboardSpec {
    /// Inner corners along the vertical axis.
    pub rows: u32,
    /// Inner corners along the horizontal axis.
    pub cols: u32,
    /// Square side in meters.
    pub square_size: f64,
}

impl ChessboardSpec {
    pub fn is_valid(&self) -> bool {
        self.rows >= 2 && self.cols >= 2 && self.square_size.is_finite() && self.square_size > 0.0
    }

    fn contains(&self, g: GridCoords) -> bool {
        g.i >= 0 && g.j >= 0 && (g.i as u32) < self.cols && (g.j as u32) < self.rows
    }
}

/// External chessboard corner recognizer.
pub trait GridRecognizer: Send {
    fn detect(&mut self, image: &GrayImageView<'_>) -> Option<TargetDetection>;
}

/// Tracks one chessboard through the same acquisition machine as tags.
pub struct ChessboardDetector {
    spec: ChessboardSpec,
    recognizer: Box<dyn GridRecognizer>,
    track: PoseTrack,
}

const MIN_CORNERS: usize = 4;

impl ChessboardDetector {
    pub fn new(spec: ChessboardSpec, recognizer: Box<dyn GridRecognizer>) -> Self {
        Self {
            spec,
            recognizer,
            track: PoseTrack::default(),
        }
    }

    pub fn spec(&self) -> &ChessboardSpec {
        &self.spec
    }
}

impl std::fmt::Debug for ChessboardDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChessboardDetector")
            .field("spec", &self.spec)
            .field("track", &self.track)
            .finish_non_exhaustive()
    }
}

impl Detector for ChessboardDetector {
    fn kind(&self) -> TargetKind {
        TargetKind::Chessboard
    }

    fn detect(&mut self, frame: &FrameContext<'_>) -> DetectOutcome {
        let Some(detection) = self.recognizer.detect(&frame.gray) else {
            return self.track.miss(frame.options);
        };

        let mut labeled: Vec<(GridCoords, Pt2)> = detection
            .corners
            .iter()
            .filter_map(|c| {
                let g = c.grid?;
                self.spec
                    .contains(g)
                    .then(|| (g, Pt2::new(c.position.x as f64, c.position.y as f64)))
            })
            .collect();
        labeled.sort_by_key(|(g, _)| (g.j, g.i));
        labeled.dedup_by_key(|(g, _)| *g);

        if labeled.len() < MIN_CORNERS {
            log::debug!(
                "chessboard: {} usable corners, need {MIN_CORNERS}",
                labeled.len()
            );
            return self.track.miss(frame.options);
        }

        let grid: Vec<GridCoords> = labeled.iter().map(|(g, _)| *g).collect();
        let pixels: Vec<Pt2> = labeled.iter().map(|(_, p)| *p).collect();
        let object = grid_reference_points(&grid, self.spec.square_size);
        let hull = convex_hull(&pixels);
        self.track.observe(pixels, &object, &hull, frame)
    }

    fn track(&self) -> &PoseTrack {
        &self.track
    }

    fn reference_size(&self) -> f64 {
        self.spec.square_size
    }
}

/// Counter-clockwise convex hull (monotone chain).
fn convex_hull(points: &[Pt2]) -> Vec<Pt2> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: &Pt2, a: &Pt2, b: &Pt2| (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x);
    let mut hull: Vec<Pt2> = Vec::with_capacity(pts.len() + 1);

    // lower chain
    for p in &pts {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    // upper chain
    let lower_len = hull.len() + 1;
    for p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}
