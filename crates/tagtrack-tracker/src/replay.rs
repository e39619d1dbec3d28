//! Recognizers that play back recorded per-frame output.

use std::collections::VecDeque;

use tagtrack_core::{GrayImageView, TargetDetection};

use crate::chessboard::GridRecognizer;
use crate::engine::{TagDetection, TagRecognizer};

/// Returns one recorded detection list per call, then nothing.
#[derive(Clone, Debug, Default)]
pub struct ReplayRecognizer {
    frames: VecDeque<Vec<TagDetection>>,
}

impl ReplayRecognizer {
    pub fn new(frames: impl IntoIterator<Item = Vec<TagDetection>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, detections: Vec<TagDetection>) {
        self.frames.push_back(detections);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl TagRecognizer for ReplayRecognizer {
    fn detect(&mut self, _image: &GrayImageView<'_>) -> Vec<TagDetection> {
        self.frames.pop_front().unwrap_or_default()
    }
}

/// Chessboard counterpart of [`ReplayRecognizer`].
#[derive(Clone, Debug, Default)]
pub struct ReplayGridRecognizer {
    frames: VecDeque<Option<TargetDetection>>,
}

impl ReplayGridRecognizer {
    pub fn new(frames: impl IntoIterator<Item = Option<TargetDetection>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, detection: Option<TargetDetection>) {
        self.frames.push_back(detection);
    }
}

impl GridRecognizer for ReplayGridRecognizer {
    fn detect(&mut self, _image: &GrayImageView<'_>) -> Option<TargetDetection> {
        self.frames.pop_front().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagtrack_core::Pt2;

    #[test]
    fn frames_are_consumed_in_order() {
        let det = |m: &str| TagDetection {
            message: m.into(),
            polygon: [Pt2::origin(); 4],
        };
        let mut replay = ReplayRecognizer::new(vec![vec![det("a 1")], vec![]]);
        replay.push(vec![det("a 2"), det("a 3")]);
        let img = GrayImageView {
            width: 0,
            height: 0,
            data: &[],
        };
        assert_eq!(replay.remaining(), 3);
        assert_eq!(replay.detect(&img)[0].message, "a 1");
        assert!(replay.detect(&img).is_empty());
        assert_eq!(replay.detect(&img).len(), 2);
        assert!(replay.detect(&img).is_empty());
    }
}
