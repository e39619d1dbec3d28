use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tagtrack_core::{DepthMap, GrayImageView, Pt2};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One decoded tag as reported by the pixel-level recognizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagDetection {
    /// Raw decoded payload, e.g. `"36h11 7"`.
    pub message: String,
    /// Corner pixels, ordered like the tag's reference corners.
    pub polygon: [Pt2; 4],
}

/// External AprilTag recognition primitive.
pub trait TagRecognizer: Send {
    fn detect(&mut self, image: &GrayImageView<'_>) -> Vec<TagDetection>;
}

/// `true` when `message` ends with `" " + id`.
///
/// Only the trailing space-delimited token counts: `"36h11 7"` matches 7,
/// but neither 17 nor 70.
pub fn message_matches_id(message: &str, id: i32) -> bool {
    message_matches_suffix(message, &id_suffix(id))
}

pub(crate) fn id_suffix(id: i32) -> String {
    format!(" {id}")
}

#[inline]
pub(crate) fn message_matches_suffix(message: &str, suffix: &str) -> bool {
    message.ends_with(suffix)
}

struct EngineCache {
    recognizer: Box<dyn TagRecognizer>,
    detections: Vec<TagDetection>,
    depth: Option<DepthMap>,
}

/// Shared handle to the single tag recognizer and its per-frame cache.
///
/// Clones refer to the same recognizer. A processing pass holds the
/// [`AnalysedFrame`] guard for its whole duration; another pass calling
/// [`TagEngine::analyse_image`] blocks until that guard is dropped.
#[derive(Clone)]
pub struct TagEngine {
    inner: Arc<Mutex<EngineCache>>,
}

impl TagEngine {
    pub fn new(recognizer: Box<dyn TagRecognizer>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineCache {
                recognizer,
                detections: Vec::new(),
                depth: None,
            })),
        }
    }

    /// Run the recognizer once on `gray` and cache its output together with `depth`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(w = gray.width, h = gray.height))
    )]
    pub fn analyse_image<'a>(
        &'a self,
        gray: GrayImageView<'a>,
        depth: Option<DepthMap>,
    ) -> AnalysedFrame<'a> {
        let mut cache = self.inner.lock();
        let detections = cache.recognizer.detect(&gray);
        log::debug!(
            "tag recognizer: {} detections in {}x{} image",
            detections.len(),
            gray.width,
            gray.height
        );
        cache.detections = detections;
        cache.depth = depth;
        AnalysedFrame { cache, gray }
    }
}

impl std::fmt::Debug for TagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagEngine").finish_non_exhaustive()
    }
}

/// Recognition output of the current frame, valid while the guard lives.
pub struct AnalysedFrame<'a> {
    cache: MutexGuard<'a, EngineCache>,
    gray: GrayImageView<'a>,
}

impl<'a> AnalysedFrame<'a> {
    pub fn detections(&self) -> &[TagDetection] {
        &self.cache.detections
    }

    pub fn depth(&self) -> Option<&DepthMap> {
        self.cache.depth.as_ref()
    }

    pub fn gray(&self) -> GrayImageView<'a> {
        self.gray
    }
}
