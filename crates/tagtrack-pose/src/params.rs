use serde::{Deserialize, Serialize};

/// Tuning for the pose solvers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseParams {
    /// Gain of the virtual-visual-servoing update.
    pub vvs_lambda: f64,
    /// Iteration cap for the refinement loop.
    pub vvs_max_iterations: usize,
    /// Stop once the residual changes by less than this between iterations.
    pub vvs_threshold: f64,
    /// Pixel stride when sampling the depth map inside a polygon.
    pub depth_stride: usize,
    /// Minimal number of valid depth samples for the plane fit.
    pub min_depth_samples: usize,
    /// Optional upper bound on the refinement residual.
    ///
    /// `None` accepts every converged refinement.
    pub max_residual: Option<f64>,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            vvs_lambda: 0.9,
            vvs_max_iterations: 200,
            vvs_threshold: 1e-8,
            depth_stride: 1,
            min_depth_samples: 3,
            max_residual: None,
        }
    }
}
