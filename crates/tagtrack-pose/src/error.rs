/// Reasons a pose could not be computed for a detected object.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("no depth map available for the RGB-D solve")]
    MissingDepth,
    #[error("not enough valid depth samples inside the polygon (found {found}, need {required})")]
    InsufficientDepth { found: usize, required: usize },
    #[error("depth samples do not span a plane")]
    DegeneratePlane,
    #[error("viewing ray of corner {corner} does not hit the fitted plane in front of the camera")]
    RayMissesPlane { corner: usize },
    #[error("not enough correspondences (found {found}, need {required})")]
    NotEnoughCorrespondences { found: usize, required: usize },
    #[error("object and image point counts differ ({object} vs {image})")]
    CountMismatch { object: usize, image: usize },
    #[error("degenerate point configuration")]
    DegeneratePoints,
    #[error("SVD failed to converge")]
    SvdFailed,
    #[error("point {index} is behind the camera during refinement")]
    PointBehindCamera { index: usize },
    #[error("refinement diverged")]
    Diverged,
    #[error("residual {residual:.3e} exceeds limit {limit:.3e}")]
    ResidualTooLarge { residual: f64, limit: f64 },
}
