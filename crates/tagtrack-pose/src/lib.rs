//! Camera-to-object pose estimation for square fiducials and planar grids.
//!
//! Three solvers share one correspondence type:
//! - [`solve_rgbd`]: direct solve from the depth map, used on first acquisition,
//! - [`solve_planar`]: depth-free homography decomposition,
//! - [`refine_vvs`]: warm-started virtual visual servoing for tracked objects.
//!
//! All poses are `cMo`: they map object coordinates into the camera frame.

mod error;
mod params;
mod planar;
mod reference;
mod rgbd;
mod rigid;
mod vvs;

pub use error::PoseError;
pub use params::PoseParams;
pub use planar::solve_planar;
pub use reference::{
    build_correspondences, grid_reference_points, tag_reference_points, Correspondence,
};
pub use rgbd::{collect_depth_points, fit_plane, solve_rgbd, Plane};
pub use rigid::rigid_from_points;
pub use vvs::{refine_vvs, residual, VvsSolution};
