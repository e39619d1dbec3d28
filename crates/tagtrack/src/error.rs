use std::path::PathBuf;

use tagtrack_core::CameraError;
use tagtrack_tracker::SessionError;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid camera: {0}")]
    Camera(#[from] CameraError),
    #[error("frame {frame}: {reason}")]
    Depth { frame: usize, reason: String },
    #[cfg(feature = "image")]
    #[error("failed to read {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("reading {0} needs the `image` feature")]
    ImageUnsupported(PathBuf),
}

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("publishing failed: {0}")]
    Sink(#[from] SinkError),
}

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "image")]
    #[error("failed to write overlay: {0}")]
    Overlay(#[from] image::ImageError),
}
