//! Recorded camera sessions for offline replay.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tagtrack_core::{CameraParameters, DepthMap, TargetDetection};
use tagtrack_tracker::TagDetection;

use crate::ConfigError;

/// Where a frame's depth comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DepthSource {
    /// Every pixel at the same distance.
    Constant { meters: f32 },
    /// 16-bit PNG, relative paths resolved against the recording file.
    Png16 {
        path: PathBuf,
        #[serde(default = "default_png_scale")]
        scale: f32,
    },
}

fn default_png_scale() -> f32 {
    0.001
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub tags: Vec<TagDetection>,
    #[serde(default)]
    pub chessboard: Option<TargetDetection>,
    #[serde(default)]
    pub depth: Option<DepthSource>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub camera: CameraParameters,
    pub width: usize,
    pub height: usize,
    pub frames: Vec<RecordedFrame>,
}

impl Recording {
    /// Load a JSON recording from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this recording to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Depth map of frame `index`, if it has one.
    pub fn load_depth(
        &self,
        index: usize,
        base_dir: &Path,
    ) -> Result<Option<DepthMap>, ConfigError> {
        let Some(frame) = self.frames.get(index) else {
            return Ok(None);
        };
        match &frame.depth {
            None => Ok(None),
            Some(DepthSource::Constant { meters }) => {
                if !(meters.is_finite() && *meters >= 0.0) {
                    return Err(ConfigError::Depth {
                        frame: index,
                        reason: format!("invalid constant depth {meters}"),
                    });
                }
                Ok(Some(DepthMap::filled(self.width, self.height, *meters)))
            }
            Some(DepthSource::Png16 { path, scale }) => {
                let path = base_dir.join(path);
                let depth = read_png16(&path, *scale, index)?;
                if depth.width != self.width || depth.height != self.height {
                    return Err(ConfigError::Depth {
                        frame: index,
                        reason: format!(
                            "{} is {}x{}, expected {}x{}",
                            path.display(),
                            depth.width,
                            depth.height,
                            self.width,
                            self.height
                        ),
                    });
                }
                Ok(Some(depth))
            }
        }
    }
}

#[cfg(feature = "image")]
fn read_png16(path: &Path, scale: f32, frame: usize) -> Result<DepthMap, ConfigError> {
    let img = image::open(path)
        .map_err(|source| ConfigError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma16();
    let (w, h) = img.dimensions();
    DepthMap::from_u16(w as usize, h as usize, img.as_raw(), scale).ok_or_else(|| {
        ConfigError::Depth {
            frame,
            reason: format!("{} has an inconsistent buffer", path.display()),
        }
    })
}

#[cfg(not(feature = "image"))]
fn read_png16(path: &Path, _scale: f32, _frame: usize) -> Result<DepthMap, ConfigError> {
    Err(ConfigError::ImageUnsupported(path.to_path_buf()))
}
