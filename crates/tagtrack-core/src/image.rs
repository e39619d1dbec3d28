#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, Default)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Black image of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Per-pixel depth in meters, aligned with the gray image.
///
/// Invalid pixels are stored as `0.0` or `NaN`; [`DepthMap::get`] filters them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DepthMap {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl DepthMap {
    /// Depth map filled with a single value.
    pub fn filled(width: usize, height: usize, meters: f32) -> Self {
        Self {
            width,
            height,
            data: vec![meters; width * height],
        }
    }

    /// Convert a 16-bit sensor buffer (millimeters by convention) using `scale` meters per unit.
    pub fn from_u16(width: usize, height: usize, raw: &[u16], scale: f32) -> Option<Self> {
        if raw.len() != width.checked_mul(height)? {
            return None;
        }
        Some(Self {
            width,
            height,
            data: raw.iter().map(|&v| v as f32 * scale).collect(),
        })
    }

    /// Millimeter sensor buffer, the common 16-bit depth encoding.
    pub fn from_u16_millimeters(width: usize, height: usize, raw: &[u16]) -> Option<Self> {
        Self::from_u16(width, height, raw, 1e-3)
    }

    /// Valid depth sample at integer pixel `(x, y)`.
    ///
    /// Pixels past the end of a short `data` buffer read as missing.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<f32> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        let d = *self.data.get(y as usize * self.width + x as usize)?;
        (d.is_finite() && d > 0.0).then_some(d)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
