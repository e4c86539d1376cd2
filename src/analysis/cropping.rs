use ndarray::{Array3, s};

use crate::{
    error::{ForensicsError, Result},
    transform::{BlockTransform, JPEG_BLOCK_SIZE},
};

pub struct Realigner {
    transform: BlockTransform,
}

impl Realigner {
    pub fn new() -> Self {
        Self {
            transform: BlockTransform::jpeg(),
        }
    }

    /// Output grid is `(V*8 - crop_top) / 8` by `(H*8 - crop_left) / 8`.
    /// A zero offset leaves that axis untouched.
    pub fn crop(&self, dct_blocks: &Array3<f64>, crop_top: usize, crop_left: usize) -> Result<Array3<f64>> {
        if crop_top >= JPEG_BLOCK_SIZE || crop_left >= JPEG_BLOCK_SIZE {
            return Err(ForensicsError::InvalidParameter(format!(
                "crop offsets must be below {}, got top={} left={}",
                JPEG_BLOCK_SIZE, crop_top, crop_left
            )));
        }

        let channel = self.transform.coefficients_to_plane(dct_blocks)?;
        let (height, width) = channel.dim();

        let (top, bottom) = Self::axis_bounds(height, crop_top);
        let (left, right) = Self::axis_bounds(width, crop_left);

        let cropped = channel.slice(s![top..bottom, left..right]).to_owned();
        self.transform.plane_to_coefficients(&cropped)
    }

    fn axis_bounds(length: usize, offset: usize) -> (usize, usize) {
        if offset == 0 || offset >= length {
            return (offset.min(length), length);
        }

        let trailing = (length - offset) % JPEG_BLOCK_SIZE;
        (offset, length - trailing)
    }
}

impl Default for Realigner {
    fn default() -> Self {
        Self::new()
    }
}
