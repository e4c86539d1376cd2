//! Orthonormal block DCT and conversion between block tensors and planes.
//!
//! A block tensor has shape `[V, H, N*N]`: one row-major flattened `N x N`
//! block per grid cell. A plane has shape `[V*N, H*N]` with block `(i, j)`
//! placed at pixel offset `(i*N, j*N)`.

use ndarray::{Array2, Array3, ArrayView2};

use crate::error::{ForensicsError, Result};

pub const JPEG_BLOCK_SIZE: usize = 8;
pub const WIDE_BLOCK_SIZE: usize = 2 * JPEG_BLOCK_SIZE;

fn check_block_size(size: usize) -> Result<()> {
    match size {
        JPEG_BLOCK_SIZE | WIDE_BLOCK_SIZE => Ok(()),
        other => Err(ForensicsError::InvalidParameter(format!(
            "unsupported block size {}, expected {} or {}",
            other, JPEG_BLOCK_SIZE, WIDE_BLOCK_SIZE
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct BlockTransform {
    size: usize,
    dct_matrix: Array2<f64>,
    dct_matrix_t: Array2<f64>,
}

impl BlockTransform {
    pub fn new(size: usize) -> Result<Self> {
        check_block_size(size)?;
        Ok(Self::build(size))
    }

    pub fn jpeg() -> Self {
        Self::build(JPEG_BLOCK_SIZE)
    }

    pub fn wide() -> Self {
        Self::build(WIDE_BLOCK_SIZE)
    }

    fn build(size: usize) -> Self {
        let dct_matrix = Self::compute_dct_matrix(size);
        let dct_matrix_t = dct_matrix.t().to_owned();

        Self {
            size,
            dct_matrix,
            dct_matrix_t,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn compute_dct_matrix(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, n), |(i, j)| {
            if i == 0 {
                1.0 / (n as f64).sqrt()
            } else {
                (2.0 / n as f64).sqrt()
                    * (std::f64::consts::PI * (2.0 * j as f64 + 1.0) * i as f64 / (2.0 * n as f64))
                        .cos()
            }
        })
    }

    pub fn forward(&self, block: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_block(&block)?;
        Ok(self.dct_matrix.dot(&block).dot(&self.dct_matrix_t))
    }

    pub fn inverse(&self, coefficients: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_block(&coefficients)?;
        Ok(self.dct_matrix_t.dot(&coefficients).dot(&self.dct_matrix))
    }

    pub fn coefficients_to_plane(&self, tensor: &Array3<f64>) -> Result<Array2<f64>> {
        let spatial = self.map_blocks(tensor, |block| self.inverse(block))?;
        tensor_to_plane(&spatial, self.size)
    }

    pub fn plane_to_coefficients(&self, plane: &Array2<f64>) -> Result<Array3<f64>> {
        let blocks = plane_to_tensor(plane, self.size)?;
        self.map_blocks(&blocks, |block| self.forward(block))
    }

    fn map_blocks<F>(&self, tensor: &Array3<f64>, op: F) -> Result<Array3<f64>>
    where
        F: Fn(ArrayView2<f64>) -> Result<Array2<f64>>,
    {
        let n = self.size;
        let (v, h, len) = tensor.dim();
        if len != n * n {
            return Err(ForensicsError::Shape(format!(
                "expected {} coefficients per block, got {}",
                n * n,
                len
            )));
        }

        let mut output = Array3::zeros((v, h, len));
        for i in 0..v {
            for j in 0..h {
                let block = Array2::from_shape_fn((n, n), |(r, c)| tensor[[i, j, r * n + c]]);
                let transformed = op(block.view())?;
                for r in 0..n {
                    for c in 0..n {
                        output[[i, j, r * n + c]] = transformed[[r, c]];
                    }
                }
            }
        }

        Ok(output)
    }

    fn check_block(&self, block: &ArrayView2<f64>) -> Result<()> {
        if block.dim() != (self.size, self.size) {
            let (rows, cols) = block.dim();
            return Err(ForensicsError::Shape(format!(
                "expected a {0}x{0} block, got {1}x{2}",
                self.size, rows, cols
            )));
        }
        Ok(())
    }
}

/// Reorders a `[V, H, N*N]` tensor into a `[V*N, H*N]` raster.
pub fn tensor_to_plane(tensor: &Array3<f64>, block_size: usize) -> Result<Array2<f64>> {
    let (v, h, len) = tensor.dim();
    if block_size == 0 || len != block_size * block_size {
        return Err(ForensicsError::Shape(format!(
            "trailing axis of length {} does not hold {}x{} blocks",
            len, block_size, block_size
        )));
    }

    let n = block_size;
    Ok(Array2::from_shape_fn((v * n, h * n), |(y, x)| {
        tensor[[y / n, x / n, (y % n) * n + x % n]]
    }))
}

pub fn plane_to_tensor(plane: &Array2<f64>, block_size: usize) -> Result<Array3<f64>> {
    let (height, width) = plane.dim();
    if block_size == 0 || height % block_size != 0 || width % block_size != 0 {
        return Err(ForensicsError::Shape(format!(
            "plane of {}x{} is not a multiple of block size {}",
            height, width, block_size
        )));
    }

    let n = block_size;
    Ok(Array3::from_shape_fn(
        (height / n, width / n, n * n),
        |(i, j, k)| plane[[i * n + k / n, j * n + k % n]],
    ))
}

pub fn trim_to_block_multiple(plane: &Array2<f64>, block_size: usize) -> Result<Array2<f64>> {
    check_block_size(block_size)?;
    let (height, width) = plane.dim();
    let height = height - height % block_size;
    let width = width - width % block_size;
    Ok(plane.slice(ndarray::s![..height, ..width]).to_owned())
}
