use std::sync::LazyLock;

use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use statrs::statistics::Statistics;

use crate::{
    error::{ForensicsError, Result},
    transform::{BlockTransform, JPEG_BLOCK_SIZE},
};

const EPSILON: f64 = 1e-7;

const BLOCK_LEN: usize = JPEG_BLOCK_SIZE * JPEG_BLOCK_SIZE;

static DIMPLE_TEMPLATE: LazyLock<[f64; BLOCK_LEN]> = LazyLock::new(compute_template);

static NORMALIZED_AC_TEMPLATE: LazyLock<Array1<f64>> =
    LazyLock::new(|| z_score(ArrayView1::from(&DIMPLE_TEMPLATE[1..]), 0.0));

fn compute_template() -> [f64; BLOCK_LEN] {
    let n = JPEG_BLOCK_SIZE;
    let pattern = Array2::from_shape_fn((n, n), |(_, x)| if x % 2 == 1 { 2.0 } else { 1.0 });
    let mean = pattern.iter().mean();
    let pattern = pattern - mean;

    let dct = BlockTransform::compute_dct_matrix(n);
    let coefficients = dct.dot(&pattern).dot(&dct.t());

    let mut template = [0.0; BLOCK_LEN];
    for (dst, src) in template.iter_mut().zip(coefficients.iter()) {
        *dst = *src;
    }
    template
}

fn z_score(values: ArrayView1<f64>, epsilon: f64) -> Array1<f64> {
    let mean = values.iter().mean();
    let std = values.iter().population_std_dev();
    values.mapv(|v| (v - mean) / (std + epsilon))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DctTemplateDetector;

impl DctTemplateDetector {
    pub fn new() -> Self {
        Self
    }

    /// 8x8 DCT coefficients of a pattern alternating 1 in even and 2 in odd
    /// columns, with the DC term removed. Row-major.
    pub fn template() -> &'static [f64; BLOCK_LEN] {
        &DIMPLE_TEMPLATE
    }

    pub fn detect_map(&self, dct_blocks: &Array3<f64>) -> Result<Array2<f64>> {
        let (v, h, len) = dct_blocks.dim();
        if len != BLOCK_LEN {
            return Err(ForensicsError::Shape(format!(
                "expected {} coefficients per block, got {}",
                BLOCK_LEN, len
            )));
        }

        let template = &*NORMALIZED_AC_TEMPLATE;
        let ac_len = template.len() as f64;

        let mut map = Array2::zeros((v, h));
        for ((i, j), value) in map.indexed_iter_mut() {
            let block = dct_blocks.index_axis(Axis(0), i);
            let ac = block.index_axis(Axis(0), j);
            let normalized = z_score(ac.slice(ndarray::s![1..]), EPSILON);
            *value = normalized.dot(template) / ac_len;
        }

        Ok(map)
    }

    /// Mean of [`detect_map`](Self::detect_map) over all blocks. NaN for an
    /// empty grid.
    pub fn detect_score(&self, dct_blocks: &Array3<f64>) -> Result<f64> {
        let map = self.detect_map(dct_blocks)?;
        Ok(map.iter().mean())
    }
}
