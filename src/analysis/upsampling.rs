use std::{fmt, str::FromStr};

use log::debug;
use ndarray::{Array2, Array3, s};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ForensicsError, Result},
    transform::{
        BlockTransform, JPEG_BLOCK_SIZE, WIDE_BLOCK_SIZE, plane_to_tensor, trim_to_block_multiple,
    },
};

/// Fraction of matching 2x2 neighbours above which a channel counts as
/// nearest-neighbour upsampled.
pub const SIMPLE_UPSAMPLING_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsamplingMode {
    Auto,
    Simple,
    Dct,
}

impl UpsamplingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsamplingMode::Auto => "auto",
            UpsamplingMode::Simple => "simple_upsampling",
            UpsamplingMode::Dct => "dct_upsampling",
        }
    }
}

impl fmt::Display for UpsamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpsamplingMode {
    type Err = ForensicsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(UpsamplingMode::Auto),
            "simple_upsampling" | "simple" => Ok(UpsamplingMode::Simple),
            "dct_upsampling" | "dct" => Ok(UpsamplingMode::Dct),
            other => Err(ForensicsError::InvalidParameter(format!(
                "Upsampling method not known: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpsamplingConfig {
    pub simple_threshold: f64,
}

impl Default for UpsamplingConfig {
    fn default() -> Self {
        Self {
            simple_threshold: SIMPLE_UPSAMPLING_THRESHOLD,
        }
    }
}

pub struct UpsamplingUndo {
    config: UpsamplingConfig,
    transform: BlockTransform,
    wide_transform: BlockTransform,
}

impl UpsamplingUndo {
    pub fn new() -> Self {
        Self::with_config(UpsamplingConfig::default())
    }

    pub fn with_config(config: UpsamplingConfig) -> Self {
        Self {
            config,
            transform: BlockTransform::jpeg(),
            wide_transform: BlockTransform::wide(),
        }
    }

    /// Mean fraction of the three non-top-left samples in each 2x2
    /// neighbourhood that equal the top-left sample, after rounding.
    ///
    /// A trailing odd row or column is ignored. Planes without a single full
    /// neighbourhood score 0.
    pub fn classify(plane: &Array2<f64>) -> f64 {
        let (height, width) = plane.dim();
        let rows = height / 2;
        let cols = width / 2;

        if rows == 0 || cols == 0 {
            return 0.0;
        }

        let mut total = 0.0;
        for by in 0..rows {
            for bx in 0..cols {
                let y = by * 2;
                let x = bx * 2;
                let anchor = plane[[y, x]].round();
                let matches = [plane[[y, x + 1]], plane[[y + 1, x]], plane[[y + 1, x + 1]]]
                    .iter()
                    .filter(|v| v.round() == anchor)
                    .count();
                total += matches as f64 / 3.0;
            }
        }

        total / (rows * cols) as f64
    }

    pub fn is_simple_upsampled(&self, plane: &Array2<f64>) -> bool {
        Self::classify(plane) > self.config.simple_threshold
    }

    pub fn undo_simple(plane: &Array2<f64>) -> Array2<f64> {
        plane.slice(s![..;2, ..;2]).to_owned()
    }

    /// Takes the 16x16 DCT of each full 16x16 tile and keeps its top-left 8x8
    /// coefficients. Partial tiles at the bottom and right are discarded.
    pub fn undo_dct(&self, plane: &Array2<f64>) -> Result<Array3<f64>> {
        let trimmed = trim_to_block_multiple(plane, WIDE_BLOCK_SIZE)?;
        let tiles = plane_to_tensor(&trimmed, WIDE_BLOCK_SIZE)?;
        let (v, h, _) = tiles.dim();

        let n = JPEG_BLOCK_SIZE;
        let mut output = Array3::zeros((v, h, n * n));
        for i in 0..v {
            for j in 0..h {
                let tile = Array2::from_shape_fn((WIDE_BLOCK_SIZE, WIDE_BLOCK_SIZE), |(r, c)| {
                    tiles[[i, j, r * WIDE_BLOCK_SIZE + c]]
                });
                let coefficients = self.wide_transform.forward(tile.view())?;
                for r in 0..n {
                    for c in 0..n {
                        output[[i, j, r * n + c]] = coefficients[[r, c]];
                    }
                }
            }
        }

        Ok(output)
    }

    pub fn reduce(&self, dct_blocks: &Array3<f64>, mode: UpsamplingMode) -> Result<Array3<f64>> {
        let channel = self.transform.coefficients_to_plane(dct_blocks)?;

        let undo_simple = match mode {
            UpsamplingMode::Auto => {
                let score = Self::classify(&channel);
                let simple = score > self.config.simple_threshold;
                debug!(
                    "Simple upsampling score {:.4}, undoing {}",
                    score,
                    if simple { UpsamplingMode::Simple } else { UpsamplingMode::Dct }
                );
                simple
            }
            UpsamplingMode::Simple => true,
            UpsamplingMode::Dct => false,
        };

        if undo_simple {
            let decimated = Self::undo_simple(&channel);
            let trimmed = trim_to_block_multiple(&decimated, JPEG_BLOCK_SIZE)?;
            self.transform.plane_to_coefficients(&trimmed)
        } else {
            self.undo_dct(&channel)
        }
    }

    pub fn reduce_named(&self, dct_blocks: &Array3<f64>, mode: &str) -> Result<Array3<f64>> {
        self.reduce(dct_blocks, mode.parse()?)
    }
}

impl Default for UpsamplingUndo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replicate(plane: &Array2<f64>) -> Array2<f64> {
        let (h, w) = plane.dim();
        Array2::from_shape_fn((h * 2, w * 2), |(y, x)| plane[[y / 2, x / 2]])
    }

    fn random_plane(height: usize, width: usize, seed: u64) -> Array2<f64> {
        let mut rng = fastrand::Rng::with_seed(seed);
        Array2::from_shape_fn((height, width), |_| rng.u8(..) as f64)
    }

    #[test]
    fn test_classify_replicated_plane() {
        let small = random_plane(20, 31, 1);
        let upsampled = replicate(&small);
        assert!(UpsamplingUndo::classify(&upsampled) > SIMPLE_UPSAMPLING_THRESHOLD);
        assert!(UpsamplingUndo::new().is_simple_upsampled(&upsampled));
    }

    #[test]
    fn test_classify_random_plane() {
        let plane = random_plane(64, 64, 2);
        let score = UpsamplingUndo::classify(&plane);
        assert!(score < 0.25);
    }

    #[test]
    fn test_classify_ignores_odd_edges() {
        let mut plane = replicate(&random_plane(4, 4, 3));
        plane = ndarray::concatenate(
            ndarray::Axis(0),
            &[plane.view(), random_plane(1, 8, 4).view()],
        )
        .unwrap();
        assert_eq!(plane.dim(), (9, 8));
        assert_eq!(UpsamplingUndo::classify(&plane), 1.0);
    }

    #[test]
    fn test_classify_tiny_plane() {
        assert_eq!(UpsamplingUndo::classify(&Array2::zeros((1, 5))), 0.0);
    }

    #[test]
    fn test_undo_simple_inverts_replication() {
        let small = random_plane(6, 5, 5);
        assert_eq!(UpsamplingUndo::undo_simple(&replicate(&small)), small);
    }

    #[test]
    fn test_reduce_simple_recovers_original_blocks() {
        let transform = BlockTransform::jpeg();
        let small = random_plane(16, 24, 6);
        let original = transform.plane_to_coefficients(&small).unwrap();
        let upsampled = transform.plane_to_coefficients(&replicate(&small)).unwrap();

        let reduced = UpsamplingUndo::new()
            .reduce(&upsampled, UpsamplingMode::Simple)
            .unwrap();

        assert_eq!(reduced.dim(), original.dim());
        for (a, b) in reduced.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_reduce_auto_picks_simple_for_replicated() {
        let transform = BlockTransform::jpeg();
        let upsampled = transform
            .plane_to_coefficients(&replicate(&random_plane(24, 16, 7)))
            .unwrap();
        let undo = UpsamplingUndo::new();

        let auto = undo.reduce(&upsampled, UpsamplingMode::Auto).unwrap();
        let simple = undo.reduce(&upsampled, UpsamplingMode::Simple).unwrap();
        assert_eq!(auto, simple);
    }

    #[test]
    fn test_reduce_auto_picks_dct_for_random() {
        let transform = BlockTransform::jpeg();
        let blocks = transform.plane_to_coefficients(&random_plane(48, 48, 8)).unwrap();
        let undo = UpsamplingUndo::new();

        let auto = undo.reduce(&blocks, UpsamplingMode::Auto).unwrap();
        let dct = undo.reduce(&blocks, UpsamplingMode::Dct).unwrap();
        assert_eq!(auto, dct);
    }

    #[test]
    fn test_undo_dct_constant_plane() {
        let plane = Array2::from_elem((40, 36), 4.0);
        let reduced = UpsamplingUndo::new().undo_dct(&plane).unwrap();
        assert_eq!(reduced.dim(), (2, 2, 64));
        for i in 0..2 {
            for j in 0..2 {
                assert!((reduced[[i, j, 0]] - 64.0).abs() < 1e-9);
                assert!(reduced.slice(s![i, j, 1..]).iter().all(|v| v.abs() < 1e-9));
            }
        }
    }

    #[test]
    fn test_unknown_mode_name() {
        let blocks = Array3::zeros((2, 2, 64));
        let result = UpsamplingUndo::new().reduce_named(&blocks, "bicubic");
        assert!(matches!(result, Err(ForensicsError::InvalidParameter(_))));
        assert_eq!("dct_upsampling".parse::<UpsamplingMode>().unwrap(), UpsamplingMode::Dct);
    }
}
