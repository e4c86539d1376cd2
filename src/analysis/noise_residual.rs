use ndarray::{Array2, Array3};

use crate::{
    error::{ForensicsError, Result},
    transform::BlockTransform,
};

#[derive(Debug, Clone)]
pub struct ResidualConfig {
    pub window_size: usize,
}

impl Default for ResidualConfig {
    fn default() -> Self {
        Self { window_size: 3 }
    }
}

#[derive(Debug, Clone)]
pub struct NoiseResidual {
    pub dct_blocks: Array3<f64>,
    pub pixels: Option<Array2<f64>>,
}

pub struct ResidualExtractor {
    config: ResidualConfig,
    transform: BlockTransform,
}

impl ResidualExtractor {
    pub fn new() -> Self {
        Self::with_config(ResidualConfig::default())
    }

    pub fn with_config(config: ResidualConfig) -> Self {
        Self {
            config,
            transform: BlockTransform::jpeg(),
        }
    }

    pub fn extract(&self, dct_blocks: &Array3<f64>, return_pixels: bool) -> Result<NoiseResidual> {
        let image = self.transform.coefficients_to_plane(dct_blocks)?;
        let denoised = self.wiener_filter(&image)?;

        let residual = &image - &denoised;
        let residual_blocks = self.transform.plane_to_coefficients(&residual)?;

        Ok(NoiseResidual {
            dct_blocks: residual_blocks,
            pixels: return_pixels.then_some(residual),
        })
    }

    /// Local-statistics adaptive filter. Samples outside the plane count as
    /// zero. The noise power is the mean of all local variances; wherever the
    /// local variance does not exceed it, the local mean is used.
    pub fn wiener_filter(&self, image: &Array2<f64>) -> Result<Array2<f64>> {
        let window = self.config.window_size;
        if window == 0 || window % 2 == 0 {
            return Err(ForensicsError::InvalidParameter(format!(
                "window size must be odd, got {}",
                window
            )));
        }

        let (height, width) = image.dim();
        if height == 0 || width == 0 {
            return Ok(image.clone());
        }

        let (local_mean, local_var) = self.local_statistics(image);
        let noise = local_var.mean().unwrap_or(0.0);

        Ok(Array2::from_shape_fn((height, width), |(y, x)| {
            let mean = local_mean[[y, x]];
            let var = local_var[[y, x]];
            if var <= noise {
                mean
            } else {
                mean + (1.0 - noise / var) * (image[[y, x]] - mean)
            }
        }))
    }

    fn local_statistics(&self, image: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let (height, width) = image.dim();
        let radius = (self.config.window_size / 2) as isize;
        let area = (self.config.window_size * self.config.window_size) as f64;

        let mut local_mean = Array2::zeros((height, width));
        let mut local_var = Array2::zeros((height, width));

        for y in 0..height {
            for x in 0..width {
                let mut sum = 0.0;
                let mut sum_sq = 0.0;

                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        let py = y as isize + dy;
                        let px = x as isize + dx;
                        if py >= 0 && px >= 0 && (py as usize) < height && (px as usize) < width {
                            let val = image[[py as usize, px as usize]];
                            sum += val;
                            sum_sq += val * val;
                        }
                    }
                }

                let mean = sum / area;
                local_mean[[y, x]] = mean;
                local_var[[y, x]] = sum_sq / area - mean * mean;
            }
        }

        (local_mean, local_var)
    }
}

impl Default for ResidualExtractor {
    fn default() -> Self {
        Self::new()
    }
}
