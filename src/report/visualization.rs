use image::{GrayImage, Rgb, RgbImage};
use ndarray::Array2;

use crate::{
    error::Result,
    image_utils::{array_to_gray, normalize_to_u8},
};

#[derive(Debug, Clone, Copy)]
pub enum ColorScheme {
    HeatMap,
    Diverging,
    Grayscale,
}

#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    pub color_scheme: ColorScheme,
    /// Output pixels per block along each axis.
    pub block_scale: u32,
    pub padding: u32,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            color_scheme: ColorScheme::Diverging,
            block_scale: 8,
            padding: 10,
        }
    }
}

pub struct Visualizer {
    config: VisualizationConfig,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            config: VisualizationConfig::default(),
        }
    }

    pub fn with_config(config: VisualizationConfig) -> Self {
        Self { config }
    }

    /// Renders a `[V, H]` correlation map with values in `[-1, 1]`, one
    /// `block_scale` square per block.
    pub fn render_detection_map(&self, map: &Array2<f64>) -> RgbImage {
        let (rows, cols) = map.dim();
        let scale = self.config.block_scale.max(1);
        let mut image = RgbImage::new(cols as u32 * scale, rows as u32 * scale);

        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let value = map[[(y / scale) as usize, (x / scale) as usize]];
            let intensity = if value.is_finite() {
                ((value + 1.0) / 2.0) as f32
            } else {
                0.5
            };
            *pixel = self.intensity_to_color(intensity);
        }

        image
    }

    /// Stretches a spatial plane, e.g. a noise residual, to the full 8-bit
    /// range.
    pub fn render_plane(&self, plane: &Array2<f64>) -> GrayImage {
        array_to_gray(&normalize_to_u8(plane))
    }

    fn intensity_to_color(&self, intensity: f32) -> Rgb<u8> {
        const BLUE: [f32; 3] = [0.0, 0.0, 1.0];
        const RED: [f32; 3] = [1.0, 0.0, 0.0];

        let stops: &[[f32; 3]] = match self.config.color_scheme {
            ColorScheme::HeatMap => &[BLUE, [0.0, 1.0, 1.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], RED],
            ColorScheme::Diverging => &[BLUE, [1.0, 1.0, 1.0], RED],
            ColorScheme::Grayscale => &[[0.0; 3], [1.0; 3]],
        };

        let scaled = intensity.clamp(0.0, 1.0) * (stops.len() - 1) as f32;
        let segment = (scaled.floor() as usize).min(stops.len() - 2);
        let t = scaled - segment as f32;
        let (from, to) = (stops[segment], stops[segment + 1]);

        Rgb(std::array::from_fn(|c| ((from[c] + (to[c] - from[c]) * t) * 255.0) as u8))
    }

    /// Places images side by side on a dark background.
    pub fn create_comparison(&self, images: &[&RgbImage]) -> RgbImage {
        if images.is_empty() {
            return RgbImage::new(1, 1);
        }

        let padding = self.config.padding;
        let max_height = images.iter().map(|img| img.height()).max().unwrap_or(0);
        let total_width =
            images.iter().map(|img| img.width()).sum::<u32>() + padding * (images.len() as u32 + 1);
        let total_height = max_height + padding * 2;

        let mut result = RgbImage::from_pixel(total_width, total_height, Rgb([40, 40, 40]));

        let mut x_offset = padding;
        for img in images {
            for (x, y, pixel) in img.enumerate_pixels() {
                result.put_pixel(x_offset + x, padding + y, *pixel);
            }
            x_offset += img.width() + padding;
        }

        result
    }

    pub fn visualize_channels(&self, cb_map: &Array2<f64>, cr_map: &Array2<f64>) -> ChannelVisualization {
        let cb = self.render_detection_map(cb_map);
        let cr = self.render_detection_map(cr_map);
        let combined = self.create_comparison(&[&cb, &cr]);

        ChannelVisualization { cb, cr, combined }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChannelVisualization {
    pub cb: RgbImage,
    pub cr: RgbImage,
    pub combined: RgbImage,
}

impl ChannelVisualization {
    pub fn save_all(&self, directory: &str) -> Result<()> {
        std::fs::create_dir_all(directory)?;

        self.cb.save(format!("{}/cb_detection.png", directory))?;
        self.cr.save(format!("{}/cr_detection.png", directory))?;
        self.combined.save(format!("{}/combined.png", directory))?;

        Ok(())
    }
}
